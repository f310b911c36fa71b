use thiserror::Error;
use tokio::sync::mpsc;

use crate::event::{progress_percent, AccountId, MailSummary, SyncEvent, SyncRequest, SyncStatus};

/// Text shown once the server reports the job done
pub const COMPLETED_TEXT: &str = "Synchronization completed";

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Failed to decode sync event: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode sync request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Connection is closed")]
    ConnectionClosed,
}

/// Display surfaces driven by the controller
pub trait Renderer {
    /// Move the progress bar to `percent` and replace the progress text
    fn set_progress(&mut self, percent: f64, text: &str);

    /// Insert a row above all rows shown so far
    fn prepend_row(&mut self, summary: &MailSummary);

    /// Surface a server-reported error to the user without blocking
    fn notify_error(&mut self, text: &str);
}

pub fn processing_text(progress: u64, total: u64) -> String {
    format!("Processed {} of {} messages", progress, total)
}

/// Routes sync server events to a [`Renderer`] and sends the sync request
/// over the outbound half of the connection.
pub struct ProgressController<R> {
    renderer: R,
    outbound: mpsc::UnboundedSender<String>,
    open: bool,
}

impl<R: Renderer> ProgressController<R> {
    pub fn new(renderer: R, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            renderer,
            outbound,
            open: true,
        }
    }

    /// Decode one inbound frame and dispatch it.
    ///
    /// Malformed frames leave every display surface untouched.
    pub fn handle(&mut self, raw: &str) -> Result<(), ControllerError> {
        let event = SyncEvent::decode(raw).map_err(ControllerError::Decode)?;
        self.dispatch(&event);
        Ok(())
    }

    pub fn dispatch(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::SyncStatus(status) => {
                self.update_progress(status);
                if let SyncStatus::Processing { message, .. } = status {
                    self.add_row(message);
                }
            }
            SyncEvent::Error { message } => self.show_error(message),
            SyncEvent::Unrecognized => {
                log::debug!("Ignoring sync event of unknown type");
            }
        }
    }

    pub fn update_progress(&mut self, status: &SyncStatus) {
        match status {
            SyncStatus::Processing { progress, total, .. } => {
                let percent = progress_percent(*progress, *total);
                log::debug!("Sync progress {}/{} ({:.1}%)", progress, total, percent);
                self.renderer
                    .set_progress(percent, &processing_text(*progress, *total));
            }
            SyncStatus::Completed => {
                log::info!("Sync completed");
                self.renderer.set_progress(100.0, COMPLETED_TEXT);
            }
            SyncStatus::Other => {}
        }
    }

    pub fn add_row(&mut self, summary: &MailSummary) {
        self.renderer.prepend_row(summary);
    }

    pub fn show_error(&mut self, text: &str) {
        log::warn!("Sync server reported an error: {}", text);
        self.renderer.notify_error(text);
    }

    /// Ask the server to synchronize `account_id`.
    ///
    /// The connection must already be open; nothing is queued or retried.
    pub fn start_sync(&mut self, account_id: &AccountId) -> Result<(), ControllerError> {
        if !self.open {
            return Err(ControllerError::ConnectionClosed);
        }

        let request = SyncRequest {
            account_id: account_id.clone(),
        };
        let frame = serde_json::to_string(&request).map_err(ControllerError::Encode)?;

        self.outbound
            .send(frame)
            .map_err(|_| ControllerError::ConnectionClosed)?;

        log::info!("Requested sync for account {}", account_id);
        Ok(())
    }

    /// Record that the connection went away. There is no way back from here.
    pub fn connection_closed(&mut self, reason: Option<&str>) {
        match reason {
            Some(reason) => log::info!("Sync connection closed: {}", reason),
            None => log::info!("Sync connection closed"),
        }
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct RecordingRenderer {
        progress: Vec<(f64, String)>,
        rows: Vec<MailSummary>,
        errors: Vec<String>,
    }

    impl Renderer for RecordingRenderer {
        fn set_progress(&mut self, percent: f64, text: &str) {
            self.progress.push((percent, text.to_string()));
        }

        fn prepend_row(&mut self, summary: &MailSummary) {
            self.rows.insert(0, summary.clone());
        }

        fn notify_error(&mut self, text: &str) {
            self.errors.push(text.to_string());
        }
    }

    fn controller() -> (
        ProgressController<RecordingRenderer>,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ProgressController::new(RecordingRenderer::default(), tx), rx)
    }

    fn processing(progress: u64, total: u64, subject: &str, attachments: u32) -> String {
        serde_json::json!({
            "type": "sync_status",
            "status": "processing",
            "progress": progress,
            "total": total,
            "message": {
                "subject": subject,
                "sender": "bob@example.com",
                "date": "2024-03-01 10:15",
                "attachments": attachments,
            }
        })
        .to_string()
    }

    #[test]
    fn test_processing_sets_percent_and_text() {
        let (mut controller, _rx) = controller();

        controller.handle(&processing(3, 12, "Invoice", 0)).unwrap();

        let renderer = controller.renderer();
        assert_eq!(renderer.progress, vec![(25.0, "Processed 3 of 12 messages".to_string())]);
        assert_eq!(renderer.rows.len(), 1);
        assert_eq!(renderer.rows[0].subject, "Invoice");
        assert!(renderer.errors.is_empty());
    }

    #[test]
    fn test_rows_are_most_recent_first() {
        let (mut controller, _rx) = controller();

        controller.handle(&processing(1, 3, "m1", 0)).unwrap();
        controller.handle(&processing(2, 3, "m2", 1)).unwrap();
        controller.handle(&processing(3, 3, "m3", 0)).unwrap();

        let subjects: Vec<&str> = controller
            .renderer()
            .rows
            .iter()
            .map(|row| row.subject.as_str())
            .collect();
        assert_eq!(subjects, vec!["m3", "m2", "m1"]);
    }

    #[test]
    fn test_completed_always_sets_full_bar() {
        let (mut controller, _rx) = controller();

        controller.handle(&processing(1, 9, "m1", 0)).unwrap();
        controller
            .handle(r#"{"type":"sync_status","status":"completed","message":"done"}"#)
            .unwrap();

        let renderer = controller.renderer();
        assert_eq!(
            renderer.progress.last(),
            Some(&(100.0, COMPLETED_TEXT.to_string()))
        );
        // completed never adds a row
        assert_eq!(renderer.rows.len(), 1);
    }

    #[test]
    fn test_error_only_notifies() {
        let (mut controller, _rx) = controller();

        controller
            .handle(r#"{"type":"error","message":"IMAP login failed"}"#)
            .unwrap();

        let renderer = controller.renderer();
        assert_eq!(renderer.errors, vec!["IMAP login failed".to_string()]);
        assert!(renderer.progress.is_empty());
        assert!(renderer.rows.is_empty());
    }

    #[test]
    fn test_unknown_type_and_phase_change_nothing() {
        let (mut controller, _rx) = controller();

        controller.handle(r#"{"type":"ping"}"#).unwrap();
        controller
            .handle(r#"{"type":"sync_status","status":"starting","message":"Starting..."}"#)
            .unwrap();

        let renderer = controller.renderer();
        assert!(renderer.progress.is_empty());
        assert!(renderer.rows.is_empty());
        assert!(renderer.errors.is_empty());
    }

    #[test]
    fn test_malformed_frame_is_an_error_without_side_effects() {
        let (mut controller, _rx) = controller();

        let err = controller.handle("{\"type\":").unwrap_err();
        assert!(matches!(err, ControllerError::Decode(_)));

        let err = controller
            .handle(r#"{"type":"sync_status","status":"processing","progress":1}"#)
            .unwrap_err();
        assert!(matches!(err, ControllerError::Decode(_)));

        let renderer = controller.renderer();
        assert!(renderer.progress.is_empty());
        assert!(renderer.rows.is_empty());
    }

    #[test]
    fn test_start_sync_sends_one_request() {
        let (mut controller, mut rx) = controller();

        controller.start_sync(&AccountId::from("17")).unwrap();

        assert_eq!(rx.try_recv().unwrap(), r#"{"account_id":"17"}"#);
        assert!(rx.try_recv().is_err());

        let renderer = controller.renderer();
        assert!(renderer.progress.is_empty());
        assert!(renderer.rows.is_empty());
        assert!(renderer.errors.is_empty());
    }

    #[test]
    fn test_start_sync_after_close_fails() {
        let (mut controller, mut rx) = controller();

        controller.connection_closed(Some("going away"));
        assert!(!controller.is_open());

        let err = controller.start_sync(&AccountId::from(3)).unwrap_err();
        assert!(matches!(err, ControllerError::ConnectionClosed));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_start_sync_with_dropped_transport_fails() {
        let (mut controller, rx) = controller();
        drop(rx);

        let err = controller.start_sync(&AccountId::from(3)).unwrap_err();
        assert!(matches!(err, ControllerError::ConnectionClosed));
    }
}
