use std::collections::VecDeque;

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use thiserror::Error;

use crate::controller::{ControllerError, ProgressController, Renderer};
use crate::event::{AccountId, MailSummary};
use crate::session::{SessionEvent, SyncConnection};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Sync error: {0}")]
    SyncError(#[from] ControllerError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

/// Terminal-side state of the progress bar, progress text and emails table
#[derive(Debug, Default)]
pub struct SyncView {
    pub percent: Option<f64>,
    pub progress_text: String,
    /// Newest first
    pub rows: VecDeque<MailSummary>,
    /// Errors not yet dismissed, oldest first
    pub pending_errors: VecDeque<String>,
    pub last_update: Option<DateTime<Local>>,
    pub max_rows: Option<usize>,
    /// Scroll offset into `rows`
    pub scroll: usize,
}

impl SyncView {
    pub fn new(max_rows: Option<usize>) -> Self {
        Self {
            max_rows,
            ..Self::default()
        }
    }

    pub fn current_error(&self) -> Option<&str> {
        self.pending_errors.front().map(String::as_str)
    }

    pub fn dismiss_error(&mut self) -> Option<String> {
        self.pending_errors.pop_front()
    }

    fn touch(&mut self) {
        self.last_update = Some(Local::now());
    }
}

impl Renderer for SyncView {
    fn set_progress(&mut self, percent: f64, text: &str) {
        self.percent = Some(percent);
        self.progress_text = text.to_string();
        self.touch();
    }

    fn prepend_row(&mut self, summary: &MailSummary) {
        self.rows.push_front(summary.clone());
        if let Some(max_rows) = self.max_rows {
            self.rows.truncate(max_rows);
        }
        // keep the rows the user is looking at in place
        if self.scroll > 0 {
            self.scroll = (self.scroll + 1).min(self.rows.len().saturating_sub(1));
        }
        self.touch();
    }

    fn notify_error(&mut self, text: &str) {
        self.pending_errors.push_back(text.to_string());
        self.touch();
    }
}

pub struct App {
    pub controller: ProgressController<SyncView>,
    pub connection: SyncConnection,
    pub endpoint: String,
    pub account_id: Option<AccountId>,
    pub should_quit: bool,
}

impl App {
    pub fn new(connection: SyncConnection, endpoint: String, max_rows: Option<usize>) -> Self {
        let controller = ProgressController::new(SyncView::new(max_rows), connection.outbound());
        Self {
            controller,
            connection,
            endpoint,
            account_id: None,
            should_quit: false,
        }
    }

    pub fn view(&self) -> &SyncView {
        self.controller.renderer()
    }

    pub fn is_connected(&self) -> bool {
        self.controller.is_open()
    }

    /// Send the sync request for `account_id`. Called once by the host after
    /// the connection is open.
    pub fn start_sync(&mut self, account_id: AccountId) -> AppResult<()> {
        self.controller.start_sync(&account_id)?;
        self.account_id = Some(account_id);
        Ok(())
    }

    /// Feed every event received since the last tick to the controller
    pub fn tick(&mut self) -> AppResult<()> {
        while let Some(event) = self.connection.try_next_event() {
            match event {
                SessionEvent::Message(text) => {
                    if let Err(e) = self.controller.handle(&text) {
                        log::error!("{} (frame: {})", e, text);
                    }
                }
                SessionEvent::Closed(reason) => {
                    self.controller.connection_closed(reason.as_deref());
                }
            }
        }
        Ok(())
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> AppResult<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return Ok(());
        }

        let view = self.controller.renderer_mut();

        if view.current_error().is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                view.dismiss_error();
            }
            return Ok(());
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Down | KeyCode::Char('j') => {
                if view.scroll + 1 < view.rows.len() {
                    view.scroll += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                view.scroll = view.scroll.saturating_sub(1);
            }
            KeyCode::Home | KeyCode::Char('g') => view.scroll = 0,
            _ => {}
        }

        Ok(())
    }
}
