use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type SyncSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
}

/// What the socket task reports back to the UI loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Inbound text frame, delivered in the order the server sent it
    Message(String),
    /// The connection ended; carries the close reason when the server gave one
    Closed(Option<String>),
}

/// One live connection to the sync server.
///
/// A background task owns the socket; frames flow through unbounded
/// channels in both directions, so events arriving before anyone polls are
/// buffered rather than lost.
pub struct SyncConnection {
    outbound: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    task: Option<JoinHandle<()>>,
}

impl SyncConnection {
    /// Connect to `url` and start servicing the socket
    pub async fn open(url: &str) -> Result<Self, SessionError> {
        let (socket, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|source| SessionError::Connect {
                url: url.to_string(),
                source,
            })?;
        log::info!("Connected to sync server at {}", url);

        let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();
        let (event_sender, event_receiver) = mpsc::unbounded_channel::<SessionEvent>();

        let task = tokio::spawn(async move {
            Self::background_task(socket, outbound_receiver, event_sender).await;
        });

        Ok(Self {
            outbound: outbound_sender,
            events: event_receiver,
            task: Some(task),
        })
    }

    /// Wrap channels serviced by some other transport
    pub fn from_parts(
        outbound: mpsc::UnboundedSender<String>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> Self {
        Self {
            outbound,
            events,
            task: None,
        }
    }

    /// Sender for frames to write to the socket
    pub fn outbound(&self) -> mpsc::UnboundedSender<String> {
        self.outbound.clone()
    }

    /// Next pending event, without waiting
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            log::debug!("Stopping sync connection task");
            task.abort();
        }
    }

    async fn background_task(
        mut socket: SyncSocket,
        mut outbound: mpsc::UnboundedReceiver<String>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) {
        let mut outbound_open = true;
        let mut close_reason: Option<String> = None;

        loop {
            tokio::select! {
                frame = outbound.recv(), if outbound_open => match frame {
                    Some(text) => {
                        log::debug!("Sending frame: {}", text);
                        if let Err(e) = socket.send(Message::Text(text)).await {
                            log::error!("Failed to send frame: {}", e);
                            close_reason = Some(e.to_string());
                            break;
                        }
                    }
                    None => {
                        // nobody left to send; keep reading until the server closes
                        outbound_open = false;
                    }
                },
                incoming = socket.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if events.send(SessionEvent::Message(text)).is_err() {
                            log::debug!("Event receiver dropped, stopping connection task");
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => {
                            if events.send(SessionEvent::Message(text)).is_err() {
                                return;
                            }
                        }
                        Err(e) => log::warn!("Dropping non UTF-8 binary frame: {}", e),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        // tungstenite answers the close; the stream ends on the next read
                        close_reason = frame.map(|f| format!("{} {}", f.code, f.reason).trim().to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::error!("Sync connection failed: {}", e);
                        close_reason = Some(e.to_string());
                        break;
                    }
                    None => break,
                },
            }
        }

        let _ = events.send(SessionEvent::Closed(close_reason));
        log::info!("Sync connection task ended");
    }
}

impl Drop for SyncConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}
