pub mod app;
pub mod config;
pub mod controller;
pub mod event;
pub mod session;
pub mod ui;

// Re-export commonly used types
pub use app::{App, SyncView};
pub use config::Config;
pub use controller::{ProgressController, Renderer};
pub use event::{AccountId, MailSummary, SyncEvent, SyncRequest, SyncStatus};
pub use session::{SessionEvent, SyncConnection};
