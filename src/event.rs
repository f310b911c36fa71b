use std::fmt;

use serde::{Deserialize, Serialize};

/// Path of the sync endpoint on the server
pub const SYNC_PATH: &str = "/ws/emails/";

/// Event pushed by the sync server, tagged by its `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Progress of the running synchronization job
    SyncStatus(SyncStatus),
    /// Job failure reported by the server
    Error { message: String },
    /// Any `type` this client does not know about
    #[serde(other)]
    Unrecognized,
}

/// Phase of a `sync_status` event, tagged by its `status` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    Processing {
        progress: u64,
        total: u64,
        message: MailSummary,
    },
    Completed,
    /// `starting` and any phase added later on the server
    #[serde(other)]
    Other,
}

/// One synchronized message as shown in the emails table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSummary {
    pub subject: String,
    pub sender: String,
    /// Already formatted by the server
    pub date: String,
    #[serde(rename = "attachments", default)]
    pub attachment_count: u32,
}

/// Opaque account identifier, kept in the form it was given
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountId {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountId::Number(id) => write!(f, "{}", id),
            AccountId::Text(id) => f.write_str(id),
        }
    }
}

impl From<u64> for AccountId {
    fn from(id: u64) -> Self {
        AccountId::Number(id.into())
    }
}

impl From<serde_json::Number> for AccountId {
    fn from(id: serde_json::Number) -> Self {
        AccountId::Number(id)
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        AccountId::Text(id)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        AccountId::Text(id.to_string())
    }
}

/// Request sent once to start synchronizing an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub account_id: AccountId,
}

impl SyncEvent {
    /// Decode one inbound text frame
    pub fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Completion percentage of a processing job.
///
/// Not clamped: a server reporting more processed messages than its total
/// yields a value above 100. A job with nothing to process is complete.
pub fn progress_percent(progress: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    progress as f64 / total as f64 * 100.0
}
