// src/stream.rs

/// Lifecycle of one poll or search stream.
///
/// `Idle -> Pending -> {Settled, Failed}`, and back to `Pending` on the next
/// trigger. A failure never blocks later triggers and carries no backoff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StreamState {
    #[default]
    Idle,
    Pending,
    Settled,
    Failed(String),
}

impl StreamState {
    pub fn is_pending(&self) -> bool {
        matches!(self, StreamState::Pending)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            StreamState::Failed(message) => Some(message),
            _ => None,
        }
    }
}
