use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}
