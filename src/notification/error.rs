use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("push transport failed: {0}")]
    Transport(String),
}
