/// Errors surfaced by notification channels and the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("smtp transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build email message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("unknown channel type: {0}")]
    UnknownChannelType(String),

    #[error("invalid {channel_type} channel config: {reason}")]
    InvalidConfig {
        channel_type: String,
        reason: String,
    },

    #[error("delivery attempt timed out after {0}s")]
    Timeout(u64),
}
