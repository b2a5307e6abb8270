use countdown_core::TransportError;
use teloxide::{ApiError, RequestError};

/// Errors produced by the Telegram adapter.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("teloxide error: {0}")]
    Teloxide(#[from] RequestError),

    #[error("no bot token configured")]
    NoToken,

    /// Telegram message ids are 32-bit; ours are wider.
    #[error("message id out of range: {0}")]
    MessageIdOutOfRange(i64),
}

impl From<TelegramError> for TransportError {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::Teloxide(RequestError::Api(api)) => match api {
                ApiError::MessageToEditNotFound
                | ApiError::MessageToDeleteNotFound
                | ApiError::MessageIdInvalid => TransportError::MessageNotFound(api.to_string()),
                other => TransportError::Rejected(other.to_string()),
            },
            TelegramError::Teloxide(RequestError::RetryAfter(after)) => TransportError::RateLimited {
                secs: u64::from(after.seconds()),
            },
            TelegramError::Teloxide(other) => TransportError::Network(other.to_string()),
            TelegramError::MessageIdOutOfRange(id) => {
                TransportError::MessageNotFound(format!("message id {id}"))
            }
            TelegramError::NoToken => TransportError::Rejected("no bot token configured".into()),
        }
    }
}
