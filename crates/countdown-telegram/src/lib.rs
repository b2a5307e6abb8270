pub mod adapter;
pub mod context;
pub mod error;
pub mod handler;
pub mod keyboard;
pub mod transport;

pub use adapter::TelegramAdapter;
pub use context::TelegramContext;
pub use error::TelegramError;
pub use transport::TelegramTransport;
