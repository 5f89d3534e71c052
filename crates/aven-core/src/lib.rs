pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::AvenConfig;
pub use error::{AvenError, Result};
pub use events::{SessionEvent, VoiceStatus};
pub use types::*;
