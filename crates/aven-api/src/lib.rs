//! HTTP front for the AVEN knowledge base.
//!
//! Serves the retrieval endpoint used by the chat widget, the function-call
//! webhook used by the voice assistant, and a health check.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
