//! HTTP gateway of the snip URL shortener.
//!
//! The gateway exposes the shortening API over axum and delegates every
//! operation to a single [`snip_core::Storage`] backend chosen at startup.

pub mod app;
pub mod auth;
pub mod cli;
pub mod error;
pub mod handlers;
pub mod model;
pub mod state;

pub use app::App;
pub use auth::{CookieSigner, OwnerId, SignerError, AUTH_COOKIE};
pub use cli::{Cli, LogFormatArg, StorageBackend};
pub use error::{AppError, Result};
pub use state::AppState;
