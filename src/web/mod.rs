//! The web module for handling the Axum API.
//! This file declares the other files in this directory as sub-modules.

pub mod api;
pub mod error;
pub mod login_rate_limit;
pub mod models;
pub mod rate_limiter;
pub mod session;
pub mod token_blacklist;

pub use api::{AppState, AppStateInner, create_router};
