//! Dashboard Gateway Library
//!
//! Request-time access control in front of the dashboard renderer:
//!
//! - **Gate**: every page request is classified and either allowed,
//!   sent to the login page, or sent to the caller's landing area
//! - **Sessions**: the hosted provider's session cookie is read, refreshed
//!   and rotated on the way through
//! - **Sign-out**: provider revocation plus a purge of every provider cookie
//! - **Roles**: `admin` / `user` from the profile table, with the admin API
//!   guarded by the same check
//!
//! ## Modules
//!
//! - [`auth`]: The gate middleware, access resolution, auth endpoints
//! - [`config`]: Configuration from file and environment
//! - [`provider`]: Identity and profile store clients
//! - [`routes`]: Route classification
//! - [`session_cookie`]: Session cookie encoding
//! - [`state`]: Shared application state

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod profiles;
pub mod provider;
pub mod proxy;
pub mod result_ext;
pub mod routes;
pub mod session_cookie;
pub mod state;

pub use error::{GateError, GateResult};
pub use result_ext::ResultExt;
