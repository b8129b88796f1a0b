//! `log` adapter for results: records the error with the caller's location
//! and passes the result through unchanged, so it composes with `?`.

use std::fmt::Display;
use tracing::{error, warn};

pub trait ResultExt<T, E> {
    /// Log at error level if this is an `Err`.
    fn log<S: ToString>(self, context: S) -> Result<T, E>;

    /// Log at warn level if this is an `Err`; for failures the caller degrades from.
    fn log_warn<S: ToString>(self, context: S) -> Result<T, E>;
}

impl<T, E: Display> ResultExt<T, E> for Result<T, E> {
    #[track_caller]
    fn log<S: ToString>(self, context: S) -> Result<T, E> {
        if let Err(ref e) = self {
            let caller = std::panic::Location::caller();
            error!(
                target: "dashboard_gateway",
                error = %e,
                file = %format!("{}:{}", caller.file(), caller.line()),
                "{}",
                context.to_string()
            );
        }
        self
    }

    #[track_caller]
    fn log_warn<S: ToString>(self, context: S) -> Result<T, E> {
        if let Err(ref e) = self {
            let caller = std::panic::Location::caller();
            warn!(
                target: "dashboard_gateway",
                error = %e,
                file = %format!("{}:{}", caller.file(), caller.line()),
                "{}",
                context.to_string()
            );
        }
        self
    }
}
