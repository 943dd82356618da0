//! Fatal error reporting for binaries.
//!
//! The library never exits on its own; binaries route a fatal
//! [`ComputeError`] through [`error_and_exit`], which prints the status code
//! and messages between blank lines and exits with status 1. The HTTP status
//! is printed, never used as the exit status.

use std::fmt::Write as _;
use std::io::Write as _;

use crate::error::{ComputeError, ComputeResult};

/// Process exit status for every fatal error.
pub const EXIT_STATUS: i32 = 1;

/// Render the diagnostic block printed by [`error_and_exit`].
#[must_use]
pub fn render(status_code: u16, message: Option<&str>, system_message: Option<&str>) -> String {
    let mut out = String::from("\n\n");
    let _ = writeln!(out, "Status Code: {status_code}");
    if let Some(message) = message {
        let _ = writeln!(out, "{message}");
    }
    if let Some(system_message) = system_message {
        let _ = writeln!(out, "{system_message}");
    }
    out.push('\n');
    out
}

/// Print the diagnostic block to stdout and terminate the process.
pub fn error_and_exit(status_code: u16, message: Option<&str>, system_message: Option<&str>) -> ! {
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(render(status_code, message, system_message).as_bytes());
    let _ = stdout.flush();
    std::process::exit(EXIT_STATUS)
}

impl ComputeError {
    /// Underlying cause, when there is one.
    #[must_use]
    pub fn system_message(&self) -> Option<String> {
        std::error::Error::source(self).map(ToString::to_string)
    }

    /// Report this error and terminate the process.
    pub fn exit(&self) -> ! {
        error_and_exit(
            self.status_code(),
            Some(&self.to_string()),
            self.system_message().as_deref(),
        )
    }
}

/// Terminate through the error reporter on `Err`.
pub trait OrExit<T> {
    /// Unwrap the value or report the error and exit.
    fn or_exit(self) -> T;
}

impl<T> OrExit<T> for ComputeResult<T> {
    fn or_exit(self) -> T {
        self.unwrap_or_else(|err| err.exit())
    }
}
