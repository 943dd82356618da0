//! Authenticated client for the workload-protection (Compute) API.
//!
//! Logs in through the management plane or directly against the Compute
//! console, keeps the session token fresh, retries transient failures and
//! walks `Total-Count` paginated endpoints.

pub mod auth;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod pagination;
pub mod reporter;
pub mod session;
pub mod transport;

pub use auth::{Authenticator, HttpAuthenticator};
pub use client::{ComputeClient, ComputeRequest};
pub use config::ComputeConfig;
pub use error::{ComputeError, ComputeResult};
pub use pagination::{PAGE_LIMIT, PageAccumulator, TOTAL_COUNT_HEADER};
pub use reporter::{OrExit, error_and_exit};
pub use session::{AuthMode, Clock, Session, SystemClock};
pub use transport::RetryingTransport;
