//! pictag Server
//!
//! HTTP surface of the pictag image classification service: an upload page at
//! `/`, top-1 classification at `POST /classify`, plus `/health` and `/metrics`.

pub mod cli;
pub mod config;
pub mod server;
pub mod state;

pub use cli::Cli;
pub use config::ServiceConfig;
pub use server::{build_app, run_server, ApiError};
pub use state::AppState;
