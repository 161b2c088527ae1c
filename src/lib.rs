//! Sorts a browser window's tabs into named groups, either by hostname or by
//! asking an OpenAI-compatible chat model, and keeps newly opened tabs sorted.
//!
//! The browser is reached through [`browser::TabsApi`]; settings and tab
//! metadata persist in SQLite through [`data::SqliteStore`].

pub mod browser;
pub mod commands;
pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod services;
pub mod state;

pub use browser::TabsApi;
pub use commands::{dispatch, dispatch_json, Command, CommandResponse};
pub use config::ClassifierConfig;
pub use error::AppError;
pub use state::AppState;

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides the default
/// `info` level. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
