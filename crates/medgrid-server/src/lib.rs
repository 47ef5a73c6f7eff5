pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod ws;

pub use config::{AppConfig, ConfigError, ServerConfig};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{AppState, MedgridServer, ServerBuilder, build_app};
