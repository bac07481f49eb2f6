#![forbid(unsafe_code)]

pub mod config;
pub mod routes;
pub mod telemetry;

pub use config::ServerConfig;
pub use routes::{AppState, router};
pub use telemetry::{LogFormat, init_tracing};
