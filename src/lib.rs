#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod client;
pub mod config;
pub mod data;
pub mod debounce;
pub mod endpoints;
pub mod format;
pub mod gateway;
pub mod logging;
pub mod pipeline;
pub mod reddit;
pub mod render;
pub mod server;
pub mod session;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
