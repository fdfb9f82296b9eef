//! Process-wide setup: logging and HTTP clients.

mod client;
mod logger;

pub use client::{init_client, init_redirect_client};
pub use logger::init_logger_with;
