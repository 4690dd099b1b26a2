pub mod app_config;
pub mod request;

pub use app_config::Cli;
pub use request::{parse_header, parse_url};
