#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate tracing;

pub mod app;
pub mod cli;
pub mod error;
pub mod http;
pub mod redirect;
pub mod report;
pub mod timeline;
pub mod tls;
pub mod trace;

pub use error::HttpstatError;
