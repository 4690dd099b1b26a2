//! The exchange driver and the transport pieces it is built from.

pub mod body;
pub mod connector;
pub mod handler;
pub mod headers;
pub mod proxy;
pub mod request;
pub mod transport;

pub use body::BodyTarget;
pub use connector::IpFamily;
pub use handler::{Driver, Exchange, ExchangeOutcome, Visit};
pub use proxy::ProxyPolicy;
pub use request::{BodySource, ExchangeRequest, RequestTemplate};
pub use transport::{Transport, TransportPolicy};
