pub mod client_ip;
pub mod forwarder;
pub mod headers;
pub mod message;
pub mod routes;

pub use forwarder::{ForwardError, ForwardingEngine, RouteMatch};
pub use message::{InboundRequest, OutboundRequest, RelayedResponse, UpstreamResponse};
pub use routes::{Route, RouteTable, TlsTrustPolicy};
