pub mod client;
pub mod transport;

pub use client::{ApiGateway, GatewayConfig};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport, TransportError};
