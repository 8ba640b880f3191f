//! Desktop socket implementation using tokio-tungstenite

mod transport;

pub use transport::WsTransportFactory;
