pub mod dtls;
pub mod frame;
pub mod transport;

pub use dtls::{DtlsConnector, PskCredentials, HANDSHAKE_TIMEOUT, STREAM_PORT};
pub use frame::FrameEncoder;
pub use transport::{
    connect_with_retry, Connector, DatagramSink, TransportSession, DEFAULT_HANDSHAKE_ATTEMPTS,
};
