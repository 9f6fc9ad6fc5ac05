use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use webrtc_dtls::cipher_suite::CipherSuiteId;
use webrtc_dtls::config::{Config, ExtendedMasterSecretType};
use webrtc_dtls::conn::DTLSConn;
use webrtc_util::conn::Conn;

use super::transport::{Connector, DatagramSink};
use crate::error::TransportError;

/// Fixed UDP port of the streaming endpoint.
pub const STREAM_PORT: u16 = 2100;
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(2000);
/// Length of the raw pre-shared key.
pub const PSK_LEN: usize = 16;

/// Pre-shared key credentials for the streaming endpoint.
#[derive(Clone)]
pub struct PskCredentials {
    identity: String,
    key: [u8; PSK_LEN],
}

impl PskCredentials {
    /// `client_key_hex` is the textual key from pairing; the handshake uses
    /// its raw bytes.
    pub fn from_hex(identity: &str, client_key_hex: &str) -> Result<Self, TransportError> {
        let bytes = hex::decode(client_key_hex.trim())
            .map_err(|e| TransportError::InvalidKey(e.to_string()))?;
        let key: [u8; PSK_LEN] = bytes.as_slice().try_into().map_err(|_| {
            TransportError::InvalidKey(format!(
                "expected {} bytes, got {}",
                PSK_LEN,
                bytes.len()
            ))
        })?;
        if identity.is_empty() {
            return Err(TransportError::InvalidKey("empty PSK identity".to_string()));
        }
        Ok(Self {
            identity: identity.to_string(),
            key,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn key(&self) -> &[u8; PSK_LEN] {
        &self.key
    }
}

impl std::fmt::Debug for PskCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PskCredentials")
            .field("identity", &self.identity)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// DTLS 1.2 client restricted to `TLS_PSK_WITH_AES_128_GCM_SHA256`.
pub struct DtlsConnector {
    remote: SocketAddr,
    credentials: PskCredentials,
    handshake_timeout: Duration,
}

impl DtlsConnector {
    pub fn new(remote: SocketAddr, credentials: PskCredentials) -> Self {
        Self {
            remote,
            credentials,
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    fn config(&self) -> Config {
        let key = self.credentials.key.to_vec();
        Config {
            psk: Some(Arc::new(
                move |_hint: &[u8]| -> Result<Vec<u8>, webrtc_dtls::Error> { Ok(key.clone()) },
            )),
            psk_identity_hint: Some(self.credentials.identity.as_bytes().to_vec()),
            cipher_suites: vec![CipherSuiteId::Tls_Psk_With_Aes_128_Gcm_Sha256],
            extended_master_secret: ExtendedMasterSecretType::Request,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Connector for DtlsConnector {
    async fn connect(&self) -> Result<Box<dyn DatagramSink>, TransportError> {
        let local = if self.remote.is_ipv4() {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
        } else {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(self.remote).await?;
        let socket: Arc<dyn Conn + Send + Sync> = Arc::new(socket);

        log::debug!("Starting DTLS handshake with {}", self.remote);
        match tokio::time::timeout(
            self.handshake_timeout,
            DTLSConn::new(socket, self.config(), true, None),
        )
        .await
        {
            Ok(Ok(conn)) => Ok(Box::new(DtlsSink { conn })),
            Ok(Err(e)) => Err(TransportError::Dtls(e.to_string())),
            // dropping the pending handshake releases the socket
            Err(_) => Err(TransportError::HandshakeTimeout),
        }
    }

    fn describe(&self) -> String {
        self.remote.to_string()
    }
}

struct DtlsSink {
    conn: DTLSConn,
}

#[async_trait]
impl DatagramSink for DtlsSink {
    async fn send(&self, datagram: &[u8]) -> Result<(), TransportError> {
        Conn::send(&self.conn, datagram)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Dtls(e.to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        Conn::close(&self.conn)
            .await
            .map_err(|e| TransportError::Dtls(e.to_string()))
    }
}
