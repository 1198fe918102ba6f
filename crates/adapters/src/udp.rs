//! UDP datagram transport backed by tokio.

use bytes::Bytes;
use pinba_ports::{BoxFuture, DatagramTransport, PinbaEndpoint};
use pinba_shared::{ErrorClass, ErrorCode, ErrorEnvelope, Result};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;

/// Sends each payload from a fresh ephemeral socket.
///
/// The socket is bound per send with the address family of the resolved
/// target, so IPv4 and IPv6 collectors both work without configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpTransport;

impl UdpTransport {
    /// Create the transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DatagramTransport for UdpTransport {
    fn send(&self, target: PinbaEndpoint, payload: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let address = resolve(&target).await?;
            let socket = UdpSocket::bind(local_address_for(address))
                .await
                .map_err(|error| send_failed(&target, error))?;
            let written = socket
                .send_to(&payload, address)
                .await
                .map_err(|error| send_failed(&target, error))?;

            tracing::debug!(
                endpoint = %target,
                resolved = %address,
                bytes = written,
                "pinba datagram sent"
            );
            if written != payload.len() {
                return Err(ErrorEnvelope::unexpected(
                    ErrorCode::new("transport", "send_failed"),
                    format!("short datagram write: {written} of {} bytes", payload.len()),
                    ErrorClass::NonRetriable,
                )
                .with_metadata("target", target.to_string()));
            }
            Ok(())
        })
    }
}

async fn resolve(target: &PinbaEndpoint) -> Result<SocketAddr> {
    let host = target.host.trim_start_matches('[').trim_end_matches(']');
    let mut addresses = tokio::net::lookup_host((host, target.port))
        .await
        .map_err(|error| resolve_failed(target, &error.to_string()))?;
    addresses
        .next()
        .ok_or_else(|| resolve_failed(target, "no addresses returned"))
}

const fn local_address_for(target: SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(std::net::IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    }
}

fn resolve_failed(target: &PinbaEndpoint, reason: &str) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::new("transport", "resolve_failed"),
        format!("failed to resolve pinba server {target}: {reason}"),
        ErrorClass::Retriable,
    )
    .with_metadata("target", target.to_string())
}

fn send_failed(target: &PinbaEndpoint, error: io::Error) -> ErrorEnvelope {
    let message = format!("failed to send pinba datagram to {target}: {error}");
    let io_envelope = ErrorEnvelope::from(error);
    ErrorEnvelope::unexpected(
        ErrorCode::new("transport", "send_failed"),
        message,
        io_envelope.class,
    )
    .with_metadata("target", target.to_string())
    .with_metadata("io_code", io_envelope.code.to_string())
}
