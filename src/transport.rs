use std::{
    fmt, io,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    sync::Arc,
};

use crate::error::{LinkError, Result};

pub const DEFAULT_PORT: u16 = 5005;

/// Destination of a UDP message. `UdpSender::send` resolves it on every call;
/// long-running senders resolve once through `ResolvedEndpoint`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn resolve(&self) -> io::Result<SocketAddr> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no destination host given",
            ));
        }

        let mut addrs = (host, self.port).to_socket_addrs()?;
        // The socket is bound on IPv4; prefer an address it can reach.
        let first = addrs.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
        })?;
        if first.is_ipv4() {
            return Ok(first);
        }
        Ok(addrs.find(SocketAddr::is_ipv4).unwrap_or(first))
    }
}

/// An endpoint looked up once, so a per-frame send never waits on DNS.
///
/// A failed lookup is kept and reported as `SendFailed` on every send.
#[derive(Clone, Debug)]
pub struct ResolvedEndpoint {
    endpoint: Endpoint,
    addr: std::result::Result<SocketAddr, (io::ErrorKind, String)>,
}

impl ResolvedEndpoint {
    pub fn new(endpoint: Endpoint) -> Self {
        let addr = endpoint.resolve().map_err(|err| {
            log::warn!("cannot resolve {endpoint}: {err}");
            (err.kind(), err.to_string())
        });
        Self { endpoint, addr }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn addr(&self) -> io::Result<SocketAddr> {
        self.addr
            .clone()
            .map_err(|(kind, message)| io::Error::new(kind, message))
    }
}

impl fmt::Display for ResolvedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.endpoint, f)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::new("127.0.0.1", DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Fire-and-forget UDP sender.
///
/// Cloning shares the one underlying socket. `send_to` takes `&self` and is
/// safe to call from several threads at once, so clones can be handed to the
/// frame loop and to each control worker.
#[derive(Clone, Debug)]
pub struct UdpSender {
    socket: Arc<UdpSocket>,
}

impl UdpSender {
    pub fn bind() -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        log::debug!("udp sender bound to {}", socket.local_addr()?);
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// Attempt exactly one send. Returns the number of bytes written.
    pub fn send(&self, bytes: &[u8], endpoint: &Endpoint) -> Result<usize> {
        self.send_addr(bytes, endpoint.resolve(), endpoint)
    }

    /// Like `send`, without a name lookup.
    pub fn send_resolved(&self, bytes: &[u8], target: &ResolvedEndpoint) -> Result<usize> {
        self.send_addr(bytes, target.addr(), target.endpoint())
    }

    fn send_addr(
        &self,
        bytes: &[u8],
        addr: io::Result<SocketAddr>,
        endpoint: &Endpoint,
    ) -> Result<usize> {
        let sent = addr
            .and_then(|addr| self.socket.send_to(bytes, addr))
            .map_err(|source| LinkError::SendFailed {
                endpoint: endpoint.to_string(),
                source,
            })?;
        log::trace!("sent {sent} bytes to {endpoint}");
        Ok(sent)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    pub(crate) fn loopback_receiver() -> (UdpSocket, Endpoint) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, Endpoint::new("127.0.0.1", port))
    }

    pub(crate) fn recv_text(socket: &UdpSocket) -> String {
        let mut buf = [0u8; 4096];
        let (len, _) = socket.recv_from(&mut buf).unwrap();
        String::from_utf8(buf[..len].to_vec()).unwrap()
    }

    #[test]
    fn delivers_to_loopback() {
        let (receiver, endpoint) = loopback_receiver();
        let sender = UdpSender::bind().unwrap();

        let sent = sender.send(b"{\"reset\":0}", &endpoint).unwrap();
        assert_eq!(sent, 11);
        assert_eq!(recv_text(&receiver), "{\"reset\":0}");
    }

    #[test]
    fn clones_share_the_socket() {
        let (receiver, endpoint) = loopback_receiver();
        let sender = UdpSender::bind().unwrap();
        let clone = sender.clone();

        sender.send(b"a", &endpoint).unwrap();
        clone.send(b"b", &endpoint).unwrap();

        let mut buf = [0u8; 8];
        let (_, from_a) = receiver.recv_from(&mut buf).unwrap();
        let (_, from_b) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(from_a.port(), from_b.port());
    }

    #[test]
    fn empty_host_is_send_failed() {
        let sender = UdpSender::bind().unwrap();
        let err = sender.send(b"x", &Endpoint::new("  ", 5005)).unwrap_err();
        assert!(matches!(err, LinkError::SendFailed { .. }));
        assert!(err.to_string().starts_with("send to"));
    }

    #[test]
    fn unroutable_ipv6_target_is_send_failed() {
        let sender = UdpSender::bind().unwrap();
        let err = sender.send(b"x", &Endpoint::new("::1", 5005)).unwrap_err();
        assert!(matches!(err, LinkError::SendFailed { .. }));
    }

    #[test]
    fn resolved_endpoint_delivers_by_name() {
        let (receiver, endpoint) = loopback_receiver();
        let target = ResolvedEndpoint::new(Endpoint::new("localhost", endpoint.port));
        let sender = UdpSender::bind().unwrap();

        sender.send_resolved(b"one", &target).unwrap();
        sender.send_resolved(b"two", &target).unwrap();
        assert_eq!(recv_text(&receiver), "one");
        assert_eq!(recv_text(&receiver), "two");
        assert_eq!(target.to_string(), format!("localhost:{}", endpoint.port));
    }

    #[test]
    fn failed_lookup_fails_every_send() {
        let target = ResolvedEndpoint::new(Endpoint::new("", 5005));
        let sender = UdpSender::bind().unwrap();
        for _ in 0..2 {
            let err = sender.send_resolved(b"x", &target).unwrap_err();
            assert!(matches!(err, LinkError::SendFailed { .. }));
        }
    }

    #[test]
    fn endpoint_displays_host_and_port() {
        assert_eq!(Endpoint::default().to_string(), "127.0.0.1:5005");
    }
}
