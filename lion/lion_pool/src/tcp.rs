//! TCP connections as pooled resources.
//!
//! [`TcpConnector`] supplies the create, validate and dispose callbacks for a
//! `Pool<TcpStream>`. [`PingServer`] is a minimal peer speaking the
//! fixed-size `PING`/`PONG` exchange used to exercise such a pool.

use crate::config::PoolConfig;
use crate::error::Result;
use crate::pool::Pool;
use log::{debug, error, info, trace};
use std::io::{self, Read, Write};
use std::net::{
    IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Request sent by [`ping`]
pub const PING: &[u8; 4] = b"PING";

/// Reply expected from the peer
pub const PONG: &[u8; 4] = b"PONG";

/// Opens, checks and closes TCP client connections
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: SocketAddr,
    connect_timeout: Duration,
    io_timeout: Option<Duration>,
}

impl TcpConnector {
    /// Create a connector for the given peer address
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(1),
            io_timeout: Some(Duration::from_secs(5)),
        }
    }

    /// Set the timeout for establishing a connection
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read/write timeout applied to new connections
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Address this connector dials
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Open a new connection to the peer
    pub fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect_timeout(&self.addr, self.connect_timeout)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(self.io_timeout)?;
        stream.set_write_timeout(self.io_timeout)?;
        debug!("Connected to {}", self.addr);
        Ok(stream)
    }

    /// Check without blocking whether an idle connection is still usable.
    ///
    /// An idle connection should have nothing to read. End of stream means the
    /// peer hung up, and unread bytes mean the exchange is out of step.
    pub fn is_alive(stream: &TcpStream) -> bool {
        if stream.set_nonblocking(true).is_err() {
            return false;
        }

        let mut buf = [0u8; 1];
        let alive = match stream.peek(&mut buf) {
            // EOF or stray bytes
            Ok(_) => false,
            Err(e) => e.kind() == io::ErrorKind::WouldBlock,
        };

        alive && stream.set_nonblocking(false).is_ok()
    }

    /// Shut down both directions of a connection
    pub fn close(stream: TcpStream) {
        if let Err(e) = stream.shutdown(Shutdown::Both) {
            trace!("Shutdown of pooled connection failed: {}", e);
        }
    }

    /// Build a pool of connections to this connector's peer.
    ///
    /// With `validate_on_get`, idle connections are checked with
    /// [`is_alive`](Self::is_alive) before reuse.
    pub fn into_pool(self, config: PoolConfig, validate_on_get: bool) -> Result<Pool<TcpStream>> {
        let mut builder = Pool::builder(config)
            .create(move || self.connect())
            .dispose(Self::close);

        if validate_on_get {
            builder = builder.validate(Self::is_alive);
        }

        builder.build()
    }
}

/// Send `PING` and wait for `PONG`
pub fn ping(stream: &mut TcpStream) -> io::Result<()> {
    stream.write_all(PING)?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply)?;

    if &reply != PONG {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected reply: {:?}", String::from_utf8_lossy(&reply)),
        ));
    }
    Ok(())
}

/// A TCP server answering every `PING` with `PONG`
pub struct PingServer {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PingServer {
    /// Bind to `addr` and start accepting connections in the background
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        let shutdown = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("lion-ping-server".to_string())
            .spawn(move || accept_loop(listener, flag))?;

        info!("Ping server listening on {}", local_addr);

        Ok(Self {
            local_addr,
            shutdown,
            handle: Some(handle),
        })
    }

    /// Address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Block until the accept loop exits
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Ping server thread panicked");
            }
        }
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    ///
    /// Connections already accepted are served until their clients hang up.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        self.shutdown.store(true, Ordering::SeqCst);

        // Wake the blocking accept so it observes the flag
        let _ = TcpStream::connect_timeout(&wake_addr(self.local_addr), Duration::from_secs(1));

        if handle.join().is_err() {
            error!("Ping server thread panicked");
        }
        info!("Ping server on {} stopped", self.local_addr);
    }
}

impl Drop for PingServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Address to dial to reach a listener, replacing a wildcard IP with loopback
fn wake_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}

fn accept_loop(listener: TcpListener, shutdown: Arc<AtomicBool>) {
    for stream in listener.incoming() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        match stream {
            Ok(stream) => {
                let spawned = thread::Builder::new()
                    .name("lion-ping-conn".to_string())
                    .spawn(move || serve_connection(stream));
                if let Err(e) = spawned {
                    error!("Failed to spawn connection handler: {}", e);
                }
            }
            Err(e) => {
                debug!("Ping server accept error: {}", e);
            }
        }
    }
}

fn serve_connection(mut stream: TcpStream) {
    let peer = stream.peer_addr().ok();
    trace!("Serving connection from {:?}", peer);

    let mut request = [0u8; 4];
    loop {
        if stream.read_exact(&mut request).is_err() {
            break;
        }
        if &request == PING && stream.write_all(PONG).is_err() {
            break;
        }
    }

    trace!("Connection from {:?} closed", peer);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_roundtrip() {
        let server = PingServer::bind("127.0.0.1:0").unwrap();
        let connector = TcpConnector::new(server.local_addr());

        let mut stream = connector.connect().unwrap();
        for _ in 0..3 {
            ping(&mut stream).unwrap();
        }
        assert!(TcpConnector::is_alive(&stream));

        TcpConnector::close(stream);
        server.shutdown();
    }

    #[test]
    fn test_is_alive_detects_unread_data() {
        let server = PingServer::bind("127.0.0.1:0").unwrap();
        let mut stream = TcpConnector::new(server.local_addr()).connect().unwrap();

        // Leave the reply unread
        stream.write_all(PING).unwrap();
        thread::sleep(Duration::from_millis(50));

        assert!(!TcpConnector::is_alive(&stream));
    }

    #[test]
    fn test_is_alive_detects_closed_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let stream = TcpConnector::new(addr).connect().unwrap();
        let (accepted, _) = listener.accept().unwrap();
        drop(accepted);
        thread::sleep(Duration::from_millis(50));

        assert!(!TcpConnector::is_alive(&stream));
    }

    #[test]
    fn test_ping_rejects_unexpected_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut request = [0u8; 4];
            conn.read_exact(&mut request).unwrap();
            conn.write_all(b"NOPE").unwrap();
        });

        let mut stream = TcpConnector::new(addr).connect().unwrap();
        let err = ping(&mut stream).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        peer.join().unwrap();
    }

    #[test]
    fn test_wake_addr_replaces_wildcard() {
        let addr: SocketAddr = "0.0.0.0:8003".parse().unwrap();
        assert_eq!(wake_addr(addr), "127.0.0.1:8003".parse().unwrap());

        let addr: SocketAddr = "10.0.0.1:8003".parse().unwrap();
        assert_eq!(wake_addr(addr), addr);
    }
}
