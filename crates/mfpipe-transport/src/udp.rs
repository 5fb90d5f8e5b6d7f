use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::traits::{Mode, Transport};

/// UDP datagram transport.
///
/// The read side binds the endpoint address; the write side sends datagrams
/// to it from an ephemeral port. Datagrams may be lost or reordered, the
/// parser above resynchronises on the sync marker.
pub struct UdpTransport {
    addr: SocketAddrV4,
    socket: Option<UdpSocket>,
    mode: Option<Mode>,
}

impl UdpTransport {
    pub const KIND: &'static str = "udp";

    /// Largest payload handed to a single `send_to`.
    pub const MAX_DATAGRAM: usize = 32 * 1024;

    /// Requested kernel send/receive buffer size.
    pub const SOCKET_BUFFER_SIZE: usize = 512 * 1024;

    const BIND_RETRY_INTERVAL: Duration = Duration::from_millis(1);

    pub fn new(addr: SocketAddrV4) -> Self {
        Self {
            addr,
            socket: None,
            mode: None,
        }
    }

    /// The endpoint address.
    pub fn addr(&self) -> SocketAddrV4 {
        self.addr
    }

    /// Local address of the open socket, if any.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    fn id(&self) -> String {
        format!("udp://{}", self.addr)
    }

    fn bind(&self, addr: SocketAddrV4) -> std::io::Result<UdpSocket> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        set_buffer_sizes(&socket, Self::SOCKET_BUFFER_SIZE);
        Ok(socket)
    }

    fn socket(&self) -> std::io::Result<&UdpSocket> {
        self.socket
            .as_ref()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotConnected))
    }
}

impl Transport for UdpTransport {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    /// Allocate the sending socket.
    fn create(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }
        let socket = self
            .bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))
            .map_err(|source| TransportError::Create {
                id: self.id(),
                source,
            })?;
        debug!(addr = %self.addr, "created udp socket");
        self.socket = Some(socket);
        Ok(())
    }

    fn open(&mut self, mode: Mode, timeout: Duration) -> Result<()> {
        match mode {
            Mode::Write => {
                self.create()?;
                self.mode = Some(Mode::Write);
                Ok(())
            }
            Mode::Read => {
                let start = Instant::now();
                loop {
                    match self.bind(self.addr) {
                        Ok(socket) => {
                            debug!(addr = %self.addr, "bound udp socket for read");
                            self.socket = Some(socket);
                            self.mode = Some(Mode::Read);
                            return Ok(());
                        }
                        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                            if start.elapsed() >= timeout {
                                return Err(TransportError::Timeout {
                                    id: self.id(),
                                    waited: start.elapsed(),
                                });
                            }
                            std::thread::sleep(Self::BIND_RETRY_INTERVAL);
                        }
                        Err(source) => {
                            return Err(TransportError::Open {
                                id: self.id(),
                                source,
                            })
                        }
                    }
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.socket.take().is_some() {
            debug!(addr = %self.addr, mode = ?self.mode, "closed udp socket");
        }
        self.mode = None;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let (n, _from) = self.socket()?.recv_from(buf)?;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let len = buf.len().min(Self::MAX_DATAGRAM);
        self.socket()?.send_to(&buf[..len], self.addr)
    }
}

#[cfg(unix)]
fn set_buffer_sizes(socket: &UdpSocket, size: usize) {
    use std::os::fd::AsRawFd;

    let value = size as libc::c_int;
    for option in [libc::SO_SNDBUF, libc::SO_RCVBUF] {
        // SAFETY: `value` is a valid c_int for the duration of the call and
        // the descriptor is owned by `socket`.
        let rc = unsafe {
            libc::setsockopt(
                socket.as_raw_fd(),
                libc::SOL_SOCKET,
                option,
                (&value as *const libc::c_int).cast::<libc::c_void>(),
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            warn!(
                option,
                error = %std::io::Error::last_os_error(),
                "failed to resize udp socket buffer"
            );
        }
    }
}

#[cfg(not(unix))]
fn set_buffer_sizes(_socket: &UdpSocket, _size: usize) {}
