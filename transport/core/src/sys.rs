//! Platform Socket Adapter
//!
//! Small adapter isolating platform socket APIs from the backends. The
//! rest of the crate only sees [`Socket`] (a connected stream descriptor)
//! and the rpmsg helpers below; porting to another platform means porting
//! this module only.
//!
//! Writes use `MSG_NOSIGNAL` so a dead peer surfaces as a
//! `BrokenPipe` error instead of a process-killing `SIGPIPE`.

use std::io;
use std::net::TcpStream;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

#[cfg(target_os = "linux")]
use crate::endpoint::{RpmsgEndpoint, RPMSG_NAME_MAX};

#[cfg(not(unix))]
compile_error!(
    "wirecall-transport currently supports unix platforms only; \
     the `sys` adapter is the porting seam"
);

#[cfg(not(target_os = "macos"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
// macOS has no MSG_NOSIGNAL; SIGPIPE suppression would go through
// SO_NOSIGPIPE at socket setup instead.
#[cfg(target_os = "macos")]
const SEND_FLAGS: libc::c_int = 0;

/// A connected, bidirectional stream socket
///
/// Wraps an owned descriptor. Reads and writes take `&self`: the kernel
/// serializes concurrent I/O on a single descriptor, and the transport
/// core shares one live connection between the accept worker and caller
/// threads through an `Arc<Socket>`.
#[derive(Debug)]
pub struct Socket {
    fd: OwnedFd,
}

impl Socket {
    /// Read up to `buf.len()` bytes; `Ok(0)` means the peer closed the
    /// connection gracefully
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr().cast::<libc::c_void>(),
                buf.len(),
            )
        };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }

    /// Write up to `buf.len()` bytes, returning how many were accepted
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let n = unsafe {
            libc::send(
                self.fd.as_raw_fd(),
                buf.as_ptr().cast::<libc::c_void>(),
                buf.len(),
                SEND_FLAGS,
            )
        };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }

    /// Shut down both directions of the connection
    ///
    /// The descriptor itself is released when the last `Arc<Socket>`
    /// drops; shutdown makes it defunct immediately so that any other
    /// thread still holding a clone fails out of its transfer loop.
    pub fn shutdown(&self) {
        unsafe {
            libc::shutdown(self.fd.as_raw_fd(), libc::SHUT_RDWR);
        }
    }

    /// Test-only connected pair backed by `socketpair(2)`
    #[cfg(test)]
    pub(crate) fn pair() -> io::Result<(Socket, Socket)> {
        let mut fds = [0 as libc::c_int; 2];
        let rc = unsafe {
            libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr())
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        unsafe {
            Ok((
                Socket {
                    fd: OwnedFd::from_raw_fd(fds[0]),
                },
                Socket {
                    fd: OwnedFd::from_raw_fd(fds[1]),
                },
            ))
        }
    }
}

impl From<TcpStream> for Socket {
    fn from(stream: TcpStream) -> Self {
        Self { fd: stream.into() }
    }
}

// =============================================================================
// Rpmsg socket family (Linux-like kernels shipping the rpmsg socket driver)
// =============================================================================

/// Address family of the rpmsg socket driver (NuttX / vendor kernels;
/// not present in the upstream libc crate)
#[cfg(target_os = "linux")]
pub const AF_RPMSG: libc::sa_family_t = 45;

#[cfg(target_os = "linux")]
/// Size of the fixed name fields in `sockaddr_rpmsg`, NUL included
const RPMSG_FIELD_SIZE: usize = RPMSG_NAME_MAX + 1;

#[cfg(target_os = "linux")]
/// Address structure of the rpmsg socket family
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SockaddrRpmsg {
    pub rp_family: libc::sa_family_t,
    pub rp_cpu: [u8; RPMSG_FIELD_SIZE],
    pub rp_name: [u8; RPMSG_FIELD_SIZE],
}

#[cfg(target_os = "linux")]
impl SockaddrRpmsg {
    /// Build an address from an endpoint, with bounded truncating copies
    /// into the fixed-size fields
    pub fn from_endpoint(endpoint: &RpmsgEndpoint) -> Self {
        let mut addr = Self {
            rp_family: AF_RPMSG,
            rp_cpu: [0; RPMSG_FIELD_SIZE],
            rp_name: [0; RPMSG_FIELD_SIZE],
        };
        copy_bounded(&mut addr.rp_cpu, endpoint.cpu.as_bytes());
        copy_bounded(&mut addr.rp_name, endpoint.name.as_bytes());
        addr
    }
}

#[cfg(target_os = "linux")]
/// Copy `src` into `dst`, truncating to leave room for a trailing NUL
fn copy_bounded(dst: &mut [u8; RPMSG_FIELD_SIZE], src: &[u8]) {
    let len = src.len().min(RPMSG_FIELD_SIZE - 1);
    dst[..len].copy_from_slice(&src[..len]);
}

#[cfg(target_os = "linux")]
/// Create an unconnected rpmsg stream socket
pub fn rpmsg_socket() -> io::Result<Socket> {
    let fd = unsafe { libc::socket(libc::c_int::from(AF_RPMSG), libc::SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(Socket {
        fd: unsafe { OwnedFd::from_raw_fd(fd) },
    })
}

#[cfg(target_os = "linux")]
/// Connect an rpmsg socket to a remote endpoint
pub fn rpmsg_connect(socket: &Socket, addr: &SockaddrRpmsg) -> io::Result<()> {
    let rc = unsafe {
        libc::connect(
            socket.fd.as_raw_fd(),
            (addr as *const SockaddrRpmsg).cast::<libc::sockaddr>(),
            std::mem::size_of::<SockaddrRpmsg>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(target_os = "linux")]
/// Bind an rpmsg socket to a local endpoint
pub fn rpmsg_bind(socket: &Socket, addr: &SockaddrRpmsg) -> io::Result<()> {
    let rc = unsafe {
        libc::bind(
            socket.fd.as_raw_fd(),
            (addr as *const SockaddrRpmsg).cast::<libc::sockaddr>(),
            std::mem::size_of::<SockaddrRpmsg>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(target_os = "linux")]
/// Mark an rpmsg socket as listening
pub fn rpmsg_listen(socket: &Socket, backlog: i32) -> io::Result<()> {
    let rc = unsafe { libc::listen(socket.fd.as_raw_fd(), backlog) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(target_os = "linux")]
/// Block until an inbound rpmsg connection arrives
pub fn rpmsg_accept(socket: &Socket) -> io::Result<Socket> {
    let mut addr: SockaddrRpmsg = SockaddrRpmsg {
        rp_family: 0,
        rp_cpu: [0; RPMSG_FIELD_SIZE],
        rp_name: [0; RPMSG_FIELD_SIZE],
    };
    let mut len = std::mem::size_of::<SockaddrRpmsg>() as libc::socklen_t;
    let fd = unsafe {
        libc::accept(
            socket.fd.as_raw_fd(),
            (&mut addr as *mut SockaddrRpmsg).cast::<libc::sockaddr>(),
            &mut len,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(Socket {
        fd: unsafe { OwnedFd::from_raw_fd(fd) },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pair_roundtrip() {
        let (a, b) = Socket::pair().unwrap();

        assert_eq!(a.write(&[1, 2, 3, 4]).unwrap(), 4);

        let mut buf = [0u8; 4];
        assert_eq!(b.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_read_zero_on_peer_close() {
        let (a, b) = Socket::pair().unwrap();
        drop(a);

        let mut buf = [0u8; 4];
        assert_eq!(b.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_write_broken_pipe_no_signal() {
        let (a, b) = Socket::pair().unwrap();
        drop(b);

        // First write may be accepted into the buffer; keep writing until
        // the peer close is observed.
        let mut saw_error = None;
        for _ in 0..64 {
            if let Err(e) = a.write(&[0u8; 512]) {
                saw_error = Some(e);
                break;
            }
        }
        let err = saw_error.expect("write to a closed peer should fail");
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_sockaddr_from_endpoint() {
        let ep = RpmsgEndpoint::new("rpc-port", "remote");
        let addr = SockaddrRpmsg::from_endpoint(&ep);

        assert_eq!(addr.rp_family, AF_RPMSG);
        assert_eq!(&addr.rp_name[..8], b"rpc-port");
        assert_eq!(addr.rp_name[8], 0);
        assert_eq!(&addr.rp_cpu[..6], b"remote");
        assert_eq!(addr.rp_cpu[6], 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_sockaddr_truncates_and_terminates() {
        let ep = RpmsgEndpoint::new(
            "exactly-15-char".to_string() + "-overflow",
            "also-far-too-long-for-the-field",
        );
        let addr = SockaddrRpmsg::from_endpoint(&ep);

        // Endpoint construction already bounds the strings; the last array
        // byte always stays NUL.
        assert_eq!(addr.rp_name[RPMSG_FIELD_SIZE - 1], 0);
        assert_eq!(addr.rp_cpu[RPMSG_FIELD_SIZE - 1], 0);
        assert_eq!(&addr.rp_name[..RPMSG_NAME_MAX], b"exactly-15-char");
    }
}
