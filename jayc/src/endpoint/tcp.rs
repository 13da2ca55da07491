//! TCP (`AF_INET`, `SOCK_STREAM`) socket primitives backing [`super::Endpoint`].
//!
//! Sockets are created and wired up with raw `libc` calls rather than
//! `std::net`, mirroring the way `heph`'s `net::tcp::server::new_listener`
//! builds its listener by hand (it needs `SO_REUSEADDR` and non-blocking
//! mode before `bind`, which `std::net::TcpListener` doesn't expose); we
//! need the same kind of control for `MSG_NOSIGNAL` sends and bounded
//! `poll(2)`.

use std::ffi::c_void;
use std::io;
use std::mem;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::os::unix::io::RawFd;

use super::Transport;
use crate::error::{Error, Result};

/// Resolve `host` (a dotted IPv4 address or a DNS name) to an IPv4 address.
fn resolve(host: &str, port: u16) -> Result<Ipv4Addr> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(ip);
    }
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|_| Error::Resolve(host.to_owned()))?;
    for addr in addrs {
        if let SocketAddr::V4(v4) = addr {
            return Ok(*v4.ip());
        }
    }
    Err(Error::Resolve(host.to_owned()))
}

fn sockaddr_in(ip: Ipv4Addr, port: u16) -> libc::sockaddr_in {
    libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: port.to_be(),
        sin_addr: libc::in_addr { s_addr: u32::from_ne_bytes(ip.octets()) },
        sin_zero: [0; 8],
    }
}

fn new_stream_socket() -> Result<RawFd> {
    // SAFETY: arguments are constant and valid; the return value is checked.
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }
    Ok(fd)
}

fn ref_string(ip: IpAddr, port: u16) -> String {
    format!("{ip}:{port}")
}

pub(super) fn connect(host: &str, port: u16) -> Result<(RawFd, String)> {
    let ip = resolve(host, port)?;
    let fd = new_stream_socket()?;
    let addr = sockaddr_in(ip, port);
    // SAFETY: addr is a correctly sized, initialised sockaddr_in.
    let ret = unsafe {
        libc::connect(
            fd,
            &addr as *const libc::sockaddr_in as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        let err = io::Error::last_os_error();
        // SAFETY: fd was just opened by us.
        unsafe { libc::close(fd) };
        return Err(Error::Io(err));
    }
    Ok((fd, ref_string(IpAddr::V4(ip), port)))
}

pub(super) fn bind(host: &str, port: u16, backlog: i32) -> Result<(RawFd, String)> {
    let ip = resolve(host, port)?;
    let fd = new_stream_socket()?;

    let reuse: libc::c_int = 1;
    // SAFETY: fd is valid; the option pointer and length match SO_REUSEADDR's layout.
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &reuse as *const libc::c_int as *const c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(Error::Io(err));
    }

    let addr = sockaddr_in(ip, port);
    // SAFETY: addr is a correctly sized, initialised sockaddr_in.
    let ret = unsafe {
        libc::bind(
            fd,
            &addr as *const libc::sockaddr_in as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(Error::Io(err));
    }

    // The actual bound port may differ from `port` when `port == 0`; read
    // it back so the reference string reflects reality.
    let bound_port = local_port(fd).unwrap_or(port);

    let effective_backlog = backlog.max(5);
    // SAFETY: fd is a bound socket.
    let ret = unsafe { libc::listen(fd, effective_backlog) };
    if ret < 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(Error::Io(err));
    }

    Ok((fd, ref_string(IpAddr::V4(ip), bound_port)))
}

fn local_port(fd: RawFd) -> Option<u16> {
    let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
    // SAFETY: addr/len describe a correctly sized buffer for getsockname.
    let ret = unsafe {
        libc::getsockname(fd, &mut addr as *mut libc::sockaddr_in as *mut libc::sockaddr, &mut len)
    };
    if ret < 0 {
        return None;
    }
    Some(u16::from_be(addr.sin_port))
}

pub(super) fn accept(listen_fd: RawFd) -> Result<(RawFd, String, Transport)> {
    let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
    // SAFETY: addr/len describe a correctly sized buffer for accept.
    let fd = unsafe {
        libc::accept(listen_fd, &mut addr as *mut libc::sockaddr_in as *mut libc::sockaddr, &mut len)
    };
    if fd < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }
    let ip = Ipv4Addr::from(u32::from_ne_bytes(addr.sin_addr.s_addr.to_ne_bytes()));
    let port = u16::from_be(addr.sin_port);
    let transport = Transport::Tcp { host: ip.to_string(), port };
    Ok((fd, ref_string(IpAddr::V4(ip), port), transport))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_dotted_ip_without_dns() {
        assert_eq!(resolve("127.0.0.1", 80).unwrap(), Ipv4Addr::new(127, 0, 0, 1));
    }
}
