//! Unix-domain (`AF_UNIX`, `SOCK_STREAM`) socket primitives backing
//! [`super::Endpoint`].

use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use super::Transport;
use crate::error::{Error, Result};

fn new_stream_socket() -> Result<RawFd> {
    // SAFETY: arguments are constant and valid; the return value is checked.
    let fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }
    Ok(fd)
}

fn sockaddr_un(path: &Path) -> Result<(libc::sockaddr_un, libc::socklen_t)> {
    let c_path = CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| Error::Resolve(path.display().to_string()))?;
    let bytes = c_path.as_bytes_with_nul();
    if bytes.len() > 108 {
        // `sun_path` is `[c_char; 108]` on Linux.
        return Err(Error::Resolve(path.display().to_string()));
    }

    let mut addr: libc::sockaddr_un = unsafe { mem::zeroed() };
    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
    for (dst, &src) in addr.sun_path.iter_mut().zip(bytes.iter()) {
        *dst = src as libc::c_char;
    }
    let len = (mem::size_of::<libc::sa_family_t>() + bytes.len()) as libc::socklen_t;
    Ok((addr, len))
}

pub(super) fn connect(path: &Path) -> Result<(RawFd, String)> {
    let fd = new_stream_socket()?;
    let (addr, len) = sockaddr_un(path)?;
    // SAFETY: addr/len describe a correctly sized, initialised sockaddr_un.
    let ret = unsafe { libc::connect(fd, &addr as *const libc::sockaddr_un as *const libc::sockaddr, len) };
    if ret < 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(Error::Io(err));
    }
    Ok((fd, path.display().to_string()))
}

pub(super) fn bind(path: &Path, backlog: i32) -> Result<(RawFd, String)> {
    // Binding to a path that already exists fails with EADDRINUSE; remove
    // stale sockets left behind by a previous, uncleanly terminated run.
    remove_path(path);

    let fd = new_stream_socket()?;
    let (addr, len) = sockaddr_un(path)?;
    // SAFETY: addr/len describe a correctly sized, initialised sockaddr_un.
    let ret = unsafe { libc::bind(fd, &addr as *const libc::sockaddr_un as *const libc::sockaddr, len) };
    if ret < 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(Error::Io(err));
    }

    let effective_backlog = backlog.max(5);
    // SAFETY: fd is a bound socket.
    let ret = unsafe { libc::listen(fd, effective_backlog) };
    if ret < 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(Error::Io(err));
    }

    Ok((fd, path.display().to_string()))
}

pub(super) fn accept(listen_fd: RawFd, listen_path: &Path) -> Result<(RawFd, String, Transport)> {
    // SAFETY: passing null out-params is valid for accept(2) when the
    // caller doesn't need the peer address, which for UDS carries no
    // useful identity beyond the listening path itself.
    let fd = unsafe { libc::accept(listen_fd, std::ptr::null_mut(), std::ptr::null_mut()) };
    if fd < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }
    let path_str = listen_path.display().to_string();
    Ok((fd, path_str, Transport::Uds { path: PathBuf::from(listen_path) }))
}

/// Remove the socket file at `path`, ignoring a missing file.
pub(super) fn remove_path(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != io::ErrorKind::NotFound {
            log::debug!("failed to remove UDS socket file {}: {err}", path.display());
        }
    }
}
