//! Raw, non-blocking IPv4 TCP syscalls. Everything above this layer talks
//! in terms of `Socket`/`Listener`/`Conn`; this module is the only place
//! `libc` socket calls happen.

use std::io;
use std::mem;
use std::net::Ipv4Addr;
use std::os::unix::io::RawFd;

use crate::sys::syscall;

/// Creates a non-blocking, close-on-exec `AF_INET`/`SOCK_STREAM` socket.
pub fn new_nonblocking_tcp4() -> io::Result<RawFd> {
    let ty = libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC;
    syscall!(socket(libc::AF_INET, ty, 0))
}

fn sockaddr_in(address: Ipv4Addr, port: u16) -> libc::sockaddr_in {
    libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: port.to_be(),
        sin_addr: libc::in_addr {
            s_addr: u32::from(address).to_be(),
        },
        sin_zero: [0; 8],
    }
}

pub fn bind_and_listen(
    fd: RawFd,
    address: Ipv4Addr,
    port: u16,
    backlog: i32,
) -> io::Result<()> {
    let one: libc::c_int = 1;
    syscall!(setsockopt(
        fd,
        libc::SOL_SOCKET,
        libc::SO_REUSEADDR,
        &one as *const _ as *const libc::c_void,
        mem::size_of::<libc::c_int>() as libc::socklen_t,
    ))?;

    let addr = sockaddr_in(address, port);
    syscall!(bind(
        fd,
        &addr as *const _ as *const libc::sockaddr,
        mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
    ))?;

    syscall!(listen(fd, backlog))?;

    Ok(())
}

/// Accepts a pending connection, returning the new fd and the peer's
/// address. The returned fd is inherited as blocking; callers must call
/// [`set_nonblocking`] before registering it.
pub fn accept(fd: RawFd) -> io::Result<(RawFd, libc::sockaddr_in)> {
    let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;

    let confd = syscall!(accept(
        fd,
        &mut addr as *mut _ as *mut libc::sockaddr,
        &mut len,
    ))?;

    Ok((confd, addr))
}

pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let mut nonblocking: libc::c_int = 1;
    syscall!(ioctl(fd, libc::FIONBIO, &mut nonblocking)).map(|_| ())
}

pub fn read(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    let n = syscall!(read(
        fd,
        buf.as_mut_ptr() as *mut libc::c_void,
        buf.len(),
    ))?;
    Ok(n as usize)
}

pub fn write(fd: RawFd, buf: &[u8]) -> io::Result<usize> {
    let n = syscall!(write(
        fd,
        buf.as_ptr() as *const libc::c_void,
        buf.len(),
    ))?;
    Ok(n as usize)
}

pub fn shutdown(fd: RawFd, how: libc::c_int) -> io::Result<()> {
    syscall!(shutdown(fd, how))?;
    Ok(())
}

/// True for errors that mean "try again later" on a non-blocking fd,
/// rather than a real failure.
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sockaddr_in_round_trips_address_and_port() {
        let addr = sockaddr_in(Ipv4Addr::new(127, 0, 0, 1), 9090);
        assert_eq!(u32::from_be(addr.sin_addr.s_addr), u32::from(Ipv4Addr::new(127, 0, 0, 1)));
        assert_eq!(u16::from_be(addr.sin_port), 9090);
    }
}
