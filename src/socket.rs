//! Non-blocking TCP wrappers: `Socket` holds the shared state, `Listener`
//! specializes it with an `accept` handler, `Conn` with `read`/`write`
//! handlers. See SPEC_FULL.md §4.3.

use std::cell::RefCell;
use std::io;
use std::mem;
use std::net::Ipv4Addr;
use std::os::unix::io::RawFd;
use std::rc::Rc;

use log::trace;

use crate::action::Action;
use crate::addr;
use crate::error::{Error, Result};
use crate::event_loop::{EventLoop, TriggerContext};
use crate::mask::Mask;
use crate::selector::Handler;
use crate::sys::socket as raw;

/// Which half(s) of a connection to shut down. Mirrors `libc::SHUT_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownHow {
    Read,
    Write,
    Both,
}

impl ShutdownHow {
    fn to_libc(self) -> i32 {
        match self {
            ShutdownHow::Read => libc::SHUT_RD,
            ShutdownHow::Write => libc::SHUT_WR,
            ShutdownHow::Both => libc::SHUT_RDWR,
        }
    }
}

/// Shared state behind both `Listener` and `Conn`.
///
/// `closed_count` tracks how many of the two halves have been shut down:
/// `0` open, `1` one half shut, `2` fully closed (the descriptor has been
/// `close`d and must not be touched again).
pub struct Socket {
    network: &'static str,
    address: Ipv4Addr,
    port: u16,
    in_buf: Vec<u8>,
    out_buf: Vec<u8>,
    closed_count: u8,
    fd: RawFd,
}

impl Socket {
    fn new(network: &'static str, addr: &str) -> Result<Socket> {
        let (address, port) = addr::parse_ipv4(addr)?;
        let fd = raw::new_nonblocking_tcp4()?;
        Ok(Socket {
            network,
            address,
            port,
            in_buf: Vec::new(),
            out_buf: Vec::new(),
            closed_count: 0,
            fd,
        })
    }

    /// Builds a `Socket` around an fd that is already connected (used by the
    /// accept handler), resolving its network/address/port from `addr`.
    fn from_accepted(fd: RawFd, addr: libc::sockaddr_in) -> Socket {
        let address = Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr));
        let port = u16::from_be(addr.sin_port);
        Socket {
            network: "tcp4",
            address,
            port,
            in_buf: Vec::new(),
            out_buf: Vec::new(),
            closed_count: 0,
            fd,
        }
    }

    /// Builds a `Socket` around an arbitrary fd without touching the
    /// kernel, for use in tests that only exercise in-process bookkeeping.
    /// Callers that pass a real, open fd are responsible for its lifetime;
    /// passing `closed_count: 2` suppresses `Drop`'s `close()` entirely.
    #[cfg(test)]
    pub(crate) fn from_raw_parts(
        network: &'static str,
        address: Ipv4Addr,
        port: u16,
        fd: RawFd,
        closed_count: u8,
    ) -> Socket {
        Socket {
            network,
            address,
            port,
            in_buf: Vec::new(),
            out_buf: Vec::new(),
            closed_count,
            fd,
        }
    }

    pub fn network(&self) -> &'static str {
        self.network
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn closed_count(&self) -> u8 {
        self.closed_count
    }

    /// Forces both halves closed and closes the descriptor.
    pub fn close(&mut self) {
        if self.closed_count == 2 {
            return;
        }
        trace!("closing fd {}", self.fd);
        self.closed_count = 2;
        unsafe {
            libc::close(self.fd);
        }
    }

    /// Shuts down one half. Once both halves have been shut down this calls
    /// `close`.
    pub fn shutdown(&mut self, how: ShutdownHow) -> io::Result<()> {
        if self.closed_count == 2 {
            return Ok(());
        }

        self.closed_count += 1;

        let result = raw::shutdown(self.fd, how.to_libc());

        if self.closed_count >= 2 {
            self.close();
        }

        result
    }

    /// Drains and returns the inbound buffer.
    pub fn read(&mut self) -> Vec<u8> {
        mem::take(&mut self.in_buf)
    }

    /// Appends `data` to the outbound buffer; actual transmission happens on
    /// the next WRITABLE readiness.
    pub fn write(&mut self, data: &[u8]) {
        self.out_buf.extend_from_slice(data);
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.close();
    }
}

/// Wraps a listening socket; its readiness handler is `accept`.
pub struct Listener {
    socket: Rc<RefCell<Socket>>,
}

impl Listener {
    /// Creates a non-blocking listening socket for `network`/`addr`.
    /// `network` must be `"tcp4"`.
    pub fn new(network: &str, addr: &str) -> Result<Listener> {
        if network != "tcp4" {
            return Err(Error::UnknownNetwork(network.to_string()));
        }
        let socket = Socket::new("tcp4", addr)?;
        Ok(Listener {
            socket: Rc::new(RefCell::new(socket)),
        })
    }

    pub fn fd(&self) -> RawFd {
        self.socket.borrow().fd
    }

    /// Binds and listens with backlog 1024. On failure the socket is closed
    /// and the error propagated.
    pub fn bind_and_listen(&self) -> Result<()> {
        let mut socket = self.socket.borrow_mut();
        let (address, port, fd) = (socket.address, socket.port, socket.fd);

        if let Err(err) = raw::bind_and_listen(fd, address, port, 1024) {
            socket.close();
            return Err(Error::Syscall(err));
        }

        Ok(())
    }

    /// Installs the `accept` handler as READABLE on `el`'s selector.
    pub fn register_accept(&self, el: &mut EventLoop) -> Result<()> {
        let fd = self.fd();
        el.register_socket(fd, Mask::READABLE, self.socket.clone(), make_accept_handler(fd))
    }

    pub fn close(&self) {
        self.socket.borrow_mut().close();
    }
}

fn make_accept_handler(fd: RawFd) -> Handler {
    Box::new(move |el, datum| accept_handler(el, fd, datum))
}

fn accept_handler(el: &mut EventLoop, fd: RawFd, datum: &Rc<RefCell<Socket>>) -> Action {
    let (confd, peer) = match raw::accept(fd) {
        Ok(pair) => pair,
        Err(ref err) if raw::is_transient(err) => {
            reinstall_accept(el, fd, datum);
            return Action::Continue;
        }
        Err(_) => {
            reinstall_accept(el, fd, datum);
            return Action::Continue;
        }
    };

    if let Err(_err) = raw::set_nonblocking(confd) {
        unsafe {
            libc::close(confd);
        }
        reinstall_accept(el, fd, datum);
        return Action::Continue;
    }

    let conn_socket = Rc::new(RefCell::new(Socket::from_accepted(confd, peer)));
    let network = conn_socket.borrow().network;
    let address = conn_socket.borrow().address;
    let port = conn_socket.borrow().port;

    if el
        .register_socket(confd, Mask::READABLE, conn_socket, make_read_handler(confd))
        .is_err()
    {
        reinstall_accept(el, fd, datum);
        return Action::Continue;
    }

    el.set_trigger_context(TriggerContext::PeerInfo {
        network,
        address,
        port,
    });

    reinstall_accept(el, fd, datum);
    Action::TriggerOpenEvent
}

fn reinstall_accept(el: &mut EventLoop, fd: RawFd, datum: &Rc<RefCell<Socket>>) {
    let _ = el.register_socket(fd, Mask::READABLE, datum.clone(), make_accept_handler(fd));
}

/// Wraps a connected socket; its handlers are `read` and `write`.
#[derive(Clone)]
pub struct Conn {
    socket: Rc<RefCell<Socket>>,
}

impl Conn {
    pub(crate) fn new(socket: Rc<RefCell<Socket>>) -> Conn {
        Conn { socket }
    }

    pub fn network(&self) -> &'static str {
        self.socket.borrow().network
    }

    pub fn address(&self) -> Ipv4Addr {
        self.socket.borrow().address
    }

    pub fn port(&self) -> u16 {
        self.socket.borrow().port
    }

    pub fn fd(&self) -> RawFd {
        self.socket.borrow().fd
    }

    /// Drains and returns the bytes received so far.
    pub fn read(&self) -> Vec<u8> {
        self.socket.borrow_mut().read()
    }

    /// Queues `data` for transmission on the next WRITABLE readiness.
    pub fn write(&self, data: &[u8]) {
        self.socket.borrow_mut().write(data);
    }

    pub fn close(&self) {
        self.socket.borrow_mut().close();
    }
}

fn make_read_handler(fd: RawFd) -> Handler {
    Box::new(move |el, datum| read_handler(el, fd, datum))
}

fn read_handler(el: &mut EventLoop, fd: RawFd, datum: &Rc<RefCell<Socket>>) -> Action {
    let mut buf = [0u8; 1024];
    let action;

    {
        let mut socket = datum.borrow_mut();
        match raw::read(socket.fd, &mut buf) {
            Ok(n) if n > 0 => {
                socket.in_buf.extend_from_slice(&buf[..n]);
                action = Action::TriggerDataEvent;
            }
            Ok(_) => {
                let _ = socket.shutdown(ShutdownHow::Read);
                action = Action::ShutdownRd;
            }
            Err(ref err) if raw::is_transient(err) => {
                action = Action::Continue;
            }
            Err(_) => {
                let _ = socket.shutdown(ShutdownHow::Read);
                action = Action::ShutdownRd;
            }
        }
    }

    if action == Action::TriggerDataEvent {
        el.set_trigger_context(TriggerContext::IncomingData(Conn::new(datum.clone())));
    }

    if datum.borrow().closed_count == 0 {
        let _ = el.register_socket(fd, Mask::WRITABLE, datum.clone(), make_write_handler(fd));
    }

    action
}

fn make_write_handler(fd: RawFd) -> Handler {
    Box::new(move |el, datum| write_handler(el, fd, datum))
}

fn write_handler(el: &mut EventLoop, fd: RawFd, datum: &Rc<RefCell<Socket>>) -> Action {
    let action;

    {
        let mut socket = datum.borrow_mut();

        if socket.out_buf.is_empty() {
            action = Action::Continue;
        } else {
            match raw::write(socket.fd, &socket.out_buf) {
                Ok(n) if n > 0 => {
                    socket.out_buf.drain(..n);
                    action = Action::Continue;
                }
                _ => {
                    let _ = socket.shutdown(ShutdownHow::Write);
                    action = Action::ShutdownWr;
                }
            }
        }
    }

    if datum.borrow().closed_count == 0 {
        let _ = el.register_socket(fd, Mask::READABLE, datum.clone(), make_read_handler(fd));
    }

    action
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_rejects_unknown_network() {
        let err = Listener::new("tcp6", "::1:9090").unwrap_err();
        assert!(matches!(err, Error::UnknownNetwork(_)));
    }

    #[test]
    fn socket_shutdown_is_monotone_and_caps_at_two() {
        let mut socket = Socket::from_raw_parts("tcp4", Ipv4Addr::LOCALHOST, 0, -1, 0);
        // fd -1 makes the underlying syscalls fail, but closed_count still advances.
        let _ = socket.shutdown(ShutdownHow::Read);
        assert_eq!(socket.closed_count(), 1);
        let _ = socket.shutdown(ShutdownHow::Write);
        assert_eq!(socket.closed_count(), 2);
        let _ = socket.shutdown(ShutdownHow::Write);
        assert_eq!(socket.closed_count(), 2);
    }
}
