//! Raw epoll wrapper. Level-triggered only: the spec's flip-flop interest
//! re-registration (see `EventLoop`/`Conn`) depends on getting a fresh
//! notification every time a socket is readable/writable, not just on edges.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use libc::{c_int, EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLOUT, EPOLLRDHUP};

use crate::mask::Mask;
use crate::sys::syscall;

pub struct Epoll {
    epfd: RawFd,
}

impl Epoll {
    pub fn new() -> io::Result<Epoll> {
        let epfd = syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?;
        Ok(Epoll { epfd })
    }

    pub fn wait(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<()> {
        let timeout_ms = timeout
            .map(|to| to.as_millis().min(i32::MAX as u128) as c_int)
            .unwrap_or(-1);

        let n = syscall!(epoll_wait(
            self.epfd,
            events.raw.as_mut_ptr(),
            events.raw.capacity() as i32,
            timeout_ms,
        ))?;

        unsafe { events.raw.set_len(n as usize) };

        Ok(())
    }

    pub fn add(&self, fd: RawFd, interest: Mask) -> io::Result<()> {
        let mut info = libc::epoll_event {
            events: mask_to_epoll(interest),
            u64: fd as u64,
        };
        syscall!(epoll_ctl(self.epfd, libc::EPOLL_CTL_ADD, fd, &mut info))?;
        Ok(())
    }

    pub fn modify(&self, fd: RawFd, interest: Mask) -> io::Result<()> {
        let mut info = libc::epoll_event {
            events: mask_to_epoll(interest),
            u64: fd as u64,
        };
        syscall!(epoll_ctl(self.epfd, libc::EPOLL_CTL_MOD, fd, &mut info))?;
        Ok(())
    }

    pub fn delete(&self, fd: RawFd) -> io::Result<()> {
        let mut info = libc::epoll_event { events: 0, u64: 0 };
        syscall!(epoll_ctl(self.epfd, libc::EPOLL_CTL_DEL, fd, &mut info))?;
        Ok(())
    }
}

fn mask_to_epoll(mask: Mask) -> u32 {
    let mut kind = 0;

    if mask.is_readable() {
        kind |= EPOLLIN;
    }

    if mask.is_writable() {
        kind |= EPOLLOUT;
    }

    kind as u32
}

impl AsRawFd for Epoll {
    fn as_raw_fd(&self) -> RawFd {
        self.epfd
    }
}

impl Drop for Epoll {
    fn drop(&mut self) {
        unsafe {
            let _ = libc::close(self.epfd);
        }
    }
}

pub struct Events {
    raw: Vec<libc::epoll_event>,
}

impl Events {
    pub fn with_capacity(n: usize) -> Events {
        Events {
            raw: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Returns the `(fd, mask)` pair at `idx`.
    ///
    /// Per the spec's open question on `ERR`/`RDHUP` handling: an event with
    /// *both* `EPOLLERR` and `EPOLLRDHUP` set is swallowed (returns `None`)
    /// to preserve the source's asymmetric filtering; either flag alone is
    /// folded into the returned mask's internal hangup bit, which `Conn`'s
    /// handlers treat as an additional peer-hangup signal.
    pub fn get(&self, idx: usize) -> Option<(RawFd, Mask)> {
        let event = self.raw.get(idx)?;
        let epoll = event.events as c_int;

        if (epoll & EPOLLERR != 0) && (epoll & EPOLLRDHUP != 0) {
            return None;
        }

        let mut mask = Mask::empty();

        if epoll & EPOLLIN != 0 {
            mask |= Mask::READABLE;
        }

        if epoll & EPOLLOUT != 0 {
            mask |= Mask::WRITABLE;
        }

        if epoll & EPOLLERR != 0 {
            mask |= Mask::ERROR;
        }

        if (epoll & EPOLLRDHUP != 0) || (epoll & EPOLLHUP != 0) {
            mask |= Mask::HUP;
        }

        Some((event.u64 as RawFd, mask))
    }
}
