//! The readiness selector: a thin wrapper over epoll plus an fd-indexed
//! table of registrations, per §3/§4.1 of the design.

use std::cell::RefCell;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::time::Duration;

use log::{trace, warn};

use crate::error::{Error, Result};
use crate::event_loop::EventLoop;
use crate::mask::Mask;
use crate::socket::Socket;
use crate::sys::epoll::{Epoll, Events};

/// A readiness handler: invoked with the loop and the fd's datum, returns
/// the [`Action`](crate::Action) the loop should take next.
pub(crate) type Handler = Box<dyn FnMut(&mut EventLoop, &Rc<RefCell<Socket>>) -> crate::Action>;

struct SelectorKey {
    mask: Mask,
    datum: Rc<RefCell<Socket>>,
    handler: Handler,
}

/// Fixed-capacity, fd-indexed registration table over epoll.
pub struct Selector {
    epoll: Epoll,
    table: Vec<Option<SelectorKey>>,
    events: Events,
}

impl Selector {
    /// Allocates the epoll instance and an fd-indexed table of capacity
    /// `size`.
    pub fn new(size: usize) -> Result<Selector> {
        let epoll = Epoll::new().map_err(Error::Syscall)?;
        Ok(Selector {
            epoll,
            table: (0..size).map(|_| None).collect(),
            events: Events::with_capacity(size),
        })
    }

    pub fn capacity(&self) -> usize {
        self.table.len()
    }

    fn check_bounds(&self, fd: RawFd) -> Result<()> {
        if fd < 0 || fd as usize >= self.table.len() {
            return Err(Error::FdOverLimit(fd));
        }
        Ok(())
    }

    /// Registers `handler`/`datum` for `mask` on `fd`, replacing whatever
    /// was previously registered at that fd (see §9: the redesign corrects
    /// the source's behavior of silently ignoring the new datum on an
    /// existing key).
    pub(crate) fn register(
        &mut self,
        fd: RawFd,
        mask: Mask,
        datum: Rc<RefCell<Socket>>,
        handler: Handler,
    ) -> Result<()> {
        self.check_bounds(fd)?;

        if !mask.is_valid_interest() {
            return Err(Error::UnknownMask(mask.as_u32()));
        }

        let existed = self.table[fd as usize].is_some();

        trace!(
            "{} fd {} for {:?}",
            if existed { "modifying" } else { "registering" },
            fd,
            mask
        );

        if existed {
            self.epoll.modify(fd, mask).map_err(Error::Syscall)?;
        } else {
            self.epoll.add(fd, mask).map_err(Error::Syscall)?;
        }

        self.table[fd as usize] = Some(SelectorKey {
            mask,
            datum,
            handler,
        });

        Ok(())
    }

    /// Deregisters `mask` for `fd`.
    ///
    /// If no key exists, or the key's current mask shares no bits with
    /// `mask`, this is a no-op (logged at `warn`). A narrower-than-current
    /// `mask` still issues a full `EPOLL_CTL_DEL` rather than narrowing the
    /// interest set — see the open question in SPEC_FULL.md §9, preserved
    /// here for fidelity to the source.
    pub(crate) fn unregister(&mut self, fd: RawFd, mask: Mask) -> Result<()> {
        self.check_bounds(fd)?;

        let has_overlap = self.table[fd as usize]
            .as_ref()
            .is_some_and(|key| !(key.mask & mask).is_empty());

        if !has_overlap {
            warn!(
                "unregister: no matching registration for fd {} and mask {:?}",
                fd, mask
            );
            return Ok(());
        }

        trace!("deregistering fd {}", fd);
        self.epoll.delete(fd).map_err(Error::Syscall)?;
        self.table[fd as usize] = None;

        Ok(())
    }

    /// Returns the datum stored at `fd`, if any.
    pub fn get_data(&self, fd: RawFd) -> Option<Rc<RefCell<Socket>>> {
        self.table
            .get(fd as usize)?
            .as_ref()
            .map(|key| key.datum.clone())
    }

    /// Removes and returns the `(datum, handler)` registered at `fd`,
    /// leaving a placeholder key behind so the slot still reads as
    /// occupied. The kernel-side registration is left untouched: the
    /// caller is expected to re-register (replacing the handler) before
    /// the next `poll`, which is exactly what every readiness handler in
    /// this crate does. Keeping the slot occupied matters because
    /// `register` uses slot occupancy to decide `EPOLL_CTL_ADD` vs
    /// `EPOLL_CTL_MOD` — clearing it here would make the handler's
    /// re-registration look like a fresh fd and fail with `EEXIST`.
    pub(crate) fn take_handler(&mut self, fd: RawFd) -> Option<(Rc<RefCell<Socket>>, Handler)> {
        let key = self.table.get_mut(fd as usize)?.take()?;
        let placeholder: Handler = Box::new(|_, _| crate::Action::Continue);
        self.table[fd as usize] = Some(SelectorKey {
            mask: key.mask,
            datum: key.datum.clone(),
            handler: placeholder,
        });
        Some((key.datum, key.handler))
    }

    /// Blocks up to `timeout`, returning the `(fd, mask)` pairs that became
    /// ready. `None` means block indefinitely.
    pub(crate) fn poll(&mut self, timeout: Option<Duration>) -> Result<Vec<(RawFd, Mask)>> {
        self.epoll
            .wait(&mut self.events, timeout)
            .map_err(Error::Syscall)?;

        let ready = (0..self.events.len())
            .filter_map(|i| self.events.get(i))
            .collect();

        Ok(ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_over_capacity_fails() {
        let mut selector = Selector::new(4).unwrap();
        let socket = Rc::new(RefCell::new(Socket::from_raw_parts(
            "tcp4",
            std::net::Ipv4Addr::LOCALHOST,
            0,
            100,
            2,
        )));
        let err = selector
            .register(100, Mask::READABLE, socket, Box::new(|_, _| crate::Action::Continue))
            .unwrap_err();
        assert!(matches!(err, Error::FdOverLimit(100)));
    }

    #[test]
    fn unregister_unknown_fd_is_a_warned_no_op() {
        let mut selector = Selector::new(4).unwrap();
        assert!(selector.unregister(1, Mask::READABLE).is_ok());
    }
}
