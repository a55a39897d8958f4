//! The reactor itself: owns the [`Selector`], the registered system events,
//! and the periodic user tasks, and drives them all from a single `run`
//! loop. See SPEC_FULL.md §4.2.

use std::cell::RefCell;
use std::net::Ipv4Addr;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::time::{Duration, Instant};

use log::trace;

use crate::action::Action;
use crate::error::Result;
use crate::mask::Mask;
use crate::selector::{Handler, Selector};
use crate::socket::{Conn, Socket};

const DEFAULT_CAPACITY: usize = 1024;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The data a dispatched system event callback receives about the fd that
/// triggered it. Replaces the source's untyped, nullable trigger-data
/// pointer with a closed set of variants (see the redesign note in
/// SPEC_FULL.md §9): cleared back to `None` after every dispatch.
#[derive(Clone)]
pub enum TriggerContext {
    None,
    PeerInfo {
        network: &'static str,
        address: Ipv4Addr,
        port: u16,
    },
    IncomingData(Conn),
}

impl Default for TriggerContext {
    fn default() -> TriggerContext {
        TriggerContext::None
    }
}

/// The four lifecycle hooks a caller can register with the loop. Any
/// combination may be left `None`; the corresponding `Trigger*Event`
/// [`Action`] is then simply a no-op fan-out.
#[derive(Default)]
pub struct SystemEvent {
    pub serving: Option<Box<dyn FnMut(&mut EventLoop)>>,
    pub open: Option<Box<dyn FnMut(&mut EventLoop, &TriggerContext)>>,
    pub data: Option<Box<dyn FnMut(&mut EventLoop, &TriggerContext)>>,
    pub close: Option<Box<dyn FnMut(&mut EventLoop, &TriggerContext)>>,
}

struct UserEvent {
    task: Box<dyn FnMut(&mut EventLoop)>,
    period: Duration,
    next_fire: Instant,
}

/// The single-threaded reactor. Not `Send`/`Sync`: every piece of shared
/// state reachable from a registered handler is `Rc<RefCell<_>>`.
pub struct EventLoop {
    selector: Selector,
    system_events: Vec<SystemEvent>,
    user_events: Vec<UserEvent>,
    poll_interval: Duration,
    trigger_context: TriggerContext,
    done: bool,
}

impl EventLoop {
    pub fn new() -> Result<EventLoop> {
        EventLoop::with_capacity(DEFAULT_CAPACITY)
    }

    /// Builds a loop whose selector can track at most `capacity` distinct
    /// file descriptors at once.
    pub fn with_capacity(capacity: usize) -> Result<EventLoop> {
        Ok(EventLoop {
            selector: Selector::new(capacity)?,
            system_events: Vec::new(),
            user_events: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            trigger_context: TriggerContext::None,
            done: false,
        })
    }

    /// Upper bound on how long a single `poll` blocks when no user task is
    /// due sooner. Defaults to 100ms.
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    pub fn add_system_event(&mut self, event: SystemEvent) {
        self.system_events.push(event);
    }

    /// Registers `task` to run every `period`. Its first firing is armed
    /// one `period` after `run` actually starts, not one `period` after
    /// this call — see `run`.
    pub fn add_user_event<F>(&mut self, period: Duration, task: F)
    where
        F: FnMut(&mut EventLoop) + 'static,
    {
        self.user_events.push(UserEvent {
            task: Box::new(task),
            period,
            next_fire: Instant::now() + period,
        });
    }

    pub fn done(&self) -> bool {
        self.done
    }

    /// Requests that `run` return after the current tick.
    pub fn stop(&mut self) {
        self.done = true;
    }

    pub(crate) fn register_socket(
        &mut self,
        fd: RawFd,
        mask: Mask,
        datum: Rc<RefCell<Socket>>,
        handler: Handler,
    ) -> Result<()> {
        self.selector.register(fd, mask, datum, handler)
    }

    pub(crate) fn unregister_socket(&mut self, fd: RawFd, mask: Mask) -> Result<()> {
        self.selector.unregister(fd, mask)
    }

    pub(crate) fn set_trigger_context(&mut self, ctx: TriggerContext) {
        self.trigger_context = ctx;
    }

    /// Fires every registered `serving` hook once, arms every user event's
    /// first `next_fire` one `period` from this moment, then ticks until
    /// [`stop`](EventLoop::stop) is called.
    pub fn run(&mut self) -> Result<()> {
        self.fire_serving();

        let now = Instant::now();
        for user_event in &mut self.user_events {
            user_event.next_fire = now + user_event.period;
        }

        while !self.done {
            self.tick()?;
        }

        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        let timeout = self.next_timeout();
        let ready = self.selector.poll(timeout)?;

        for (fd, _mask) in ready {
            let Some((datum, mut handler)) = self.selector.take_handler(fd) else {
                continue;
            };
            let action = handler(self, &datum);
            self.process_action(fd, action);
        }

        self.run_due_user_events(Instant::now());

        Ok(())
    }

    /// Index of the first due user event in insertion order — a linear
    /// scan, not an argmin over `next_fire`. Two events due at once always
    /// resolve in favor of whichever was registered first (see the Open
    /// Questions decision in SPEC_FULL.md §9).
    fn find_nearest_task(&self, now: Instant) -> Option<usize> {
        self.user_events
            .iter()
            .position(|ue| ue.next_fire <= now)
    }

    /// Smallest deadline across all user events, used only to bound how
    /// long `poll` may block — distinct from [`find_nearest_task`], which
    /// picks which task actually fires this cycle.
    fn soonest_deadline(&self) -> Option<Instant> {
        self.user_events.iter().map(|ue| ue.next_fire).min()
    }

    fn next_timeout(&self) -> Option<Duration> {
        let now = Instant::now();
        match self.soonest_deadline() {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(now);
                Some(remaining.min(self.poll_interval))
            }
            None => Some(self.poll_interval),
        }
    }

    /// Fires at most one due user event per cycle, per the "exactly one
    /// periodic task fires per cycle" invariant.
    fn run_due_user_events(&mut self, now: Instant) {
        let Some(i) = self.find_nearest_task(now) else {
            return;
        };

        let noop: Box<dyn FnMut(&mut EventLoop)> = Box::new(|_| {});
        let mut task = std::mem::replace(&mut self.user_events[i].task, noop);
        task(self);
        self.user_events[i].task = task;
        self.user_events[i].next_fire += self.user_events[i].period;
    }

    fn shutdown_interest(&mut self, fd: RawFd, mask: Mask) {
        if let Err(err) = self.selector.unregister(fd, mask) {
            trace!("unregister fd {} failed: {}", fd, err);
        }
    }

    /// Dispatches `action`, produced by the handler that just ran on `fd`,
    /// then clears the trigger context: every fan-out below is run against
    /// the context the handler set (if any), after which it no longer
    /// applies to the next readiness event.
    fn process_action(&mut self, fd: RawFd, action: Action) {
        match action {
            Action::Continue => {}
            Action::ShutdownRd => self.shutdown_interest(fd, Mask::READABLE),
            Action::ShutdownWr => self.shutdown_interest(fd, Mask::WRITABLE),
            Action::ShutdownRdWr => {
                self.shutdown_interest(fd, Mask::READABLE | Mask::WRITABLE)
            }
            Action::TriggerOpenEvent => self.fire_open(),
            Action::TriggerDataEvent => self.fire_data(),
            Action::TriggerCloseEvent => self.fire_close(),
        }

        self.trigger_context = TriggerContext::None;
    }

    fn fire_serving(&mut self) {
        for i in 0..self.system_events.len() {
            if let Some(mut cb) = self.system_events[i].serving.take() {
                cb(self);
                self.system_events[i].serving = Some(cb);
            }
        }
    }

    fn fire_open(&mut self) {
        let ctx = self.trigger_context.clone();
        for i in 0..self.system_events.len() {
            // The source's bug of gating this fan-out on `Close != nil`
            // instead of `Open != nil` is corrected here: `open` fires
            // exactly when an `open` hook exists, per SPEC_FULL.md §9.
            if let Some(mut cb) = self.system_events[i].open.take() {
                cb(self, &ctx);
                self.system_events[i].open = Some(cb);
            }
        }
    }

    fn fire_data(&mut self) {
        let ctx = self.trigger_context.clone();
        for i in 0..self.system_events.len() {
            if let Some(mut cb) = self.system_events[i].data.take() {
                cb(self, &ctx);
                self.system_events[i].data = Some(cb);
            }
        }
    }

    fn fire_close(&mut self) {
        let ctx = self.trigger_context.clone();
        for i in 0..self.system_events.len() {
            if let Some(mut cb) = self.system_events[i].close.take() {
                cb(self, &ctx);
                self.system_events[i].close = Some(cb);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn serving_hook_fires_exactly_once_before_first_tick() {
        let mut el = EventLoop::with_capacity(4).unwrap();
        let count = Rc::new(Cell::new(0));
        let count2 = count.clone();

        el.add_system_event(SystemEvent {
            serving: Some(Box::new(move |evl| {
                count2.set(count2.get() + 1);
                evl.stop();
            })),
            ..Default::default()
        });

        el.run().unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn nearest_task_prefers_first_match_on_ties() {
        let mut el = EventLoop::with_capacity(4).unwrap();
        let now = Instant::now();
        el.user_events.push(UserEvent {
            task: Box::new(|_| {}),
            period: Duration::from_secs(1),
            next_fire: now,
        });
        el.user_events.push(UserEvent {
            task: Box::new(|_| {}),
            period: Duration::from_secs(1),
            next_fire: now,
        });
        assert_eq!(el.find_nearest_task(now), Some(0));
    }

    #[test]
    fn only_one_due_task_fires_per_cycle() {
        let mut el = EventLoop::with_capacity(4).unwrap();
        let now = Instant::now();
        let fired = Rc::new(Cell::new(0));

        for _ in 0..2 {
            let fired = fired.clone();
            el.user_events.push(UserEvent {
                task: Box::new(move |_| fired.set(fired.get() + 1)),
                period: Duration::from_secs(1),
                next_fire: now,
            });
        }

        el.run_due_user_events(now);
        assert_eq!(fired.get(), 1);
    }
}
