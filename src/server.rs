//! Thin aggregation façade over listeners and a loop — intentionally no
//! logic beyond forwarding. See SPEC_FULL.md §4.4.

use crate::error::Result;
use crate::event_loop::{EventLoop, SystemEvent};
use crate::socket::Listener;

/// Owns one [`EventLoop`] and zero or more [`Listener`]s.
pub struct Server {
    event_loop: EventLoop,
    listeners: Vec<Listener>,
}

impl Server {
    pub fn new() -> Result<Server> {
        Ok(Server {
            event_loop: EventLoop::new()?,
            listeners: Vec::new(),
        })
    }

    pub fn add_listener(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    pub fn add_system_event(&mut self, event: SystemEvent) {
        self.event_loop.add_system_event(event);
    }

    pub fn add_user_event<F>(&mut self, period: std::time::Duration, task: F)
    where
        F: FnMut(&mut EventLoop) + 'static,
    {
        self.event_loop.add_user_event(period, task);
    }

    pub fn event_loop_mut(&mut self) -> &mut EventLoop {
        &mut self.event_loop
    }

    /// Binds and registers every listener in order. If any one fails, every
    /// listener bound so far — including the one that just failed — is
    /// closed and the error propagates.
    pub fn start_serve(&mut self) -> Result<()> {
        for (i, listener) in self.listeners.iter().enumerate() {
            if let Err(err) = listener
                .bind_and_listen()
                .and_then(|()| listener.register_accept(&mut self.event_loop))
            {
                for bound in &self.listeners[..=i] {
                    bound.close();
                }
                return Err(err);
            }
        }

        self.event_loop.run()
    }
}
