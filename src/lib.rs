//! A single-threaded, epoll-backed reactor for building non-blocking TCP
//! servers.
//!
//! A [`Server`] aggregates one or more [`Listener`]s and a single
//! [`EventLoop`]. The loop multiplexes every registered socket through a
//! [`Selector`] and dispatches four lifecycle callbacks — `serving`,
//! `open`, `data`, `close` — to user code, interleaved with periodic
//! [`EventLoop::add_user_event`] tasks.
//!
//! ```no_run
//! use std::time::Duration;
//! use reactor_loop::{EventLoop, Listener, Server, SystemEvent};
//!
//! let mut server = Server::new().unwrap();
//! server.add_listener(Listener::new("tcp4", "127.0.0.1:9090").unwrap());
//! server.add_system_event(SystemEvent {
//!     serving: Some(Box::new(|_el: &mut EventLoop| println!("Server start"))),
//!     data: Some(Box::new(|_el, ctx| {
//!         if let reactor_loop::TriggerContext::IncomingData(conn) = ctx {
//!             let msg = conn.read();
//!             conn.write(&msg);
//!         }
//!     })),
//!     ..Default::default()
//! });
//! server.add_user_event(Duration::from_secs(3), |_el| println!("tick"));
//! server.start_serve().unwrap();
//! ```
//!
//! A long-running callback delays every other event on the loop — handlers
//! are expected to do one unit of work and return.

mod action;
mod addr;
mod error;
mod event_loop;
mod mask;
mod selector;
mod server;
mod socket;
mod sys;

pub use action::Action;
pub use addr::parse_ipv4;
pub use error::{Error, Result};
pub use event_loop::{EventLoop, SystemEvent, TriggerContext};
pub use mask::Mask;
pub use server::Server;
pub use socket::{Conn, Listener, ShutdownHow};
