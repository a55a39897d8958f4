//! The narrow vocabulary readiness handlers use to tell the loop what to do
//! next. See `EventLoop::process_action` for the dispatch table.

/// What a readiness handler wants the loop to do after it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do.
    Continue,
    /// Deregister read interest for the fd the handler ran on.
    ShutdownRd,
    /// Deregister write interest for the fd the handler ran on.
    ShutdownWr,
    /// Deregister both read and write interest for the fd the handler ran on.
    ShutdownRdWr,
    /// Fan out to every system event's `open` callback.
    TriggerOpenEvent,
    /// Fan out to every system event's `data` callback.
    TriggerDataEvent,
    /// Fan out to every system event's `close` callback.
    TriggerCloseEvent,
}
