//! `stop()` must halt the loop within roughly one poll interval.

use std::time::{Duration, Instant};

use reactor_loop::Server;

#[test]
fn loop_exits_within_one_poll_interval_of_stop() {
    let mut server = Server::new().unwrap();
    server
        .event_loop_mut()
        .set_poll_interval(Duration::from_millis(100));

    server.add_user_event(Duration::from_millis(50), |el| el.stop());

    let start = Instant::now();
    server.start_serve().unwrap();

    assert!(start.elapsed() < Duration::from_millis(250));
}
