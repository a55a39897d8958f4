//! A loop with no listeners at all — just a periodic task, firing every
//! 3 seconds and counting up by 30 each time.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use reactor_loop::Server;

fn main() {
    env_logger::init();

    let mut server = Server::new().expect("failed to create event loop");

    let count = Rc::new(Cell::new(0));
    server.add_user_event(Duration::from_secs(3), move |_el| {
        println!("{} seconds passed", count.get());
        count.set(count.get() + 30);
    });

    server.start_serve().expect("server failed");
}
