//! A loop with no listeners, driven purely by a periodic user event.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use reactor_loop::Server;

#[test]
fn periodic_task_fires_once_per_period_and_advances_the_counter() {
    let mut server = Server::new().unwrap();
    server
        .event_loop_mut()
        .set_poll_interval(Duration::from_millis(10));

    let seen = Rc::new(Cell::new(Vec::new()));
    let seen_in_task = seen.clone();
    let count = Rc::new(Cell::new(0));
    let fires = Rc::new(Cell::new(0));
    let fires_in_task = fires.clone();

    server.add_user_event(Duration::from_millis(30), move |el| {
        let mut history = seen_in_task.take();
        history.push(count.get());
        seen_in_task.set(history);
        count.set(count.get() + 30);

        fires_in_task.set(fires_in_task.get() + 1);
        if fires_in_task.get() >= 3 {
            el.stop();
        }
    });

    server.start_serve().unwrap();

    assert_eq!(seen.take(), vec![0, 30, 60]);
}
