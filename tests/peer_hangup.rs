//! A peer that connects and disconnects without sending anything must not
//! disturb the loop's ability to serve later connections.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reactor_loop::{Listener, Server, SystemEvent, TriggerContext};

#[test]
fn hangup_does_not_take_down_the_loop() {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_in_loop = stop.clone();

    let handle = thread::spawn(move || {
        let listener = Listener::new("tcp4", "127.0.0.1:19191").unwrap();
        let mut server = Server::new().unwrap();
        server.add_listener(listener);

        server.add_system_event(SystemEvent {
            data: Some(Box::new(|_el, ctx| {
                if let TriggerContext::IncomingData(conn) = ctx {
                    conn.write(&conn.read());
                }
            })),
            ..Default::default()
        });

        server.add_user_event(Duration::from_millis(20), move |el| {
            if stop_in_loop.load(Ordering::Relaxed) {
                el.stop();
            }
        });

        server.start_serve().unwrap();
    });

    thread::sleep(Duration::from_millis(150));

    {
        let hangup = TcpStream::connect("127.0.0.1:19191").unwrap();
        drop(hangup);
    }

    thread::sleep(Duration::from_millis(100));

    let mut client = TcpStream::connect("127.0.0.1:19191").unwrap();
    client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    client.write_all(b"still alive").unwrap();

    let mut buf = [0u8; 64];
    let n = client.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"still alive");

    drop(client);
    stop.store(true, Ordering::Relaxed);
    handle.join().unwrap();
}
