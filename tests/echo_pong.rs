//! End-to-end echo-pong scenario over a real loopback socket pair.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reactor_loop::{Listener, Server, SystemEvent, TriggerContext};

#[test]
fn echoes_message_with_pong_suffix() {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_in_loop = stop.clone();

    let handle = thread::spawn(move || {
        let listener = Listener::new("tcp4", "127.0.0.1:19190").unwrap();
        let mut server = Server::new().unwrap();
        server.add_listener(listener);

        server.add_system_event(SystemEvent {
            data: Some(Box::new(|_el, ctx| {
                if let TriggerContext::IncomingData(conn) = ctx {
                    let mut reply = conn.read();
                    reply.extend_from_slice(b" pong");
                    conn.write(&reply);
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

    let mut client = TcpStream::connect("127.0.0.1:19190").unwrap();
    client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    client.write_all(b"ping").unwrap();

    let mut buf = [0u8; 64];
    let n = client.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"ping pong");

    drop(client);
    stop.store(true, Ordering::Relaxed);
    handle.join().unwrap();
}
