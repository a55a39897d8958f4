//! Listens on 127.0.0.1:9090 and echoes each message back with " pong"
//! appended.
//!
//! Run with `RUST_LOG=trace cargo run --example echo_pong`, then in another
//! shell: `printf 'ping' | nc 127.0.0.1 9090`.

use reactor_loop::{EventLoop, Listener, Server, SystemEvent, TriggerContext};

fn main() {
    env_logger::init();

    let listener = Listener::new("tcp4", "127.0.0.1:9090").expect("invalid listen address");

    let mut server = Server::new().expect("failed to create event loop");
    server.add_listener(listener);

    server.add_system_event(SystemEvent {
        serving: Some(Box::new(|_el: &mut EventLoop| {
            println!("Server start...");
        })),
        open: Some(Box::new(|_el, ctx| {
            if let TriggerContext::PeerInfo {
                network,
                address,
                port,
            } = ctx
            {
                println!("Accept: [{} {} {}]", network, address, port);
            }
        })),
        data: Some(Box::new(|_el, ctx| {
            if let TriggerContext::IncomingData(conn) = ctx {
                let msg = conn.read();
                let msg = String::from_utf8_lossy(&msg);
                println!("Recv: {}", msg);
                conn.write(format!("{} pong", msg).as_bytes());
            }
        })),
        ..Default::default()
    });

    server.start_serve().expect("server failed");
}
