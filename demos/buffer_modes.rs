//! Shows the two buffering modes side by side on one button device: a
//! LAST buffer always answers "what is the state now", an ALL buffer
//! answers "what happened since I last looked".

use std::sync::Arc;
use std::time::Duration;

use senslink::engines::scripted::ScriptedEngine;
use senslink::{BufferedListener, ButtonDevice, ButtonUpdate, ConnectParams, Timestamp};

fn main() {
    tracing_subscriber::fmt().init();

    let mut params = ConnectParams::new("Button0@localhost".parse().expect("valid name"));
    params.poll_period_ms = 5;

    let (engine, probe) = ScriptedEngine::live_pair();
    let buttons = ButtonDevice::from_engine(engine, &params);

    let latest = Arc::new(BufferedListener::<ButtonUpdate>::latest_only());
    let history = Arc::new(BufferedListener::<ButtonUpdate>::keep_all());
    buttons.add_button_listener(latest.clone());
    buttons.add_button_listener(history.clone());

    // A burst of presses and releases.
    for i in 0..6 {
        probe.feed(ButtonUpdate {
            time: Timestamp::new(i, 0),
            button: 0,
            pressed: i % 2 == 0,
        });
        std::thread::sleep(Duration::from_millis(10));
    }
    std::thread::sleep(Duration::from_millis(50));

    println!("latest-only sees: {:?}", latest.drain());
    println!("keep-all sees:    {:?}", history.drain());
    println!("keep-all again:   {:?}", history.drain());
    println!("latest again:     {:?}", latest.drain());

    buttons.stop_running();
}
