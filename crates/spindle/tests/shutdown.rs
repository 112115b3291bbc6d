// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Shutdown semantics live in their own test binary: the interrupt station is
// process-wide and never resets, so everything here runs inside one test in
// a controlled order.

use spindle::{Node, SingleThreadedExecutor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Ping;

#[test]
fn test_shutdown_releases_sleepers_and_spins() {
    let _ = env_logger::try_init();

    // Init installs the SIGINT hook exactly once.
    spindle::init().expect("first init");
    assert!(spindle::init().is_err(), "second init must be rejected");
    assert!(spindle::ok());

    // Uninterrupted sleep runs to completion.
    let start = Instant::now();
    assert!(spindle::sleep_for(Duration::from_millis(50)));
    assert!(start.elapsed() >= Duration::from_millis(45));

    // A spinning executor with nothing to do.
    let node = Node::new("sleeper").expect("node");
    let _subscription = node
        .create_subscription::<Ping, _>("sleeper/ping", 10, |_| {})
        .expect("subscription");
    let executor = Arc::new(SingleThreadedExecutor::new());
    executor.add_node(&node, true);

    let spin_done = Arc::new(AtomicBool::new(false));
    let spin_flag = Arc::clone(&spin_done);
    let spinner = Arc::clone(&executor);
    let spin_thread = thread::spawn(move || {
        let result = spinner.spin();
        spin_flag.store(true, Ordering::SeqCst);
        result
    });

    // A long sleeper on another thread.
    let sleeper = thread::spawn(|| {
        let start = Instant::now();
        let completed = spindle::sleep_for(Duration::from_secs(1));
        (completed, start.elapsed())
    });

    thread::sleep(Duration::from_millis(200));
    spindle::shutdown();

    let (completed, elapsed) = sleeper.join().expect("sleeper join");
    assert!(!completed, "shutdown must interrupt the sleep");
    assert!(
        elapsed >= Duration::from_millis(150) && elapsed < Duration::from_millis(600),
        "sleeper released after {:?}",
        elapsed
    );

    let deadline = Instant::now() + Duration::from_secs(1);
    while !spin_done.load(Ordering::SeqCst) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(spin_done.load(Ordering::SeqCst), "spin did not return");
    spin_thread.join().expect("spin join").expect("spin result");

    assert!(!spindle::ok());

    // Shutdown is permanent: sleeping afterwards returns immediately.
    let start = Instant::now();
    assert!(!spindle::sleep_for(Duration::from_secs(1)));
    assert!(start.elapsed() < Duration::from_millis(100));

    // Idempotent.
    spindle::shutdown();
    assert!(!spindle::ok());
}
