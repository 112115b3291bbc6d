// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// End-to-end executor behavior: dispatch order, callback-group discipline,
// worker-pool concurrency and the request/reply path.

use spindle::{
    CallbackGroupType, MultiThreadedExecutor, Node, SingleThreadedExecutor, Srv,
    SubscriptionOptions,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct Tick {
    value: u32,
}

fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

#[test]
fn test_single_threaded_timer_and_subscription_order() {
    let _ = env_logger::try_init();

    let node = Node::new("s1").expect("node");
    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let sub_events = Arc::clone(&events);
    let _subscription = node
        .create_subscription::<Tick, _>("s1/data", 10, move |tick| {
            sub_events.lock().unwrap().push(format!("sub:{}", tick.value));
        })
        .expect("subscription");

    let timer_events = Arc::clone(&events);
    let _timer = node
        .create_wall_timer(
            Duration::from_millis(100),
            move || timer_events.lock().unwrap().push("timer".to_string()),
            None,
        )
        .expect("timer");

    let publisher = node.create_publisher::<Tick>("s1/data", 10).expect("publisher");

    let executor = Arc::new(SingleThreadedExecutor::new());
    executor.add_node(&node, true);
    let spinner = Arc::clone(&executor);
    let handle = thread::spawn(move || spinner.spin());

    publisher.publish(Tick { value: 1 }).expect("publish");
    thread::sleep(Duration::from_millis(50));
    publisher.publish(Tick { value: 2 }).expect("publish");
    thread::sleep(Duration::from_millis(100));
    publisher.publish(Tick { value: 3 }).expect("publish");

    assert!(wait_until(Duration::from_secs(2), || {
        events.lock().unwrap().len() >= 4
    }));

    executor.cancel();
    handle.join().expect("join").expect("spin");

    let seen = events.lock().unwrap();
    assert_eq!(
        &seen[..4],
        &[
            "sub:1".to_string(),
            "sub:2".to_string(),
            "timer".to_string(),
            "sub:3".to_string(),
        ]
    );
}

#[test]
fn test_timer_beats_ready_subscription() {
    let _ = env_logger::try_init();

    let node = Node::new("priority").expect("node");
    let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    // Distinct takeable groups, so only selection priority decides.
    let timer_group = node.create_callback_group(CallbackGroupType::MutuallyExclusive);
    let sub_group = node.create_callback_group(CallbackGroupType::MutuallyExclusive);

    let sub_events = Arc::clone(&events);
    let mut options = SubscriptionOptions::with_depth(10);
    options.group = Some(Arc::clone(&sub_group));
    let _subscription = node
        .create_subscription_with_options::<Tick, _>("priority/data", options, move |_| {
            sub_events.lock().unwrap().push("sub");
        })
        .expect("subscription");

    let timer_events = Arc::clone(&events);
    let _timer = node
        .create_wall_timer(
            Duration::from_millis(200),
            move || timer_events.lock().unwrap().push("timer"),
            Some(&timer_group),
        )
        .expect("timer");

    let publisher = node
        .create_publisher::<Tick>("priority/data", 10)
        .expect("publisher");
    publisher.publish(Tick { value: 0 }).expect("publish");

    // Let both the timer deadline and the message become ready. The period
    // is long enough that the timer cannot expire a second time mid-drain.
    thread::sleep(Duration::from_millis(250));

    let executor = SingleThreadedExecutor::new();
    executor.add_node(&node, true);
    executor.spin_some().expect("spin_some");

    let seen = events.lock().unwrap();
    assert!(seen.len() >= 2, "both executables should have run: {:?}", seen);
    assert_eq!(seen[0], "timer");
    assert_eq!(seen[1], "sub");
}

#[test]
fn test_mutually_exclusive_group_never_overlaps() {
    let _ = env_logger::try_init();

    let node = Node::new("s2").expect("node");
    let group = node.create_callback_group(CallbackGroupType::MutuallyExclusive);

    let in_flight = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let delivered = Arc::new(AtomicUsize::new(0));

    for topic in ["s2/a", "s2/b"] {
        let in_flight = Arc::clone(&in_flight);
        let overlaps = Arc::clone(&overlaps);
        let delivered = Arc::clone(&delivered);
        let mut options = SubscriptionOptions::with_depth(100);
        options.group = Some(Arc::clone(&group));
        let _subscription = node
            .create_subscription_with_options::<Tick, _>(topic, options, move |_| {
                if in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                thread::sleep(Duration::from_micros(200));
                in_flight.fetch_sub(1, Ordering::SeqCst);
                delivered.fetch_add(1, Ordering::SeqCst);
            })
            .expect("subscription");
    }

    let pub_a = node.create_publisher::<Tick>("s2/a", 100).expect("publisher");
    let pub_b = node.create_publisher::<Tick>("s2/b", 100).expect("publisher");
    for value in 0..50 {
        pub_a.publish(Tick { value }).expect("publish");
        pub_b.publish(Tick { value }).expect("publish");
    }

    let executor = Arc::new(MultiThreadedExecutor::with_number_of_threads(4));
    executor.add_node(&node, true);
    let spinner = Arc::clone(&executor);
    let handle = thread::spawn(move || spinner.spin());

    assert!(wait_until(Duration::from_secs(10), || {
        delivered.load(Ordering::SeqCst) == 100
    }));

    executor.cancel();
    handle.join().expect("join").expect("spin");

    assert_eq!(delivered.load(Ordering::SeqCst), 100);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0, "callbacks overlapped");
}

#[test]
fn test_reentrant_group_runs_callbacks_in_parallel() {
    let _ = env_logger::try_init();

    let node = Node::new("s3").expect("node");
    let group = node.create_callback_group(CallbackGroupType::Reentrant);

    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let delivered = Arc::new(AtomicUsize::new(0));

    let mut options = SubscriptionOptions::with_depth(16);
    options.group = Some(Arc::clone(&group));
    {
        let in_flight_cb = Arc::clone(&in_flight);
        let max_in_flight_cb = Arc::clone(&max_in_flight);
        let delivered_cb = Arc::clone(&delivered);
        let _subscription = node
            .create_subscription_with_options::<Tick, _>("s3/burst", options, move |_| {
                let current = in_flight_cb.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight_cb.fetch_max(current, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                in_flight_cb.fetch_sub(1, Ordering::SeqCst);
                delivered_cb.fetch_add(1, Ordering::SeqCst);
            })
            .expect("subscription");

        let publisher = node.create_publisher::<Tick>("s3/burst", 16).expect("publisher");
        for value in 0..8 {
            publisher.publish(Tick { value }).expect("publish");
        }

        let executor = Arc::new(MultiThreadedExecutor::with_number_of_threads(4));
        executor.add_node(&node, true);
        let start = Instant::now();
        let spinner = Arc::clone(&executor);
        let handle = thread::spawn(move || spinner.spin());

        assert!(wait_until(Duration::from_secs(5), || {
            delivered.load(Ordering::SeqCst) == 8
        }));
        let elapsed = start.elapsed();

        executor.cancel();
        handle.join().expect("join").expect("spin");

        // Serial execution would need at least 80 ms.
        assert!(
            elapsed < Duration::from_millis(70),
            "burst took {:?}, expected parallel dispatch",
            elapsed
        );
        assert!(max_in_flight.load(Ordering::SeqCst) >= 2);
    }
}

#[test]
fn test_takeable_restored_after_panicking_callback() {
    let _ = env_logger::try_init();

    let node = Node::new("panicky").expect("node");
    let _subscription = node
        .create_subscription::<Tick, _>("panicky/data", 10, |_| {
            panic!("callback exploded");
        })
        .expect("subscription");
    let publisher = node
        .create_publisher::<Tick>("panicky/data", 10)
        .expect("publisher");
    publisher.publish(Tick { value: 0 }).expect("publish");

    let executor = SingleThreadedExecutor::new();
    executor.add_node(&node, true);

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        executor.spin_some()
    }));
    assert!(outcome.is_err(), "the panic must reach the spinning thread");

    // The group opens up again even though the dispatch blew up.
    assert!(node.default_callback_group().can_be_taken_from());
}

#[test]
fn test_add_node_wakes_a_blocked_spin() {
    let _ = env_logger::try_init();

    let executor = Arc::new(SingleThreadedExecutor::new());
    let idle_node = Node::new("idle").expect("node");
    executor.add_node(&idle_node, true);

    let spinner = Arc::clone(&executor);
    let handle = thread::spawn(move || spinner.spin());

    // Let the spin settle into its blocking wait.
    thread::sleep(Duration::from_millis(50));

    let busy_node = Node::new("busy").expect("node");
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    let _subscription = busy_node
        .create_subscription::<Tick, _>("busy/data", 10, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("subscription");
    let publisher = busy_node
        .create_publisher::<Tick>("busy/data", 10)
        .expect("publisher");
    publisher.publish(Tick { value: 9 }).expect("publish");

    executor.add_node(&busy_node, true);

    assert!(
        wait_until(Duration::from_secs(2), || delivered.load(Ordering::SeqCst) == 1),
        "the blocked wait never picked up the new node"
    );

    executor.cancel();
    handle.join().expect("join").expect("spin");
}

struct AddTwoInts;

#[derive(Clone, Debug)]
struct AddTwoIntsRequest {
    a: i64,
    b: i64,
}

#[derive(Clone, Debug)]
struct AddTwoIntsResponse {
    sum: i64,
}

impl Srv for AddTwoInts {
    type Request = AddTwoIntsRequest;
    type Response = AddTwoIntsResponse;
}

#[test]
fn test_service_and_client_round_trip() {
    let _ = env_logger::try_init();

    let node = Node::new("calc").expect("node");
    let _service = node
        .create_service::<AddTwoInts, _>(
            "calc/add_two_ints",
            |request| AddTwoIntsResponse {
                sum: request.a + request.b,
            },
            None,
        )
        .expect("service");
    let client = node
        .create_client::<AddTwoInts>("calc/add_two_ints", None)
        .expect("client");

    let pending = client
        .call_async(AddTwoIntsRequest { a: 40, b: 2 })
        .expect("call");

    let executor = SingleThreadedExecutor::new();
    executor.add_node(&node, true);
    // One drain serves the request and then resolves the response.
    executor.spin_some().expect("spin_some");

    let response = pending
        .wait_timeout(Duration::from_secs(1))
        .expect("response");
    assert_eq!(response.sum, 42);
}

#[test]
fn test_spin_node_once_dispatches_at_most_one() {
    let _ = env_logger::try_init();

    let node = Node::new("once").expect("node");
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    let _subscription = node
        .create_subscription::<Tick, _>("once/data", 10, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("subscription");
    let publisher = node.create_publisher::<Tick>("once/data", 10).expect("publisher");
    publisher.publish(Tick { value: 1 }).expect("publish");
    publisher.publish(Tick { value: 2 }).expect("publish");

    let executor = SingleThreadedExecutor::new();
    executor
        .spin_node_once(&node, Some(Duration::from_millis(100)))
        .expect("spin_node_once");
    assert_eq!(delivered.load(Ordering::SeqCst), 1);

    executor.spin_node_some(&node).expect("spin_node_some");
    assert_eq!(delivered.load(Ordering::SeqCst), 2);
}
