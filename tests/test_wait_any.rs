use event_sync::{wait_any, Event, ResetPolicy};
use std::{
    thread,
    time::{Duration, Instant},
};

#[test]
fn empty_slice_succeeds_immediately() {
    assert_eq!(wait_any(&[], None).unwrap(), 0);
}

#[test]
fn single_event_delegates_to_the_plain_wait() {
    let event = Event::new(ResetPolicy::Auto, true);
    assert_eq!(wait_any(&[event.clone()], None).unwrap(), 0);

    // consumed by the delegated wait
    assert!(event.wait_deadline(Instant::now()).unwrap_err().is_timeout());
}

#[test]
fn signal_from_another_thread_reports_the_index_and_consumes() {
    let events = [
        Event::new(ResetPolicy::Auto, false),
        Event::new(ResetPolicy::Auto, false),
    ];

    let signaler = {
        let event_b = events[1].clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            event_b.signal().unwrap();
        })
    };

    assert_eq!(wait_any(&events, None).unwrap(), 1);
    signaler.join().unwrap();

    // the winner was consumed on the caller's behalf, and nothing
    // else became signaled along the way
    assert!(events[1].wait_deadline(Instant::now()).unwrap_err().is_timeout());
    assert!(events[0].wait_deadline(Instant::now()).unwrap_err().is_timeout());
}

#[test]
fn only_the_winner_is_consumed() {
    let events = [
        Event::new(ResetPolicy::Auto, true),
        Event::new(ResetPolicy::Auto, true),
    ];

    let winner = wait_any(&events, None).unwrap();
    let loser = 1 - winner;

    // the loser keeps its signal for the next taker
    events[loser].wait_deadline(Instant::now()).unwrap();
    assert!(events[winner]
        .wait_deadline(Instant::now())
        .unwrap_err()
        .is_timeout());
}

#[test]
fn manual_reset_winners_are_not_consumed() {
    let events = [
        Event::new(ResetPolicy::Auto, false),
        Event::new(ResetPolicy::Manual, true),
    ];

    assert_eq!(wait_any(&events, None).unwrap(), 1);

    // still signaled for everybody else
    events[1].wait().unwrap();
}

#[test]
fn timeout_tears_down_and_leaves_reusable_events() {
    let events = [
        Event::new(ResetPolicy::Auto, false),
        Event::new(ResetPolicy::Auto, false),
    ];

    let start = Instant::now();
    let err = wait_any(&events, Some(Instant::now() + Duration::from_millis(100))).unwrap_err();
    assert!(err.is_timeout());
    assert!(start.elapsed() >= Duration::from_millis(100));

    // the proxies are gone; the events behave as if nothing happened
    events[0].signal().unwrap();
    assert_eq!(wait_any(&events, None).unwrap(), 0);
}

#[test]
fn expired_deadline_with_nothing_signaled_times_out_quickly() {
    let events = [
        Event::new(ResetPolicy::Auto, false),
        Event::new(ResetPolicy::Auto, false),
    ];

    let start = Instant::now();
    assert!(wait_any(&events, Some(Instant::now()))
        .unwrap_err()
        .is_timeout());
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn successive_calls_consume_distinct_events() {
    const NO_OF_EVENTS: usize = 4;
    let events: Vec<Event> = (0..NO_OF_EVENTS)
        .map(|_| Event::new(ResetPolicy::Auto, false))
        .collect();
    for event in &events {
        event.signal().unwrap();
    }

    let mut won = [false; NO_OF_EVENTS];
    for _ in 0..NO_OF_EVENTS {
        won[wait_any(&events, None).unwrap()] = true;
    }
    // each call consumed exactly one of the latched signals
    assert_eq!(won, [true; NO_OF_EVENTS]);
}
