//! Scenario tests driving the keyer through a detached transmitter, the
//! same way a host audio callback would.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use cw_practice::{coding::morse::lookup, Keyer, Transmitter};

const SAMPLE_RATE: u32 = 44100;
/// Samples per waveform cycle at 800 Hz: round(44100 / 800).
const CYCLE: usize = 55;
/// Cycles per dot at 20 WPM: round(1.2 * (44100 / 55) / 20).
const DOT: usize = 48;

fn practice_keyer() -> (Keyer, Transmitter) {
    let (mut keyer, transmitter) = Keyer::detached(SAMPLE_RATE);
    keyer.configure(20.0, 800.0, 1.0).unwrap();
    (keyer, transmitter)
}

fn pump(transmitter: &mut Transmitter, samples: usize, output: &mut Vec<f32>) {
    let start = output.len();
    output.resize(start + samples, 0.0);
    for chunk in output[start..].chunks_mut(512) {
        transmitter.fill(chunk);
    }
}

/// Keyed flag per element, skipping the one dot of load latency at the
/// head of the stream. Every cycle within an element must agree.
fn keyed_elements(output: &[f32]) -> Vec<bool> {
    let keyed_cycles: Vec<bool> = output
        .chunks_exact(CYCLE)
        .map(|cycle| cycle.iter().any(|sample| *sample != 0.0))
        .collect();

    keyed_cycles[DOT..]
        .chunks_exact(DOT)
        .map(|element| {
            assert!(
                element.iter().all(|keyed| *keyed == element[0]),
                "element not aligned to the dot grid"
            );
            element[0]
        })
        .collect()
}

#[test]
fn single_dot_character() {
    let (keyer, mut transmitter) = practice_keyer();
    assert!(keyer.send('E'));

    let mut output = Vec::new();
    pump(&mut transmitter, CYCLE * DOT * 10, &mut output);

    // One keyed dot, then its gaps, then nothing.
    let elements = keyed_elements(&output);
    assert_eq!(&elements[..4], &[true, false, false, false]);
    assert!(elements[4..].iter().all(|keyed| !keyed));

    // The character swallowed five dots of stream (load latency included);
    // idle has been counting ever since.
    let actual = SAMPLE_RATE as f64 / CYCLE as f64;
    let expected = (5 * DOT) as f64 / actual;
    assert!((keyer.idle_seconds() - expected).abs() < 1e-9);
}

#[test]
fn characters_transmit_in_order() {
    let (keyer, mut transmitter) = practice_keyer();
    let mut output = Vec::new();

    assert!(keyer.send('A'));
    for c in ['B', 'C'] {
        while !keyer.send_nonblocking(c) {
            pump(&mut transmitter, 512, &mut output);
        }
    }
    pump(&mut transmitter, CYCLE * DOT * 40, &mut output);

    let expected: Vec<bool> = lookup('A')
        .elements()
        .chain(lookup('B').elements())
        .chain(lookup('C').elements())
        .collect();
    let elements = keyed_elements(&output);
    assert_eq!(&elements[..expected.len()], &expected[..]);
    assert!(elements[expected.len()..].iter().all(|keyed| !keyed));
}

#[test]
fn rejected_nonblocking_send_alters_nothing() {
    let (keyer, mut transmitter) = practice_keyer();
    assert!(keyer.send('A'));
    assert!(!keyer.send_nonblocking('X'));

    let mut output = Vec::new();
    pump(&mut transmitter, CYCLE * DOT * 20, &mut output);

    let expected: Vec<bool> = lookup('A').elements().collect();
    let elements = keyed_elements(&output);
    assert_eq!(&elements[..expected.len()], &expected[..]);
    assert!(elements[expected.len()..].iter().all(|keyed| !keyed));
}

#[test]
fn space_is_silent_but_still_sending() {
    let (keyer, mut transmitter) = practice_keyer();
    assert!(keyer.send(' '));

    // Midway through the word space: silent output, yet not idle.
    let mut output = Vec::new();
    pump(&mut transmitter, CYCLE * DOT * 3, &mut output);
    assert!(output.iter().all(|sample| *sample == 0.0));
    assert_eq!(keyer.idle_seconds(), 0.0);

    pump(&mut transmitter, CYCLE * DOT * 10, &mut output);
    assert!(output.iter().all(|sample| *sample == 0.0));
    assert!(keyer.idle_seconds() > 0.0);
}

#[test]
fn idle_timer_monotonic_until_next_send() {
    let (keyer, mut transmitter) = practice_keyer();
    assert!(keyer.send('E'));

    let mut output = Vec::new();
    pump(&mut transmitter, CYCLE * DOT * 6, &mut output);

    let mut last = keyer.idle_seconds();
    assert!(last > 0.0);
    for _ in 0..50 {
        pump(&mut transmitter, 512, &mut output);
        let idle = keyer.idle_seconds();
        assert!(idle >= last);
        last = idle;
    }

    // Accepting a character resets the gauge immediately.
    assert!(keyer.send('R'));
    assert_eq!(keyer.idle_seconds(), 0.0);
}

#[test]
fn blocking_send_waits_for_queue_drain() {
    let (keyer, mut transmitter) = practice_keyer();

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    let worker = thread::spawn(move || {
        let mut out = [0.0f32; 512];
        while !flag.load(Ordering::Relaxed) {
            transmitter.fill(&mut out);
        }
    });

    // Each send past the first has to wait for the previous character to
    // leave the queue, so acceptance order is transmission order.
    for c in ['P', 'A', 'R', 'I', 'S'] {
        assert!(keyer.send(c));
    }

    stop.store(true, Ordering::Relaxed);
    worker.join().unwrap();
}
