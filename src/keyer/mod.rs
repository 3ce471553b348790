//! The keyer core.
//! A [`Keyer`] is the control side of the tone generator: it configures
//! speed, tone and loudness, queues characters and reads idle time. The
//! paired [`Transmitter`] runs in the audio callback and does everything
//! else.

mod transmitter;

pub use transmitter::Transmitter;

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc,
    },
    thread,
};

use anyhow::{ensure, Result};
use cpal::traits::StreamTrait;
use crossbeam::atomic::AtomicCell;
use parking_lot::Mutex;

use crate::{
    audio::devices,
    coding::morse::{self, ElementCode},
};

/// Code speed used when nothing else is asked for.
pub const DEFAULT_WPM: f64 = 22.0;
/// Tone used when nothing else is asked for.
pub const DEFAULT_FREQUENCY: f64 = 800.0;
/// Full loudness.
pub const DEFAULT_LOUDNESS: f64 = 1.0;

/// Requested timing parameters, staged until the transmitter is silent.
pub(crate) struct Config {
    /// Waveform cycle length in samples.
    pub cycle: usize,
    /// Peak sample value, loudness scaled to a full scale of 1.0.
    pub amplitude: f32,
    /// Code speed in words per minute.
    pub wpm: f64,
}

/// State shared between the control thread and the audio callback.
/// Every field is read and written in a single atomic step; the staged
/// config is the one multi-field record and sits behind its own mutex,
/// which the callback side only ever `try_lock`s.
pub(crate) struct Shared {
    /// Element code waiting to be transmitted, 0 while the slot is free.
    pub pending: AtomicU32,
    /// Completed waveform cycles since the transmitter went quiet.
    pub idle: AtomicU64,
    /// Cleared on shutdown so blocked senders give up.
    pub live: AtomicBool,
    /// Tone frequency actually in effect, quantized by the cycle length.
    pub frequency: AtomicCell<f64>,
    /// Parameters requested but not yet applied.
    pub staged: Mutex<Option<Config>>,
    /// Set while `staged` holds a new request.
    pub dirty: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            pending: AtomicU32::new(0),
            idle: AtomicU64::new(0),
            live: AtomicBool::new(true),
            frequency: AtomicCell::new(0.0),
            staged: Mutex::new(None),
            dirty: AtomicBool::new(false),
        }
    }
}

/// Control-side handle to the tone generator.
///
/// The first [`Keyer::configure`] call acquires the audio device and
/// starts the output stream; dropping the keyer (or calling
/// [`Keyer::shutdown`]) stops the stream and releases the device again.
pub struct Keyer {
    shared: Arc<Shared>,
    sample_rate: Option<u32>,
    stream: Option<cpal::Stream>,
}

impl Keyer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            sample_rate: None,
            stream: None,
        }
    }

    /// Pair a keyer with a transmitter driven by the caller instead of an
    /// audio device. The host is expected to call [`Transmitter::fill`]
    /// periodically, exactly as a stream callback would.
    pub fn detached(sample_rate: u32) -> (Self, Transmitter) {
        let shared = Arc::new(Shared::new());
        let transmitter = Transmitter::new(shared.clone(), sample_rate);

        (
            Self {
                shared,
                sample_rate: Some(sample_rate),
                stream: None,
            },
            transmitter,
        )
    }

    /// Set code speed, tone frequency and loudness.
    ///
    /// The first call opens the audio device, builds the initial waveform
    /// and starts playback; it fails if the device can't be acquired or
    /// the waveform can't be built. Later calls stage the new parameters,
    /// which the transmitter picks up once it is between tones, so a
    /// change never cuts into a sounding element.
    pub fn configure(&mut self, wpm: f64, frequency: f64, loudness: f64) -> Result<()> {
        ensure!(wpm.is_finite() && wpm > 0.0, "code speed must be positive");
        ensure!(
            frequency.is_finite() && frequency > 0.0,
            "tone frequency must be positive"
        );
        let amplitude = loudness.clamp(0.0, 1.0) as f32;

        let mut opened = None;
        let sample_rate = match self.sample_rate {
            Some(sample_rate) => sample_rate,
            None => {
                let output = devices::default_output()?;
                let sample_rate = output.sample_rate();
                self.sample_rate = Some(sample_rate);
                opened = Some(output);
                sample_rate
            }
        };

        let cycle = (sample_rate as f64 / frequency).round() as usize;
        ensure!(cycle > 0, "tone frequency above the sample rate");

        *self.shared.staged.lock() = Some(Config {
            cycle,
            amplitude,
            wpm,
        });
        self.shared.dirty.store(true, Ordering::Release);

        if let Some(output) = opened {
            let mut transmitter = Transmitter::new(self.shared.clone(), sample_rate);
            ensure!(
                transmitter.apply_staged(),
                "could not build the waveform buffer"
            );

            let stream = output.build_stream(transmitter)?;
            stream.play()?;
            self.stream = Some(stream);
        }

        Ok(())
    }

    /// Queue a character, waiting for the slot to drain first. At most one
    /// character is ever queued ahead of the one being transmitted, and
    /// characters sound in the order they were accepted. Returns false
    /// only if the keyer shuts down while waiting.
    pub fn send(&self, c: char) -> bool {
        self.enqueue(c, true)
    }

    /// Queue a character only if the slot is currently free; returns
    /// false immediately otherwise, leaving the queue untouched.
    pub fn send_nonblocking(&self, c: char) -> bool {
        self.enqueue(c, false)
    }

    fn enqueue(&self, c: char, blocking: bool) -> bool {
        let shared = &self.shared;

        if c == '\0' {
            // Reserved: continuous dot feedback, preempting anything queued.
            shared
                .pending
                .store(ElementCode::FEEDBACK.raw(), Ordering::Release);
            shared.idle.store(0, Ordering::Relaxed);
            return true;
        }

        // A queued feedback pattern yields to any real character.
        let _ = shared.pending.compare_exchange(
            ElementCode::FEEDBACK.raw(),
            0,
            Ordering::AcqRel,
            Ordering::Relaxed,
        );

        let code = morse::lookup(c);
        loop {
            match shared
                .pending
                .compare_exchange(0, code.raw(), Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => {
                    shared.idle.store(0, Ordering::Relaxed);
                    return true;
                }
                Err(_) if !blocking => return false,
                Err(_) => {
                    if !shared.live.load(Ordering::Relaxed) {
                        return false;
                    }
                    thread::yield_now();
                }
            }
        }
    }

    /// Seconds since the transmitter last had anything to say. Zero while
    /// code is queued or sounding, and before the first configuration.
    pub fn idle_seconds(&self) -> f64 {
        let frequency = self.shared.frequency.load();
        if frequency <= 0.0 {
            return 0.0;
        }

        self.shared.idle.load(Ordering::Relaxed) as f64 / frequency
    }

    /// Stop the stream and release the audio device. Idempotent, run on
    /// drop as well, and safe to call from a lifecycle or signal hook.
    /// Any sender blocked in [`Keyer::send`] returns false.
    pub fn shutdown(&mut self) {
        self.shared.live.store(false, Ordering::Release);
        self.stream.take();
    }
}

impl Default for Keyer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Keyer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
