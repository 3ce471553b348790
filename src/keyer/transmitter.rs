//! The element sequencer.
//! Runs entirely inside the audio callback: emits samples, walks the
//! active element code one bit per dot length, swaps in queued characters
//! and applies staged parameter changes between tones.

use std::sync::{atomic::Ordering, Arc};

use crate::{audio::wave::WaveTable, coding::morse::ElementCode};

use super::Shared;

/// The fill half of the keyer, owned by the audio callback.
pub struct Transmitter {
    shared: Arc<Shared>,
    sample_rate: u32,
    wave: WaveTable,
    /// Element code currently being transmitted.
    active: ElementCode,
    /// Completed waveform cycles within the current element.
    cycles: u32,
    /// Cycles per element at the current speed and tone.
    dot: u32,
}

impl Transmitter {
    pub(crate) fn new(shared: Arc<Shared>, sample_rate: u32) -> Self {
        Self {
            shared,
            sample_rate,
            wave: WaveTable::new(),
            active: ElementCode::EMPTY,
            cycles: 0,
            dot: 1,
        }
    }

    /// Produce the next block of output. Invoked by the host audio layer
    /// with whatever buffer size it favors; always fills all of `out`.
    pub fn fill(&mut self, out: &mut [f32]) {
        if self.wave.is_empty() {
            // Nothing built yet, so the first configuration applies here.
            self.apply_staged();
            if self.wave.is_empty() {
                out.fill(0.0);
                return;
            }
        }

        for sample in out.iter_mut() {
            *sample = self.sample();
        }

        // Parameter changes wait for a quiet moment.
        self.apply_staged();
    }

    fn sample(&mut self) -> f32 {
        let (wave, wrapped) = self.wave.tick();
        let out = if self.active.keyed() { wave } else { 0.0 };

        if wrapped {
            self.cycle_done();
        }

        out
    }

    /// One waveform cycle finished: track idle time, and at every dot
    /// length consume an element, reloading from the pending slot when
    /// the active code runs out.
    fn cycle_done(&mut self) {
        let pending = self.shared.pending.load(Ordering::Acquire);
        if pending == 0 && self.active.is_empty() {
            self.shared.idle.fetch_add(1, Ordering::Relaxed);
        } else {
            self.shared.idle.store(0, Ordering::Relaxed);
        }

        self.cycles += 1;
        if self.cycles < self.dot {
            return;
        }
        self.cycles = 0;

        self.active.advance();
        if !self.active.exhausted() {
            return;
        }

        self.active = ElementCode::from_raw(pending);
        if self.active != ElementCode::FEEDBACK {
            // Clear the slot unless it changed since we read it. The
            // feedback sentinel stays queued so it repeats.
            let _ = self.shared.pending.compare_exchange(
                pending,
                0,
                Ordering::AcqRel,
                Ordering::Relaxed,
            );
        }
    }

    /// Take a staged parameter change, but only while no tone is keyed.
    /// Returns true when a usable waveform buffer is in place afterwards.
    pub(crate) fn apply_staged(&mut self) -> bool {
        if !self.shared.dirty.load(Ordering::Acquire) || self.active.keyed() {
            return !self.wave.is_empty();
        }

        let Some(mut staged) = self.shared.staged.try_lock() else {
            return !self.wave.is_empty();
        };
        let Some(config) = staged.take() else {
            self.shared.dirty.store(false, Ordering::Release);
            return !self.wave.is_empty();
        };
        self.shared.dirty.store(false, Ordering::Release);
        drop(staged);

        match self.wave.rebuild(config.cycle, config.amplitude) {
            Some(len) => {
                let frequency = self.sample_rate as f64 / len as f64;
                self.dot = (1.2 * frequency / config.wpm).round().max(1.0) as u32;
                self.shared.frequency.store(frequency);
                log::debug!(
                    "tone rebuilt: {len} samples/cycle, {frequency:.1} Hz, dot of {} cycles",
                    self.dot
                );
                true
            }
            None => {
                log::warn!("waveform buffer allocation failed, keeping previous tone");
                false
            }
        }
    }
}
