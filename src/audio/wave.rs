//! Waveform cycle buffer.
//! Holds one full period of a sine wave at the configured tone frequency
//! and amplitude. The read position advances on every output sample,
//! keyed or silent, which makes completed cycles the timing clock for the
//! element sequencer.

use std::f32::consts::PI;

pub struct WaveTable {
    samples: Vec<f32>,
    pos: usize,
}

impl WaveTable {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
            pos: 0,
        }
    }

    /// Cycle length in samples. The achievable tone frequency is the
    /// sample rate divided by this.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Regenerate the cycle at a new length and amplitude, returning the
    /// length actually in use. If the new allocation fails the old length
    /// is kept and refilled at the new amplitude; `None` only when no
    /// buffer has ever been built.
    pub fn rebuild(&mut self, len: usize, amplitude: f32) -> Option<usize> {
        if len != self.samples.len() {
            let mut fresh = Vec::new();
            if fresh.try_reserve_exact(len).is_ok() {
                fresh.resize(len, 0.0);
                self.samples = fresh;
            } else if self.samples.is_empty() {
                return None;
            }
        }

        let len = self.samples.len();
        for (i, sample) in self.samples.iter_mut().enumerate() {
            *sample = amplitude * (2.0 * PI * i as f32 / len as f32).sin();
        }

        self.pos = 0;
        Some(len)
    }

    /// Next sample of the cycle and whether the position wrapped back to
    /// the start, completing a cycle. Must not be called while empty.
    pub fn tick(&mut self) -> (f32, bool) {
        let sample = self.samples[self.pos];
        self.pos += 1;

        if self.pos < self.samples.len() {
            (sample, false)
        } else {
            self.pos = 0;
            (sample, true)
        }
    }
}

impl Default for WaveTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::WaveTable;

    #[test]
    fn test_rebuild_fills_one_cycle() {
        let mut wave = WaveTable::new();
        assert_eq!(wave.rebuild(8, 1.0), Some(8));
        assert_eq!(wave.len(), 8);

        let (first, _) = wave.tick();
        assert_eq!(first, 0.0);

        wave.tick();
        let (quarter, _) = wave.tick();
        assert!((quarter - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_amplitude_scales() {
        let mut wave = WaveTable::new();
        wave.rebuild(8, 0.5).unwrap();
        for _ in 0..2 {
            wave.tick();
        }
        let (quarter, _) = wave.tick();
        assert!((quarter - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_tick_wraps_per_cycle() {
        let mut wave = WaveTable::new();
        wave.rebuild(5, 1.0).unwrap();

        let mut wraps = 0;
        for _ in 0..15 {
            if wave.tick().1 {
                wraps += 1;
            }
        }
        assert_eq!(wraps, 3);
    }

    #[test]
    fn test_rebuild_resets_position() {
        let mut wave = WaveTable::new();
        wave.rebuild(6, 1.0).unwrap();
        wave.tick();
        wave.tick();

        wave.rebuild(4, 1.0).unwrap();
        assert_eq!(wave.tick().0, 0.0);
    }
}
