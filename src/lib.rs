//! Core tone generator for Morse code practice.
//!
//! A [`Keyer`] owns the control side: configure speed, tone and loudness,
//! queue characters, read how long the output has been silent. The paired
//! [`Transmitter`] lives in the audio callback and turns queued characters
//! into keyed sine output with sample-accurate element timing, clocked by
//! the audio subsystem's own sample consumption.
//!
//! ```no_run
//! use cw_practice::Keyer;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut keyer = Keyer::new();
//! keyer.configure(22.0, 800.0, 1.0)?;
//!
//! keyer.send('C');
//! keyer.send('Q');
//! while keyer.idle_seconds() < 2.0 {
//!     std::thread::yield_now();
//! }
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod coding;
pub mod keyer;

pub use keyer::{Keyer, Transmitter};
