//! keytone: a tiny keyboard instrument.
//!
//! A key press becomes a one-second enveloped sine tone on the shared audio
//! output; a melody written in scale degrees is played by scheduling those
//! tones at cumulative, tempo-scaled offsets.
//!
//! - [`note`]       : key symbols and the pitch table
//! - [`scale`]      : scale degrees → keys
//! - [`instrument`] : gain automation and the tone envelope
//! - [`synth`]      : shared audio output (cpal), voices, mixer
//! - [`tone`]       : `ToneEngine`, the trigger surface
//! - [`song`]       : melodies and the built-in songs
//! - [`parser`]     : `.melody` text files
//! - [`scheduler`]  : deferred work (timer thread and manual clock)
//! - [`sequencer`]  : melody playback

pub mod error;
pub mod instrument;
pub mod note;
pub mod parser;
pub mod scale;
pub mod scheduler;
pub mod sequencer;
pub mod song;
pub mod synth;
pub mod tone;

pub use error::{AudioError, Error, MelodyError, SequencerError};
pub use note::{KeySymbol, PitchTable};
pub use scale::ScaleMap;
pub use sequencer::{PlaybackHandle, Sequencer, Tempo};
pub use song::{Melody, MelodyEvent, Song};
pub use tone::ToneEngine;
