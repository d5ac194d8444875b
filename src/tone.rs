//! Fire-and-forget tone triggering on the shared output.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::AudioError;
use crate::instrument::Instrument;
use crate::note::PitchTable;
use crate::synth::{AudioContext, AudioOutput, Voice};

/// Plays one enveloped sine tone per trigger. Cheap to clone; all clones
/// share the same output.
#[derive(Clone)]
pub struct ToneEngine {
    output: Arc<dyn AudioOutput>,
    instrument: Instrument,
    pitches: PitchTable,
}

impl ToneEngine {
    /// Engine on the process-wide audio context. Fails if audio is unavailable.
    pub fn new() -> Result<Self, AudioError> {
        let output: Arc<dyn AudioOutput> = AudioContext::shared()?;
        Ok(Self::with_output(output))
    }

    pub fn with_output(output: Arc<dyn AudioOutput>) -> Self {
        Self {
            output,
            instrument: Instrument::default(),
            pitches: PitchTable::new(),
        }
    }

    /// How long every tone sounds, start to stop.
    pub fn tone_length(&self) -> Duration {
        Duration::from_secs_f64(self.instrument.length)
    }

    /// Trigger a resolved frequency; a miss does nothing.
    pub fn trigger(&self, frequency: Option<f64>) {
        match frequency {
            Some(freq) => self.trigger_frequency(freq),
            None => trace!("trigger with no frequency, skipping"),
        }
    }

    /// Key press surface: look the symbol up and play it if mapped.
    pub fn press(&self, symbol: &str) {
        let frequency = self.pitches.lookup_str(symbol);
        if frequency.is_none() {
            trace!(symbol, "unmapped key");
        }
        self.trigger(frequency);
    }

    pub fn trigger_frequency(&self, frequency: f64) {
        if !frequency.is_finite() || frequency <= 0.0 {
            trace!(frequency, "ignoring unplayable frequency");
            return;
        }

        let start = self.output.current_time();
        let stop = start + self.instrument.length;
        let gain = self.instrument.gain_automation(start);
        debug!(frequency, start, "tone");

        if let Err(e) = self.output.connect(Voice::new(frequency, gain, start, stop)) {
            warn!("dropping tone at {} Hz: {}", frequency, e);
        }
    }
}
