//! Melody playback: cumulative offsets, scaled by tempo, handed to a scheduler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::SequencerError;
use crate::note::{KeySymbol, PitchTable};
use crate::scale::ScaleMap;
use crate::scheduler::Scheduler;
use crate::song::Melody;
use crate::tone::ToneEngine;

/// Tempo multiplier applied to every offset. 1.0 plays as written; values
/// below 1 play faster and values above 1 play slower.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo(f64);

impl Tempo {
    pub fn new(multiplier: f64) -> Result<Self, SequencerError> {
        if multiplier.is_finite() && multiplier > 0.0 {
            Ok(Self(multiplier))
        } else {
            Err(SequencerError::InvalidTempo(multiplier))
        }
    }

    pub fn multiplier(self) -> f64 {
        self.0
    }

    /// Real-time offset for a cumulative authored offset in milliseconds.
    pub fn scale(self, offset_ms: u64) -> Duration {
        let nanos = (offset_ms as f64 * self.0 * 1_000_000.0).round();
        Duration::from_nanos(nanos as u64)
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self(1.0)
    }
}

/// One planned trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledNote {
    /// Position in the melody
    pub index: usize,
    /// Delay from the start of playback
    pub offset: Duration,
    pub degree: u8,
    pub symbol: Option<KeySymbol>,
    /// None means this slot is silent
    pub frequency: Option<f64>,
}

/// Returned by [`Sequencer::play`]. Dropping it leaves playback running.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    cancelled: Arc<AtomicBool>,
    scheduled: usize,
    duration: Duration,
}

impl PlaybackHandle {
    /// Silence every trigger of this playback that has not fired yet.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Number of triggers handed to the scheduler.
    pub fn scheduled(&self) -> usize {
        self.scheduled
    }

    /// Time from the play call until the last tone has finished sounding.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Resolve every event and compute when it fires. Pure.
///
/// The i-th note fires at `tempo * sum(durations[..i])`; whether a slot
/// resolves to a pitch never affects the offsets after it.
pub fn plan(melody: &Melody, tempo: Tempo) -> Vec<ScheduledNote> {
    let scale = ScaleMap::new();
    let pitches = PitchTable::new();
    let mut cumulative_ms: u64 = 0;
    melody
        .events()
        .iter()
        .enumerate()
        .map(|(index, event)| {
            let symbol = scale.lookup(event.degree);
            let note = ScheduledNote {
                index,
                offset: tempo.scale(cumulative_ms),
                degree: event.degree,
                symbol,
                frequency: symbol.and_then(|s| pitches.lookup(s)),
            };
            cumulative_ms += u64::from(event.duration_ms);
            note
        })
        .collect()
}

pub struct Sequencer {
    engine: ToneEngine,
    scheduler: Arc<dyn Scheduler>,
}

impl Sequencer {
    pub fn new(engine: ToneEngine, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { engine, scheduler }
    }

    pub fn plan(&self, melody: &Melody, tempo: Tempo) -> Vec<ScheduledNote> {
        plan(melody, tempo)
    }

    /// Schedule the whole melody and return at once.
    pub fn play(&self, melody: &Melody, tempo: Tempo) -> PlaybackHandle {
        let plan = self.plan(melody, tempo);
        let cancelled = Arc::new(AtomicBool::new(false));
        let duration = plan
            .last()
            .map_or(Duration::ZERO, |last| last.offset + self.engine.tone_length());

        info!(
            notes = plan.len(),
            tempo = tempo.multiplier(),
            "starting playback"
        );

        for note in &plan {
            debug!(index = note.index, offset = ?note.offset, degree = note.degree, "schedule");
            let engine = self.engine.clone();
            let cancelled = Arc::clone(&cancelled);
            let frequency = note.frequency;
            self.scheduler.schedule(
                note.offset,
                Box::new(move || {
                    if !cancelled.load(Ordering::Acquire) {
                        engine.trigger(frequency);
                    }
                }),
            );
        }

        PlaybackHandle {
            cancelled,
            scheduled: plan.len(),
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AudioError;
    use crate::scheduler::ManualScheduler;
    use crate::synth::{AudioOutput, Voice};
    use std::sync::Mutex;

    /// Output whose clock is the manual scheduler's virtual time.
    struct ClockedOutput {
        clock: Arc<ManualScheduler>,
        voices: Mutex<Vec<Voice>>,
    }

    impl AudioOutput for ClockedOutput {
        fn current_time(&self) -> f64 {
            self.clock.now().as_secs_f64()
        }

        fn connect(&self, voice: Voice) -> Result<(), AudioError> {
            self.voices.lock().unwrap().push(voice);
            Ok(())
        }
    }

    struct Rig {
        clock: Arc<ManualScheduler>,
        output: Arc<ClockedOutput>,
        sequencer: Sequencer,
    }

    impl Rig {
        fn new() -> Self {
            let clock = Arc::new(ManualScheduler::new());
            let output = Arc::new(ClockedOutput {
                clock: Arc::clone(&clock),
                voices: Mutex::new(Vec::new()),
            });
            let engine = ToneEngine::with_output(output.clone());
            let sequencer = Sequencer::new(engine, clock.clone());
            Self {
                clock,
                output,
                sequencer,
            }
        }

        /// (start seconds, frequency) of every tone played so far.
        fn played(&self) -> Vec<(f64, f64)> {
            self.output
                .voices
                .lock()
                .unwrap()
                .iter()
                .map(|v| (v.start(), v.frequency()))
                .collect()
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn opening() -> Melody {
        Melody::new([(6, 1000), (5, 1000), (3, 1000)]).unwrap()
    }

    #[test]
    fn test_plan_offsets_at_authored_tempo() {
        let rig = Rig::new();
        let plan = rig.sequencer.plan(&opening(), Tempo::default());

        let offsets: Vec<_> = plan.iter().map(|n| n.offset).collect();
        assert_eq!(offsets, vec![ms(0), ms(1000), ms(2000)]);

        let keys: String = plan
            .iter()
            .filter_map(|n| n.symbol)
            .map(KeySymbol::as_char)
            .collect();
        assert_eq!(keys, "HGD");

        let freqs: Vec<_> = plan.iter().map(|n| n.frequency).collect();
        assert_eq!(freqs, vec![Some(329.0), Some(293.0), Some(246.0)]);
    }

    #[test]
    fn test_plan_offsets_at_half_tempo() {
        let rig = Rig::new();
        let plan = rig.sequencer.plan(&opening(), Tempo::new(0.5).unwrap());
        let offsets: Vec<_> = plan.iter().map(|n| n.offset).collect();
        assert_eq!(offsets, vec![ms(0), ms(500), ms(1000)]);
    }

    #[test]
    fn test_slow_tempo_stretches() {
        let rig = Rig::new();
        let plan = rig.sequencer.plan(&opening(), Tempo::new(2.0).unwrap());
        assert_eq!(plan[2].offset, ms(4000));
    }

    #[test]
    fn test_play_fires_at_offsets() {
        let rig = Rig::new();
        let handle = rig.sequencer.play(&opening(), Tempo::default());
        assert_eq!(handle.scheduled(), 3);
        assert_eq!(handle.duration(), ms(3000));
        assert_eq!(rig.clock.deadlines(), vec![ms(0), ms(1000), ms(2000)]);
        assert!(rig.played().is_empty());

        rig.clock.run_all();
        assert_eq!(
            rig.played(),
            vec![(0.0, 329.0), (1.0, 293.0), (2.0, 246.0)]
        );
    }

    #[test]
    fn test_missing_degree_keeps_slot() {
        let rig = Rig::new();
        let melody = Melody::new([(1, 100), (9, 100), (2, 100)]).unwrap();
        let plan = rig.sequencer.plan(&melody, Tempo::default());
        assert_eq!(plan[1].frequency, None);
        assert_eq!(plan[2].offset, ms(200));

        rig.sequencer.play(&melody, Tempo::default());
        rig.clock.run_all();
        assert_eq!(rig.played(), vec![(0.0, 196.0), (0.2, 220.0)]);
    }

    #[test]
    fn test_empty_melody_schedules_nothing() {
        let rig = Rig::new();
        let handle = rig.sequencer.play(&Melody::default(), Tempo::default());
        assert_eq!(handle.scheduled(), 0);
        assert_eq!(handle.duration(), Duration::ZERO);
        assert!(rig.clock.deadlines().is_empty());
    }

    #[test]
    fn test_concurrent_plays_keep_their_own_offsets() {
        let rig = Rig::new();
        let low = Melody::new([(1, 300), (2, 300)]).unwrap();
        let high = Melody::new([(7, 1000), (8, 1000)]).unwrap();

        rig.sequencer.play(&low, Tempo::default());
        rig.clock.advance(ms(100));
        rig.sequencer.play(&high, Tempo::new(0.5).unwrap());
        rig.clock.run_all();

        let played = rig.played();
        assert_eq!(played.len(), 4);

        let low_starts: Vec<f64> = played
            .iter()
            .filter(|(_, f)| *f < 300.0)
            .map(|(t, _)| *t)
            .collect();
        let high_starts: Vec<f64> = played
            .iter()
            .filter(|(_, f)| *f > 300.0)
            .map(|(t, _)| *t)
            .collect();
        assert_eq!(low_starts, vec![0.0, 0.3]);
        assert_eq!(high_starts, vec![0.1, 0.6]);
    }

    #[test]
    fn test_cancel_silences_unfired_notes() {
        let rig = Rig::new();
        let handle = rig.sequencer.play(&opening(), Tempo::default());

        rig.clock.advance(ms(1000));
        assert_eq!(rig.played().len(), 2);

        handle.cancel();
        assert!(handle.is_cancelled());
        rig.clock.run_all();
        assert_eq!(rig.played().len(), 2);
    }

    #[test]
    fn test_cancel_is_per_playback() {
        let rig = Rig::new();
        let first = rig.sequencer.play(&opening(), Tempo::default());
        rig.sequencer.play(&opening(), Tempo::default());
        first.cancel();
        rig.clock.run_all();
        assert_eq!(rig.played().len(), 3);
    }

    #[test]
    fn test_invalid_tempo_rejected() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(Tempo::new(bad).is_err());
        }
    }
}
