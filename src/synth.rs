//! The shared audio output: voices, the mixer, and the cpal-backed context.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;

use tracing::{debug, error, info};

use crate::error::AudioError;
use crate::instrument::Automation;

/// Headroom applied to the mixed signal so overlapping tones rarely clip.
const MASTER_GAIN: f32 = 0.3;

/// Anything tones can be played into: a clock plus a mixing destination.
pub trait AudioOutput: Send + Sync {
    /// Output-clock time in seconds.
    fn current_time(&self) -> f64;

    /// Add a voice to the destination. The voice is dropped after its stop time.
    fn connect(&self, voice: Voice) -> Result<(), AudioError>;
}

/// One sine generator routed through its own gain automation.
#[derive(Debug, Clone)]
pub struct Voice {
    frequency: f64,
    gain: Automation,
    start: f64,
    stop: f64,
}

impl Voice {
    pub fn new(frequency: f64, gain: Automation, start: f64, stop: f64) -> Self {
        Self {
            frequency,
            gain,
            start,
            stop,
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn gain(&self) -> &Automation {
        &self.gain
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn stop(&self) -> f64 {
        self.stop
    }

    /// Output sample at clock time `t`; silent outside [start, stop).
    pub fn sample_at(&self, t: f64) -> f64 {
        if t < self.start || t >= self.stop {
            return 0.0;
        }
        let phase = TAU * self.frequency * (t - self.start);
        phase.sin() * self.gain.value_at(t)
    }
}

/// Sums every live voice. Owned by the audio callback.
#[derive(Debug, Default)]
pub struct Mixer {
    voices: Vec<Voice>,
}

impl Mixer {
    pub fn add(&mut self, voice: Voice) {
        self.voices.push(voice);
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Mixed, clamped sample at clock time `t`.
    pub fn render(&self, t: f64) -> f32 {
        let sum: f64 = self.voices.iter().map(|v| v.sample_at(t)).sum();
        (sum as f32 * MASTER_GAIN).clamp(-1.0, 1.0)
    }

    /// Drop voices whose generator has stopped by `now`.
    pub fn retire(&mut self, now: f64) {
        self.voices.retain(|v| v.stop > now);
    }
}

/// Process-wide audio context driving the default output device.
///
/// The cpal stream lives on a dedicated thread for the lifetime of the
/// process; voices reach the callback over a channel and the callback
/// publishes how many frames it has rendered, which is the output clock.
pub struct AudioContext {
    voices: mpsc::Sender<Voice>,
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

static SHARED: Mutex<Option<Arc<AudioContext>>> = Mutex::new(None);

impl AudioContext {
    /// The shared context, opened on first use and reused afterward.
    pub fn shared() -> Result<Arc<AudioContext>, AudioError> {
        let mut slot = SHARED.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(ctx) = slot.as_ref() {
            return Ok(Arc::clone(ctx));
        }
        let ctx = Arc::new(Self::open()?);
        *slot = Some(Arc::clone(&ctx));
        Ok(ctx)
    }

    fn open() -> Result<Self, AudioError> {
        let (voice_tx, voice_rx) = mpsc::channel::<Voice>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<u32, AudioError>>(1);
        let frames = Arc::new(AtomicU64::new(0));
        let clock = Arc::clone(&frames);

        thread::Builder::new()
            .name("keytone-audio".into())
            .spawn(move || match start_stream(voice_rx, clock) {
                Ok((stream, sample_rate)) => {
                    let _ = ready_tx.send(Ok(sample_rate));
                    // The stream stops when dropped, so this thread holds it forever.
                    let _stream = stream;
                    loop {
                        thread::park();
                    }
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|_| AudioError::Disconnected)?;

        let sample_rate = ready_rx.recv().map_err(|_| AudioError::Disconnected)??;
        info!(sample_rate, "audio output opened");

        Ok(Self {
            voices: voice_tx,
            frames,
            sample_rate,
        })
    }
}

impl AudioOutput for AudioContext {
    fn current_time(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / f64::from(self.sample_rate)
    }

    fn connect(&self, voice: Voice) -> Result<(), AudioError> {
        self.voices.send(voice).map_err(|_| AudioError::Disconnected)
    }
}

fn start_stream(
    voices: mpsc::Receiver<Voice>,
    frames: Arc<AtomicU64>,
) -> Result<(cpal::Stream, u32), AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioError::NoOutputDevice)?;

    let supported = device.default_output_config()?;
    let sample_rate = supported.sample_rate();
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    debug!(?config, ?sample_format, "building output stream");

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, voices, frames)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, voices, frames)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, voices, frames)?,
        other => return Err(AudioError::UnsupportedFormat(other)),
    };
    stream.play()?;

    Ok((stream, sample_rate))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    voices: mpsc::Receiver<Voice>,
    frames: Arc<AtomicU64>,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let sample_rate = f64::from(config.sample_rate);
    let channels = usize::from(config.channels);
    let mut mixer = Mixer::default();
    let mut frame_index: u64 = 0;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            // Pick up newly triggered tones (non-blocking)
            while let Ok(voice) = voices.try_recv() {
                mixer.add(voice);
            }

            for frame in data.chunks_mut(channels) {
                let t = frame_index as f64 / sample_rate;
                let value = T::from_sample(mixer.render(t));
                for sample in frame.iter_mut() {
                    *sample = value;
                }
                frame_index += 1;
            }

            frames.store(frame_index, Ordering::Release);
            mixer.retire(frame_index as f64 / sample_rate);
        },
        move |err| {
            error!("audio stream error: {}", err);
        },
        None,
    )?;

    Ok(stream)
}
