use thiserror::Error;

/// Failures opening or driving the shared audio output.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no output audio device available")]
    NoOutputDevice,

    #[error("failed to get default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to play stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("unsupported device sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("audio thread disconnected")]
    Disconnected,
}

/// Errors building or loading a melody.
#[derive(Debug, Error)]
pub enum MelodyError {
    #[error("event {index}: duration must be positive")]
    ZeroDuration { index: usize },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("unknown song '{0}'")]
    UnknownSong(String),

    #[error("reading melody file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised when starting playback.
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("tempo multiplier must be finite and positive, got {0}")]
    InvalidTempo(f64),
}

/// Top-level error for the command-line front end.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Melody(#[from] MelodyError),

    #[error(transparent)]
    Sequencer(#[from] SequencerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
