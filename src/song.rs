//! Melodies in scale-degree notation and the built-in song catalog.

use crate::error::MelodyError;

/// One slot of a melody: which degree to sound, and how long until the next slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MelodyEvent {
    pub degree: u8,
    /// Slot length in milliseconds (not how long the tone sounds)
    pub duration_ms: u32,
}

/// An ordered, validated list of melody events.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Melody {
    events: Vec<MelodyEvent>,
}

impl Melody {
    /// Build from (degree, duration_ms) pairs. Zero durations are rejected;
    /// degrees outside the scale are kept and play as silence.
    pub fn new(pairs: impl IntoIterator<Item = (u8, u32)>) -> Result<Self, MelodyError> {
        let events = pairs
            .into_iter()
            .enumerate()
            .map(|(index, (degree, duration_ms))| {
                if duration_ms == 0 {
                    Err(MelodyError::ZeroDuration { index })
                } else {
                    Ok(MelodyEvent {
                        degree,
                        duration_ms,
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { events })
    }

    pub fn events(&self) -> &[MelodyEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Sum of every slot, in milliseconds at authored speed.
    pub fn total_duration_ms(&self) -> u64 {
        self.events.iter().map(|e| u64::from(e.duration_ms)).sum()
    }
}

/// A named melody with the tempo multiplier it is meant to be played at.
#[derive(Debug, Clone, Copy)]
pub struct Song {
    /// Unique identifier
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Tempo multiplier (below 1 plays faster)
    pub tempo: f64,
    notes: &'static [(u8, u32)],
}

impl Song {
    pub fn melody(&self) -> Result<Melody, MelodyError> {
        Melody::new(self.notes.iter().copied())
    }

    pub fn by_id(id: &str) -> Result<&'static Song, MelodyError> {
        ALL_SONGS
            .iter()
            .find(|s| s.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| MelodyError::UnknownSong(id.to_string()))
    }
}

pub const MAMA: Song = Song {
    id: "mama",
    name: "There's No One Like Mama",
    tempo: 1.0,
    notes: &[
        (6, 1000),
        (5, 1000),
        (3, 1000),
        (5, 1000),
        (8, 1000),
        (6, 500),
        (5, 500),
        (6, 1000),
    ],
};

pub const SHEXIANG: Song = Song {
    id: "shexiang",
    name: "Lady Shexiang",
    tempo: 0.5,
    notes: &[
        (6, 1000),
        (6, 1000),
        (6, 1000),
        (3, 500),
        (6, 500),
        (5, 1000),
        (3, 500),
        (2, 500),
        (3, 1000),
    ],
};

pub const ALL_SONGS: &[Song] = &[MAMA, SHEXIANG];
