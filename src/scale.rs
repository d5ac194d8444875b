//! Numbered scale degrees (simplified notation) mapped onto keys.

use crate::note::KeySymbol;

/// Degree 1 is the lowest key; degree 8 is its octave.
const DEGREES: [char; 8] = ['A', 'S', 'D', 'F', 'G', 'H', 'J', 'K'];

/// Immutable scale degree → key symbol mapping over degrees 1..=8.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaleMap;

impl ScaleMap {
    pub const fn new() -> Self {
        Self
    }

    pub fn lookup(&self, degree: u8) -> Option<KeySymbol> {
        let idx = usize::from(degree).checked_sub(1)?;
        DEGREES.get(idx).and_then(|&c| KeySymbol::new(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrees_map_to_home_row() {
        let scale = ScaleMap::new();
        let keys: String = (1..=8)
            .filter_map(|d| scale.lookup(d))
            .map(KeySymbol::as_char)
            .collect();
        assert_eq!(keys, "ASDFGHJK");
    }

    #[test]
    fn test_out_of_range_degrees_miss() {
        let scale = ScaleMap::new();
        assert_eq!(scale.lookup(0), None);
        assert_eq!(scale.lookup(9), None);
        assert_eq!(scale.lookup(u8::MAX), None);
    }
}
