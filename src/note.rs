//! Key symbols and the fixed pitch table they map to.

use std::fmt;

/// A playable key, canonicalized to upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySymbol(char);

impl KeySymbol {
    /// Canonicalize a single character. Returns None for non-alphabetic input.
    pub fn new(c: char) -> Option<Self> {
        if c.is_ascii_alphabetic() {
            Some(Self(c.to_ascii_uppercase()))
        } else {
            None
        }
    }

    /// Parse a one-character string such as "a" or "K".
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.trim().chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Self::new(c)
    }

    pub fn as_char(self) -> char {
        self.0
    }
}

impl fmt::Display for KeySymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Home-row keys and their frequencies in Hz, low to high.
const PITCHES: [(char, f64); 8] = [
    ('A', 196.0),
    ('S', 220.0),
    ('D', 246.0),
    ('F', 261.0),
    ('G', 293.0),
    ('H', 329.0),
    ('J', 349.0),
    ('K', 392.0),
];

/// Immutable key symbol → frequency mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct PitchTable;

impl PitchTable {
    pub const fn new() -> Self {
        Self
    }

    /// Frequency for a key, or None if the key is not on the instrument.
    pub fn lookup(&self, symbol: KeySymbol) -> Option<f64> {
        PITCHES
            .iter()
            .find(|(c, _)| *c == symbol.0)
            .map(|&(_, freq)| freq)
    }

    /// Lookup from raw text; anything that is not a single mapped key is a miss.
    pub fn lookup_str(&self, symbol: &str) -> Option<f64> {
        KeySymbol::parse(symbol).and_then(|s| self.lookup(s))
    }

    /// Every mapped key in keyboard order.
    pub fn symbols(&self) -> impl Iterator<Item = KeySymbol> {
        PITCHES.iter().map(|&(c, _)| KeySymbol(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_exact_frequencies() {
        let table = PitchTable::new();
        assert_eq!(table.lookup_str("A"), Some(196.0));
        assert_eq!(table.lookup_str("S"), Some(220.0));
        assert_eq!(table.lookup_str("D"), Some(246.0));
        assert_eq!(table.lookup_str("F"), Some(261.0));
        assert_eq!(table.lookup_str("G"), Some(293.0));
        assert_eq!(table.lookup_str("H"), Some(329.0));
        assert_eq!(table.lookup_str("J"), Some(349.0));
        assert_eq!(table.lookup_str("K"), Some(392.0));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = PitchTable::new();
        assert_eq!(table.lookup_str("h"), table.lookup_str("H"));
        assert_eq!(KeySymbol::new('g').map(KeySymbol::as_char), Some('G'));
    }

    #[test]
    fn test_unknown_symbols_miss() {
        let table = PitchTable::new();
        assert_eq!(table.lookup_str("Z"), None);
        assert_eq!(table.lookup_str("AS"), None);
        assert_eq!(table.lookup_str(""), None);
        assert_eq!(table.lookup_str(";"), None);
    }

    #[test]
    fn test_every_symbol_has_positive_frequency() {
        let table = PitchTable::new();
        let symbols: Vec<_> = table.symbols().collect();
        assert_eq!(symbols.len(), 8);
        for symbol in symbols {
            assert!(table.lookup(symbol).is_some_and(|f| f > 0.0));
        }
    }
}
