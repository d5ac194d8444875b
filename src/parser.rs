use std::fs;
use std::path::Path;

use crate::error::MelodyError;
use crate::song::Melody;

/// A melody loaded from text, with optional metadata.
#[derive(Debug, Clone)]
pub struct MelodyFile {
    pub name: Option<String>,
    pub tempo: Option<f64>,
    pub melody: Melody,
}

/// Stand-in for numeric degrees too large or negative to store; never on the scale.
const OFF_SCALE: u8 = 0;

fn parse_error(line: usize, message: impl Into<String>) -> MelodyError {
    MelodyError::Parse {
        line,
        message: message.into(),
    }
}

/// Parse one `degree/duration_ms` token.
fn parse_event(token: &str, line: usize) -> Result<(u8, u32), MelodyError> {
    let (degree, duration) = token
        .split_once('/')
        .ok_or_else(|| parse_error(line, format!("expected degree/duration, got '{}'", token)))?;

    let degree: i64 = degree
        .trim()
        .parse()
        .map_err(|_| parse_error(line, format!("invalid degree: {}", degree)))?;
    // Any number is a degree; ones off the scale become rests
    let degree = u8::try_from(degree).unwrap_or(OFF_SCALE);
    let duration: i64 = duration
        .trim()
        .parse()
        .map_err(|_| parse_error(line, format!("invalid duration: {}", duration)))?;

    if duration <= 0 {
        return Err(parse_error(line, "duration must be positive"));
    }
    let duration = u32::try_from(duration)
        .map_err(|_| parse_error(line, format!("duration too long: {}", duration)))?;

    Ok((degree, duration))
}

/// Parse melody text.
///
/// Format (comments with #):
/// ```text
/// name: Twinkle
/// tempo: 0.5
/// 1/500 1/500 5/500 5/500
/// 6/500 6/500 5/1000
/// ```
pub fn parse(input: &str) -> Result<MelodyFile, MelodyError> {
    let mut name = None;
    let mut tempo = None;
    let mut pairs = Vec::new();

    for (line_idx, line) in input.lines().enumerate() {
        let line_num = line_idx + 1;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(value) = trimmed.strip_prefix("name:") {
            name = Some(value.trim().to_string());
            continue;
        }
        if let Some(value) = trimmed.strip_prefix("tempo:") {
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| parse_error(line_num, format!("invalid tempo: {}", value.trim())))?;
            if !value.is_finite() || value <= 0.0 {
                return Err(parse_error(line_num, "tempo must be positive"));
            }
            tempo = Some(value);
            continue;
        }

        for token in trimmed.split_whitespace() {
            pairs.push(parse_event(token, line_num)?);
        }
    }

    Ok(MelodyFile {
        name,
        tempo,
        melody: Melody::new(pairs)?,
    })
}

/// Load a melody from a file.
pub fn load(path: &Path) -> Result<MelodyFile, MelodyError> {
    let content = fs::read_to_string(path)?;
    parse(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::MelodyEvent;

    #[test]
    fn test_parse_simple_melody() {
        let input = "name: Opening\ntempo: 0.5\n\n6/1000 5/1000\n3/500";
        let file = parse(input).unwrap();
        assert_eq!(file.name.as_deref(), Some("Opening"));
        assert_eq!(file.tempo, Some(0.5));

        let events = file.melody.events();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            MelodyEvent {
                degree: 3,
                duration_ms: 500
            }
        );
    }

    #[test]
    fn test_comments_only_at_line_start() {
        let input = "# intro\n1/250 # trailing\n";
        assert!(parse(input).is_err());

        let input = "# intro\n1/250\n";
        assert_eq!(parse(input).unwrap().melody.len(), 1);
    }

    #[test]
    fn test_metadata_optional() {
        let file = parse("8/100").unwrap();
        assert!(file.name.is_none());
        assert!(file.tempo.is_none());
    }

    #[test]
    fn test_bad_durations_report_line() {
        for input in ["1/100\n2/0", "1/100\n2/-5", "1/100\n2/x"] {
            match parse(input) {
                Err(MelodyError::Parse { line, .. }) => assert_eq!(line, 2),
                other => panic!("expected parse error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_bad_tokens_rejected() {
        assert!(parse("6").is_err());
        assert!(parse("x/100").is_err());
        assert!(parse("tempo: 0").is_err());
        assert!(parse("tempo: fast").is_err());
    }

    #[test]
    fn test_unknown_degree_is_kept() {
        let file = parse("9/100 1/100").unwrap();
        assert_eq!(file.melody.events()[0].degree, 9);
    }

    #[test]
    fn test_out_of_range_numbers_are_rests() {
        let file = parse("-1/500 300/500 1/500").unwrap();
        let degrees: Vec<u8> = file.melody.events().iter().map(|e| e.degree).collect();
        assert_eq!(degrees, vec![0, 0, 1]);

        let plan = crate::sequencer::plan(&file.melody, crate::Tempo::default());
        assert!(plan[0].frequency.is_none());
        assert!(plan[1].frequency.is_none());
        assert_eq!(plan[2].offset, std::time::Duration::from_millis(1000));
        assert!(plan[2].frequency.is_some());
    }

    #[test]
    fn test_load_demo_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/twinkle.melody");
        let file = load(&path).unwrap();
        assert_eq!(file.name.as_deref(), Some("Twinkle Twinkle"));
        assert_eq!(file.tempo, Some(0.8));
        assert_eq!(file.melody.len(), 14);
        assert_eq!(file.melody.total_duration_ms(), 8000);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(Path::new("/definitely/not/here.melody")).unwrap_err();
        assert!(matches!(err, MelodyError::Io(_)));
    }
}
