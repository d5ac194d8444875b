use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use tracing::debug;

use keytone::song::ALL_SONGS;
use keytone::{Error, PitchTable, PlaybackHandle, Sequencer, Tempo, ToneEngine};

/// Run the interactive live keyboard mode
pub fn run(engine: &ToneEngine, sequencer: &Sequencer) -> Result<(), Error> {
    let mut stdout = io::stdout();

    terminal::enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;

    print_banner(&mut stdout);

    let result = event_loop(engine, sequencer, &mut stdout);

    // Restore terminal
    let _ = execute!(stdout, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();

    result
}

fn event_loop(
    engine: &ToneEngine,
    sequencer: &Sequencer,
    stdout: &mut io::Stdout,
) -> Result<(), Error> {
    let mut playing: Vec<(Instant, PlaybackHandle)> = Vec::new();

    loop {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }

        match event::read()? {
            Event::Key(KeyEvent {
                code: KeyCode::Esc,
                kind: KeyEventKind::Press,
                ..
            }) => {
                return Ok(());
            }

            // Space stops every song started from this session
            Event::Key(KeyEvent {
                code: KeyCode::Char(' '),
                kind: KeyEventKind::Press,
                ..
            }) => {
                for (_, handle) in playing.drain(..) {
                    handle.cancel();
                }
                update_status(stdout, "stopped");
            }

            Event::Key(KeyEvent {
                code: KeyCode::Char(c),
                kind: KeyEventKind::Press,
                ..
            }) => {
                // Number keys play the built-in songs
                if let Some(digit) = c.to_digit(10) {
                    let song = usize::try_from(digit)
                        .ok()
                        .and_then(|d| d.checked_sub(1))
                        .and_then(|idx| ALL_SONGS.get(idx));
                    if let Some(song) = song {
                        let melody = song.melody()?;
                        let now = Instant::now();
                        prune_finished(&mut playing, now);
                        playing.push((now, sequencer.play(&melody, Tempo::new(song.tempo)?)));
                        update_status(stdout, &format!("playing {}", song.name));
                    }
                    continue;
                }

                let symbol = c.to_ascii_uppercase().to_string();
                debug!(key = %symbol, "key press");
                engine.press(&symbol);
                update_status(stdout, &symbol);
            }

            _ => {}
        }
    }
}

/// Forget songs whose last tone has already finished.
fn prune_finished(playing: &mut Vec<(Instant, PlaybackHandle)>, now: Instant) {
    playing.retain(|(started, handle)| {
        now.saturating_duration_since(*started) < handle.duration()
    });
}

fn print_banner(stdout: &mut io::Stdout) {
    let table = PitchTable::new();
    let keys: Vec<String> = table.symbols().map(|s| s.to_string()).collect();
    let freqs: Vec<String> = table
        .symbols()
        .filter_map(|s| table.lookup(s))
        .map(|f| format!("{:.0}", f))
        .collect();

    let _ = write!(
        stdout,
        "\x1b[2J\x1b[H\
keytone live - press keys to play\r\n\
─────────────────────────────────────────\r\n\
\r\n\
  Keys:   {}\r\n\
  Hz:     {}\r\n\
\r\n",
        keys.join("   "),
        freqs.join(" ")
    );
    for (i, song) in ALL_SONGS.iter().enumerate() {
        let _ = write!(stdout, "  Song {}:  {}\r\n", i + 1, song.name);
    }
    let _ = write!(stdout, "\r\n  Stop:    Space\r\n  Quit:    Esc\r\n");
    update_status(stdout, "---");
}

fn update_status(stdout: &mut io::Stdout, last: &str) {
    let _ = write!(stdout, "\x1b[14;1H\x1b[2K  Last: {}\r", last);
    let _ = stdout.flush();
}
