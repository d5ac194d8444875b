mod repl;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{Level, info};

use keytone::scheduler::TimerScheduler;
use keytone::song::ALL_SONGS;
use keytone::{Error, Melody, PitchTable, Sequencer, Song, Tempo, ToneEngine, parser, sequencer};

#[derive(Parser)]
#[command(name = "keytone", about = "Tiny keyboard instrument and melody player")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive keyboard mode: press keys to play tones
    Live,

    /// Play a built-in song or a melody file through speakers
    Play(MelodyArgs),

    /// Play a single key
    Tone {
        /// Key symbol, e.g. A or k
        symbol: String,
    },

    /// List the built-in songs
    Songs,

    /// Print when each note of a melody would fire
    Show(MelodyArgs),
}

#[derive(Args)]
struct MelodyArgs {
    /// Built-in song id (see `songs`)
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    song: Option<String>,

    /// Path to a .melody file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Override tempo multiplier (below 1 is faster)
    #[arg(long)]
    tempo: Option<f64>,
}

impl MelodyArgs {
    /// Resolve to a display name, a melody, and the tempo to play it at.
    fn load(&self) -> Result<(String, Melody, Tempo), Error> {
        let (name, melody, tempo) = match (&self.file, self.song.as_deref()) {
            (Some(path), _) => {
                let file = parser::load(path)?;
                let name = file
                    .name
                    .unwrap_or_else(|| path.display().to_string());
                (name, file.melody, file.tempo.unwrap_or(1.0))
            }
            (None, id) => {
                let song = Song::by_id(id.unwrap_or_default())?;
                (song.name.to_string(), song.melody()?, song.tempo)
            }
        };
        let tempo = Tempo::new(self.tempo.unwrap_or(tempo))?;
        Ok((name, melody, tempo))
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Command) -> Result<(), Error> {
    match command {
        Command::Live => {
            let engine = ToneEngine::new()?;
            let sequencer = Sequencer::new(engine.clone(), Arc::new(TimerScheduler::new()?));
            repl::run(&engine, &sequencer)
        }
        Command::Play(args) => {
            let (name, melody, tempo) = args.load()?;
            let engine = ToneEngine::new()?;
            let sequencer = Sequencer::new(engine, Arc::new(TimerScheduler::new()?));

            println!(
                "Playing: {} ({} notes, tempo x{})",
                name,
                melody.len(),
                tempo.multiplier()
            );
            let handle = sequencer.play(&melody, tempo);
            // Let the last tone ring out before the process exits
            thread::sleep(handle.duration() + Duration::from_millis(100));
            info!("playback finished");
            Ok(())
        }
        Command::Tone { symbol } => {
            if PitchTable::new().lookup_str(&symbol).is_none() {
                println!("'{}' is not a key on this instrument", symbol);
                return Ok(());
            }
            let engine = ToneEngine::new()?;
            engine.press(&symbol);
            thread::sleep(engine.tone_length());
            Ok(())
        }
        Command::Songs => {
            for song in ALL_SONGS {
                println!("{:<10} {} (tempo x{})", song.id, song.name, song.tempo);
            }
            Ok(())
        }
        Command::Show(args) => {
            let (name, melody, tempo) = args.load()?;
            print_plan(&name, &melody, tempo);
            Ok(())
        }
    }
}

fn print_plan(name: &str, melody: &Melody, tempo: Tempo) {
    println!("Melody: {}", name);
    println!("Tempo: x{}", tempo.multiplier());
    println!();
    for note in sequencer::plan(melody, tempo) {
        let pitch = match (note.symbol, note.frequency) {
            (Some(symbol), Some(freq)) => format!("{} ({:.0} Hz)", symbol, freq),
            _ => "rest".to_string(),
        };
        println!(
            "  {:>3}  +{:>6} ms  degree {}  {}",
            note.index + 1,
            note.offset.as_millis(),
            note.degree,
            pitch
        );
    }
}
