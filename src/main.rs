// clicktrack - command-line metronome
//
// Usage:
//   clicktrack --tempo 96 --beats 3            interactive, until `q`
//   clicktrack --tempo 140 --bars 8            play 8 bars and exit
//   clicktrack --bars 4 --export click.wav     render 4 bars to a file

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use clicktrack::audio::export::export_bars_to_wav;
use clicktrack::{AudioOutput, BeatPattern, ClickSound, CpalOutput, EngineConfig, Metronome, SampleBank};
use log::{info, warn};

const DEFAULT_CONFIG_FILE: &str = "clicktrack.ron";
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Parser)]
#[command(name = "clicktrack", about = "Sample-accurate metronome")]
struct Cli {
    /// Engine configuration (RON). Defaults to ./clicktrack.ron when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tempo in BPM
    #[arg(short, long, default_value_t = 120)]
    tempo: u32,

    /// Beats per bar
    #[arg(short, long, default_value_t = 4)]
    beats: usize,

    /// Play this many bars, then exit
    #[arg(long)]
    bars: Option<u32>,

    /// Render the bars to a WAV file instead of playing them
    #[arg(short, long, requires = "bars")]
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    if let Some(path) = &cli.export {
        let bars = cli.bars.context("--export needs --bars")?;
        let bank = load_bank(&config)?;
        let pattern = BeatPattern::new(cli.beats)?;
        export_bars_to_wav(path, bank, config.block_size, cli.tempo, pattern, bars)?;
        return Ok(());
    }

    let output = CpalOutput::new(config.sample_rate, config.block_size)?;
    if output.sample_rate() != config.sample_rate {
        config.adopt_sample_rate(output.sample_rate())?;
        info!(
            "Running at {} Hz with {}-sample blocks",
            config.sample_rate, config.block_size
        );
    }
    let bank = load_bank(&config)?;
    let mut metronome = Metronome::new(config, bank, output, cli.tempo, cli.beats)?;

    match cli.bars {
        Some(bars) => play_bars(&mut metronome, bars),
        None => interactive(&mut metronome),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => Ok(EngineConfig::load_from_file(path)?),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            info!("Using {}", DEFAULT_CONFIG_FILE);
            Ok(EngineConfig::load_from_file(DEFAULT_CONFIG_FILE)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn load_bank(config: &EngineConfig) -> Result<Arc<SampleBank>> {
    let bank = SampleBank::from_files(
        &config.lo_click_path,
        &config.hi_click_path,
        config.sample_rate,
    )
    .context("loading click samples")?;
    Ok(Arc::new(bank))
}

fn play_bars<O: AudioOutput>(metronome: &mut Metronome<O>, bars: u32) -> Result<()> {
    metronome.play_for_bars(bars)?;

    let mut shown = 0;
    while metronome.is_running() {
        let beat = metronome.current_beat();
        if beat != shown {
            print_beat(beat, metronome.beats_per_bar());
            shown = beat;
        }
        thread::sleep(POLL_INTERVAL);
    }
    println!();

    if let Some(fault) = metronome.take_fault() {
        bail!(fault);
    }
    metronome.stop();
    Ok(())
}

fn print_beat(beat: usize, beats_per_bar: usize) {
    let marks: String = (1..=beats_per_bar)
        .map(|b| if b == beat { '●' } else { '·' })
        .collect();
    print!("\r{}", marks);
    let _ = io::stdout().flush();
}

#[derive(Debug, PartialEq)]
enum UserCommand {
    Tempo(u32),
    MoreBeats,
    FewerBeats,
    Assign(usize, ClickSound),
    Toggle,
    Status,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<UserCommand> {
    let mut words = line.split_whitespace();
    let command = match words.next()? {
        "t" | "tempo" => UserCommand::Tempo(words.next()?.parse().ok()?),
        "+" => UserCommand::MoreBeats,
        "-" => UserCommand::FewerBeats,
        "a" | "assign" => {
            let beat = words.next()?.parse().ok()?;
            let sound = ClickSound::from_name(words.next()?)?;
            UserCommand::Assign(beat, sound)
        }
        "s" | "start" | "stop" => UserCommand::Toggle,
        "b" | "beat" => UserCommand::Status,
        "h" | "help" | "?" => UserCommand::Help,
        "q" | "quit" => UserCommand::Quit,
        _ => return None,
    };
    if words.next().is_some() {
        return None;
    }
    Some(command)
}

const HELP: &str = "\
  t <bpm>                  set tempo
  + / -                    one beat more / fewer per bar
  a <beat> <silence|lo|hi> set the sound of a beat
  s                        start / stop
  b                        show status
  q                        quit";

fn interactive<O: AudioOutput>(metronome: &mut Metronome<O>) -> Result<()> {
    metronome.start()?;
    println!("{}", HELP);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let Some(command) = parse_command(&line) else {
            warn!("Unrecognised command: {}", line.trim());
            continue;
        };

        let result = match command {
            UserCommand::Tempo(bpm) => metronome.request_tempo(bpm),
            UserCommand::MoreBeats => metronome.increase_beats_per_bar().map(|_| ()),
            UserCommand::FewerBeats => metronome.decrease_beats_per_bar().map(|_| ()),
            UserCommand::Assign(beat, sound) => metronome.assign_beat_sound(beat, sound),
            UserCommand::Toggle if metronome.is_running() => {
                metronome.stop();
                Ok(())
            }
            UserCommand::Toggle => metronome.start(),
            UserCommand::Status => Ok(()),
            UserCommand::Help => {
                println!("{}", HELP);
                Ok(())
            }
            UserCommand::Quit => break,
        };
        if let Err(e) = result {
            println!("error: {}", e);
        }

        // A fault ends the session; the user may start again with `s`
        if let Some(fault) = metronome.take_fault() {
            println!("playback stopped: {}", fault);
        }

        println!(
            "{} | {} BPM | {}/bar | beat {} | {:?}",
            if metronome.is_running() { "running" } else { "stopped" },
            metronome.tempo(),
            metronome.beats_per_bar(),
            metronome.current_beat(),
            metronome.pattern().sounds()
        );
    }

    metronome.stop();
    Ok(())
}
