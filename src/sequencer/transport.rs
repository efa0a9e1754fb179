// Transport - the metronome's public control surface
//
// The control side keeps a validated mirror of tempo and beat pattern. Starting
// builds a fresh scheduler from the mirror and hands it, prefilled, to the audio
// output; from then on every mutation is validated here, sent over the command
// channel and applied by the real-time side at its next block boundary.

use std::sync::Arc;

use log::{debug, error, info, warn};
use ringbuf::traits::Producer;

use super::pattern::BeatPattern;
use super::scheduler::ClickScheduler;
use super::tempo::TempoController;
use crate::audio::callback::BlockRenderer;
use crate::audio::output::AudioOutput;
use crate::audio::status::{SharedPlaybackState, TransportState};
use crate::config::EngineConfig;
use crate::error::{MetronomeError, MetronomeResult};
use crate::messaging::{Command, CommandProducer, create_command_channel};
use crate::sampler::{ClickSound, SampleBank};

pub struct Metronome<O: AudioOutput> {
    config: EngineConfig,
    bank: Arc<SampleBank>,
    output: O,
    shared: Arc<SharedPlaybackState>,
    commands: Option<CommandProducer>,

    tempo: u32,
    pattern: BeatPattern,
    bar_limit: Option<u32>,
}

impl<O: AudioOutput> Metronome<O> {
    /// Fails without creating anything if any argument is out of range
    pub fn new(
        config: EngineConfig,
        bank: Arc<SampleBank>,
        output: O,
        tempo: u32,
        beats_per_bar: usize,
    ) -> MetronomeResult<Self> {
        config.validate()?;
        let tempo = TempoController::validate(tempo)?;
        let pattern = BeatPattern::new(beats_per_bar)?;

        if bank.sample_rate() != config.sample_rate {
            return Err(MetronomeError::Config(format!(
                "sample bank is at {} Hz but the engine runs at {} Hz",
                bank.sample_rate(),
                config.sample_rate
            )));
        }
        bank.check_block_size(config.block_size)?;

        Ok(Self {
            config,
            bank,
            output,
            shared: SharedPlaybackState::new(),
            commands: None,
            tempo,
            pattern,
            bar_limit: None,
        })
    }

    /// Start open-ended playback. No-op when already running.
    pub fn start(&mut self) -> MetronomeResult<()> {
        self.launch(None)
    }

    /// Play `bars` bars at the current beats per bar, then stop by itself.
    /// While running, the limit is installed on the live session instead.
    pub fn play_for_bars(&mut self, bars: u32) -> MetronomeResult<()> {
        if bars == 0 {
            return Err(MetronomeError::InvalidBarCount);
        }

        if self.is_running() {
            self.send(Command::LimitBars(bars))?;
            self.bar_limit = Some(bars);
            info!("Stopping after {} more bar(s)", bars);
            return Ok(());
        }
        self.launch(Some(bars))
    }

    fn launch(&mut self, bars: Option<u32>) -> MetronomeResult<()> {
        if self.is_running() {
            debug!("start() while running ignored");
            return Ok(());
        }

        // A session that ended on its own still holds its stream
        self.output.abort();
        self.commands = None;
        self.shared.reset();
        self.shared.set_state(TransportState::Starting);

        match self.open_session(bars) {
            Ok(producer) => {
                self.commands = Some(producer);
                self.bar_limit = bars;
                match bars {
                    Some(n) => info!(
                        "Metronome started: {} BPM, {} beats per bar, {} bar(s)",
                        self.tempo,
                        self.pattern.beats_per_bar(),
                        n
                    ),
                    None => info!(
                        "Metronome started: {} BPM, {} beats per bar",
                        self.tempo,
                        self.pattern.beats_per_bar()
                    ),
                }
                Ok(())
            }
            Err(e) => {
                self.output.abort();
                self.shared.reset();
                error!("Failed to start metronome: {}", e);
                Err(e)
            }
        }
    }

    fn open_session(&mut self, bars: Option<u32>) -> MetronomeResult<CommandProducer> {
        let mut scheduler = ClickScheduler::new(
            Arc::clone(&self.bank),
            self.config.block_size,
            self.tempo,
            self.pattern,
        )?;
        if let Some(bars) = bars {
            scheduler.limit_bars(bars)?;
        }

        let (producer, consumer) = create_command_channel(self.config.command_capacity);
        let mut renderer = BlockRenderer::new(
            scheduler,
            self.config.queue_capacity,
            consumer,
            Arc::clone(&self.shared),
        );
        let prefilled = renderer.prefill();
        debug!(
            "Prefilled {}/{} block(s) ({:?} window)",
            prefilled,
            self.config.prefill_blocks(),
            self.config.prefill_window()
        );

        self.shared.set_state(TransportState::Running);
        self.output.open(renderer)?;
        Ok(producer)
    }

    /// Halt output, discard queued audio and reset all timing. Safe to call at any time.
    pub fn stop(&mut self) {
        let was_active = self.commands.is_some();

        self.output.abort();
        self.commands = None;
        self.bar_limit = None;
        self.shared.reset();

        if was_active {
            info!("Metronome stopped");
        }
    }

    fn send(&mut self, command: Command) -> MetronomeResult<()> {
        let running = self.is_running();
        if let Some(producer) = self.commands.as_mut()
            && running
        {
            producer.try_push(command).map_err(|_| {
                warn!("Command queue full, dropped {:?}", command);
                MetronomeError::CommandQueueFull
            })?;
        }
        Ok(())
    }

    /// Immediate when stopped; while running the change waits for the next beat boundary
    pub fn request_tempo(&mut self, bpm: u32) -> MetronomeResult<()> {
        let bpm = TempoController::validate(bpm).inspect_err(|e| warn!("{}", e))?;
        self.send(Command::SetTempo(bpm))?;
        if self.is_running() {
            debug!("Tempo {} BPM staged for the next beat", bpm);
        }
        self.tempo = bpm;
        Ok(())
    }

    /// Returns the new beats per bar (unchanged when already at the maximum)
    pub fn increase_beats_per_bar(&mut self) -> MetronomeResult<usize> {
        let mut next = self.pattern;
        if next.increase() {
            self.send(Command::IncreaseBeatsPerBar)?;
            self.pattern = next;
            debug!("Beats per bar: {}", next.beats_per_bar());
        }
        Ok(self.pattern.beats_per_bar())
    }

    /// Returns the new beats per bar (unchanged when already at one)
    pub fn decrease_beats_per_bar(&mut self) -> MetronomeResult<usize> {
        let mut next = self.pattern;
        if next.decrease() {
            self.send(Command::DecreaseBeatsPerBar)?;
            self.pattern = next;
            debug!("Beats per bar: {}", next.beats_per_bar());
        }
        Ok(self.pattern.beats_per_bar())
    }

    pub fn assign_beat_sound(&mut self, beat: usize, sound: ClickSound) -> MetronomeResult<()> {
        let mut next = self.pattern;
        next.assign(beat, sound).inspect_err(|e| warn!("{}", e))?;
        self.send(Command::AssignBeatSound { beat, sound })?;
        self.pattern = next;
        debug!("Beat {} now plays {:?}", beat, sound);
        Ok(())
    }

    /// Beat of the block the device is currently playing (0 when stopped)
    pub fn current_beat(&self) -> usize {
        self.shared.displayed_beat()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn state(&self) -> TransportState {
        self.shared.state()
    }

    /// Most recently accepted tempo
    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn beats_per_bar(&self) -> usize {
        self.pattern.beats_per_bar()
    }

    pub fn pattern(&self) -> &BeatPattern {
        &self.pattern
    }

    pub fn bar_limit(&self) -> Option<u32> {
        self.bar_limit
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Take the fault that ended the last session, if any
    pub fn take_fault(&self) -> Option<MetronomeError> {
        self.shared
            .take_fault()
            .inspect(|e| error!("Playback fault: {}", e))
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}

impl<O: AudioOutput> Drop for Metronome<O> {
    fn drop(&mut self) {
        self.stop();
    }
}
