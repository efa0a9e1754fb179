// Integration test: transport lifecycle
//
// Runs a Metronome against OfflineOutput and pulls audio by hand, the way a
// device callback would, to check start/stop semantics, displayed-beat latency,
// live control changes and bar-limited playback.

use clicktrack::audio::RenderOutcome;
use clicktrack::{
    ClickSound, EngineConfig, Metronome, MetronomeError, OfflineOutput, SampleBank,
    TransportState,
};
use std::sync::Arc;

const BLOCK: usize = 512;

fn metronome_with(config: EngineConfig, tempo: u32, beats: usize) -> Metronome<OfflineOutput> {
    let bank = Arc::new(
        SampleBank::new(config.sample_rate, vec![0.5; 100], vec![1.0; 100]).unwrap(),
    );
    Metronome::new(config, bank, OfflineOutput::new(), tempo, beats).unwrap()
}

fn metronome(tempo: u32, beats: usize) -> Metronome<OfflineOutput> {
    metronome_with(EngineConfig::default(), tempo, beats)
}

fn pull_blocks(output: &OfflineOutput, blocks: usize) -> (Vec<f32>, RenderOutcome) {
    let mut stream = Vec::new();
    let mut outcome = RenderOutcome::Continue;
    for _ in 0..blocks {
        let (block, result) = output.pull(BLOCK).expect("stream is open");
        stream.extend_from_slice(&block);
        outcome = result;
        if outcome != RenderOutcome::Continue {
            break;
        }
    }
    (stream, outcome)
}

fn onsets(stream: &[f32]) -> Vec<usize> {
    (0..stream.len())
        .filter(|&i| stream[i] != 0.0 && (i == 0 || stream[i - 1] == 0.0))
        .collect()
}

#[test]
fn test_start_plays_from_beat_one() {
    let mut m = metronome(150, 4);
    let output = m.output().clone();
    assert_eq!(m.state(), TransportState::Stopped);
    assert_eq!(m.current_beat(), 0);

    m.start().unwrap();
    assert!(m.is_running());

    let (stream, outcome) = pull_blocks(&output, 13);
    assert_eq!(outcome, RenderOutcome::Continue);
    assert_eq!(onsets(&stream), vec![0, 6400]);
    assert_eq!(stream[0], 1.0);
    assert_eq!(stream[6400], 0.5);
    assert_eq!(m.current_beat(), 2);
}

#[test]
fn test_displayed_beat_lags_production_by_queue_depth() {
    let mut m = metronome(150, 4);
    let output = m.output().clone();
    m.start().unwrap();

    // Prefill leaves nine blocks queued; each pull produces one more
    assert_eq!(output.with_renderer(|r| r.queued_blocks()), Some(9));

    pull_blocks(&output, 4);
    let produced = output.with_renderer(|r| r.scheduler().current_beat()).unwrap();
    assert_eq!(produced, 2);
    assert_eq!(m.current_beat(), 1);

    pull_blocks(&output, 9);
    assert_eq!(m.current_beat(), 2);
}

#[test]
fn test_stop_and_restart_resets_timing() {
    let mut m = metronome(140, 3);
    let output = m.output().clone();

    m.start().unwrap();
    let (first, _) = pull_blocks(&output, 200);

    m.stop();
    assert!(!m.is_running());
    assert!(!output.is_open());
    assert_eq!(m.current_beat(), 0);
    assert!(output.pull(BLOCK).is_none());

    m.start().unwrap();
    let state = output
        .with_renderer(|r| *r.scheduler().state())
        .unwrap();
    assert_eq!(state.total_samples_delivered, 9 * BLOCK as u64);
    let (second, _) = pull_blocks(&output, 200);
    assert_eq!(first, second);
}

#[test]
fn test_start_and_stop_in_target_state_are_no_ops() {
    let mut m = metronome(120, 4);
    let output = m.output().clone();

    m.stop();
    assert_eq!(m.state(), TransportState::Stopped);

    m.start().unwrap();
    pull_blocks(&output, 3);
    m.start().unwrap();
    let delivered = output
        .with_renderer(|r| r.scheduler().state().total_samples_delivered)
        .unwrap();
    assert_eq!(delivered, 12 * BLOCK as u64);
}

#[test]
fn test_tempo_when_stopped_applies_on_start() {
    let mut m = metronome(120, 4);
    let output = m.output().clone();
    m.request_tempo(150).unwrap();
    assert_eq!(m.tempo(), 150);

    m.start().unwrap();
    let interval = output
        .with_renderer(|r| r.scheduler().timing().interval)
        .unwrap();
    assert_eq!(interval, 6400);
}

#[test]
fn test_tempo_when_running_waits_for_next_beat() {
    let mut m = metronome(150, 4);
    let output = m.output().clone();
    m.start().unwrap();

    // Prefill produced blocks 0..=8; block 0's tail is long delivered
    m.request_tempo(75).unwrap();
    assert_eq!(m.tempo(), 75);

    // Block 9 applies the command; nothing is in flight so it stays staged
    pull_blocks(&output, 1);
    let (tempo, pending) = output
        .with_renderer(|r| (r.scheduler().tempo(), r.scheduler().pending_tempo()))
        .unwrap();
    assert_eq!((tempo, pending), (150, Some(75)));

    // Beat 2 starts in block 12 and its tail is block 13
    pull_blocks(&output, 4);
    let (tempo, pending) = output
        .with_renderer(|r| (r.scheduler().tempo(), r.scheduler().pending_tempo()))
        .unwrap();
    assert_eq!((tempo, pending), (75, None));
}

#[test]
fn test_out_of_range_tempo_rejected_while_running() {
    let mut m = metronome(100, 4);
    m.start().unwrap();
    assert!(matches!(
        m.request_tempo(351),
        Err(MetronomeError::TempoOutOfRange { value: 351, .. })
    ));
    assert_eq!(m.tempo(), 100);
    assert!(m.is_running());
}

#[test]
fn test_pattern_changes_reach_running_scheduler() {
    let mut m = metronome(300, 4);
    let output = m.output().clone();
    m.start().unwrap();

    assert_eq!(m.increase_beats_per_bar(), Ok(5));
    m.assign_beat_sound(5, ClickSound::Hi).unwrap();
    m.assign_beat_sound(1, ClickSound::Silence).unwrap();
    assert!(m.assign_beat_sound(6, ClickSound::Lo).is_err());

    pull_blocks(&output, 1);
    let sounds = output
        .with_renderer(|r| r.scheduler().pattern().sounds().to_vec())
        .unwrap();
    assert_eq!(sounds, m.pattern().sounds());
    assert_eq!(
        sounds,
        vec![
            ClickSound::Silence,
            ClickSound::Lo,
            ClickSound::Lo,
            ClickSound::Lo,
            ClickSound::Hi
        ]
    );
}

#[test]
fn test_decrease_past_current_beat_restarts_bar() {
    let mut m = metronome(300, 4);
    let output = m.output().clone();
    m.start().unwrap();

    // 300 BPM: 3200 samples per beat, beat 4 starts at 9600 (block 18)
    while output
        .with_renderer(|r| r.scheduler().current_beat())
        .unwrap()
        != 4
    {
        pull_blocks(&output, 1);
    }

    assert_eq!(m.decrease_beats_per_bar(), Ok(3));
    pull_blocks(&output, 1);
    let beat = output
        .with_renderer(|r| r.scheduler().current_beat())
        .unwrap();
    assert_eq!(beat, 1);
}

#[test]
fn test_play_for_two_bars_of_four() {
    let mut m = metronome(200, 4);
    let output = m.output().clone();

    m.play_for_bars(2).unwrap();
    assert_eq!(m.bar_limit(), Some(2));

    let (stream, outcome) = pull_blocks(&output, 10_000);
    assert_eq!(outcome, RenderOutcome::Finished);
    assert_eq!(onsets(&stream).len(), 8);

    assert!(!m.is_running());
    assert_eq!(m.current_beat(), 0);
    assert_eq!(m.take_fault(), None);

    // It can be started again after ending by itself
    m.start().unwrap();
    assert!(m.is_running());
    let (stream, _) = pull_blocks(&output, 1);
    assert_eq!(stream[0], 1.0);
}

#[test]
fn test_play_for_bars_while_running_limits_live_session() {
    let mut m = metronome(300, 3);
    let output = m.output().clone();
    m.start().unwrap();
    pull_blocks(&output, 50);

    m.play_for_bars(1).unwrap();
    pull_blocks(&output, 1);
    let limit = output
        .with_renderer(|r| r.scheduler().clicks_remaining())
        .unwrap();
    assert_eq!(limit, Some(3));

    let (_, outcome) = pull_blocks(&output, 10_000);
    assert_eq!(outcome, RenderOutcome::Finished);
    assert!(!m.is_running());
}

#[test]
fn test_zero_bars_rejected() {
    let mut m = metronome(120, 4);
    assert_eq!(m.play_for_bars(0), Err(MetronomeError::InvalidBarCount));
    assert!(!m.is_running());
}

#[test]
fn test_full_command_channel_reported() {
    let config = EngineConfig {
        command_capacity: 1,
        ..EngineConfig::default()
    };
    let mut m = metronome_with(config, 120, 4);
    m.start().unwrap();

    m.request_tempo(100).unwrap();
    assert_eq!(m.request_tempo(110), Err(MetronomeError::CommandQueueFull));
    assert_eq!(m.tempo(), 100);

    // Draining the channel makes room again
    let output = m.output().clone();
    pull_blocks(&output, 1);
    m.request_tempo(110).unwrap();
    assert_eq!(m.tempo(), 110);
}
