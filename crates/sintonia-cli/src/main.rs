//! The sintonia synthesizer binary.

use std::cell::RefCell;
use std::rc::Rc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sintonia_cli::engine::Engine;
use sintonia_cli::setup;
use sintonia_control::KeylabEssential;
use sintonia_effects::Flanger;
use sintonia_io::{AudioOutput, Error, MidiOutput};

/// A polyphonic MIDI synthesizer.
#[derive(Parser)]
#[command(name = "sintonia", version, about)]
struct Cli {
    /// Client name registered with the MIDI and audio systems
    #[arg(long, default_value = "sintonia")]
    client_name: String,

    /// Audio output device, matched by name substring (default device
    /// otherwise)
    #[arg(long)]
    audio_device: Option<String>,

    /// Tempo in beats per minute
    #[arg(long, default_value_t = 120.0)]
    tempo: f64,

    /// Beats per measure
    #[arg(long, default_value_t = 4)]
    meter: u32,

    /// Master output volume, 0 to 1
    #[arg(long, default_value_t = 1.0)]
    master_volume: f64,

    /// Delay time of the left tap in seconds
    #[arg(long, default_value_t = 0.245)]
    delay_time: f64,

    /// Delay mix ratio, 0 disables the delay
    #[arg(long, default_value_t = 0.0)]
    delay_ratio: f64,

    /// Delay feedback ratio
    #[arg(long, default_value_t = 0.0)]
    feedback_ratio: f64,

    /// Engage the stereo flanger
    #[arg(long)]
    flanger: bool,

    /// Engage a ladder filter on the mix at this cutoff in Hz
    #[arg(long)]
    ladder_cutoff: Option<f64>,

    /// Resonance of the ladder filter, 0 to 1
    #[arg(long, default_value_t = 0.0)]
    ladder_resonance: f64,

    /// Start the arpeggiator immediately
    #[arg(long)]
    arpeggio: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    let mut engine = Engine::new();
    engine.clock.set_tempo_bpm(cli.tempo);
    engine.clock.set_meter(cli.meter);
    engine.mixer.master_volume.set(cli.master_volume);
    engine.delay.delay_time.set(cli.delay_time);
    engine.delay.delay_ratio.set(cli.delay_ratio);
    engine.delay.feedback_ratio.set(cli.feedback_ratio);
    if cli.flanger {
        engine.flanger = Some(Flanger::new());
    }
    if let Some(cutoff) = cli.ladder_cutoff {
        engine.mixer.engage_ladder(cutoff, cli.ladder_resonance);
    }

    // Driver open failures are fatal; everything after this point only
    // logs and drops.
    engine.midi.connect(&cli.client_name)?;
    let midi_out = Rc::new(RefCell::new(MidiOutput::new()));
    let ports = midi_out.borrow_mut().connect(&cli.client_name)?;

    // The KeyLab listens on output port 1 when present
    if ports > 1 {
        let keylab = KeylabEssential::new(&mut engine.midi, &engine.ui, midi_out.clone(), 1);
        engine.attach_keylab(keylab.clone());
        let arpeggiator = setup::install_standard_rig(&mut engine, Some(&keylab));
        arpeggiator.borrow_mut().run(cli.arpeggio);
    } else {
        let arpeggiator = setup::install_standard_rig(&mut engine, None);
        arpeggiator.borrow_mut().run(cli.arpeggio);
    }

    let mut audio = AudioOutput::new();
    audio.open(cli.audio_device.as_deref())?;

    tracing::info!(tempo = cli.tempo, "synthesizer running");
    match engine.run(&audio) {
        // The device went away: a regular way to stop
        Err(Error::OutputClosed) => Ok(()),
        other => Ok(other?),
    }
}
