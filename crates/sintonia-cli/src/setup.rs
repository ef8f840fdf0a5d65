//! The standard rig: wheels, channel presets, groups and surface
//! bindings.
//!
//! Channel 0 carries the played instrument; channels 1 to 3 carry the
//! sounds the default arpeggiator engine emits on; channel 9 carries the
//! noise drum. Each instrument gets a parameter group layered on the
//! interface, and when a KeyLab surface is present its sliders and knobs
//! are bound into every instrument group (the layer stack decides which
//! instrument actually receives a gesture).

use std::cell::RefCell;
use std::rc::Rc;

use sintonia_control::{ChannelPreset, Group, GroupHandle, Item, KeylabEssential};
use sintonia_core::envelope::EnvelopeParams;
use sintonia_synth::{
    Arpeggiator, DcoEnvelopeParams, DcoParams, NoiseParams, SoundParams,
    register_modulation_wheel, register_pitch_bend,
};

use crate::engine::Engine;

/// Range of the envelope-time sliders in seconds.
const TIME_RANGE_SECONDS: f64 = 10.0;

/// One instrument flavor of the standard rig.
struct Instrument {
    name: &'static str,
    channel: i32,
    square: f64,
    triangle: f64,
    /// Zero hands the duty cycle to the modulation wheel.
    pwm: f64,
    adsr: (f64, f64, f64, f64),
}

const INSTRUMENTS: [Instrument; 4] = [
    Instrument {
        name: "lead",
        channel: 0,
        square: 1.0,
        triangle: 0.4,
        pwm: 0.5,
        adsr: (0.01, 0.15, 0.7, 0.3),
    },
    Instrument {
        name: "bass",
        channel: 1,
        square: 0.6,
        triangle: 1.0,
        pwm: 0.5,
        adsr: (0.005, 0.08, 0.9, 0.12),
    },
    Instrument {
        name: "stab",
        channel: 2,
        square: 1.0,
        triangle: 0.0,
        pwm: 0.0,
        adsr: (0.0, 0.2, 0.5, 0.2),
    },
    Instrument {
        name: "pluck",
        channel: 3,
        square: 0.8,
        triangle: 0.8,
        pwm: 0.3,
        adsr: (0.0, 0.1, 0.2, 0.1),
    },
];

/// Channel of the noise drum.
const DRUM_CHANNEL: i32 = 9;

/// Build the standard rig onto an engine.
///
/// Returns the arpeggiator so the caller can start it or hand it to a
/// transport control.
pub fn install_standard_rig(
    engine: &mut Engine,
    keylab: Option<&Rc<RefCell<KeylabEssential>>>,
) -> Rc<RefCell<Arpeggiator>> {
    let pitch_bend = register_pitch_bend(&mut engine.midi, 0, 0);
    let modulation = register_modulation_wheel(&mut engine.midi, 0, 0);

    // The master section sits at the bottom of the layer stack
    let master = master_group(engine, keylab);
    engine.ui.borrow_mut().add_layer(master);

    for instrument in &INSTRUMENTS {
        let dco = DcoParams::new(pitch_bend.clone(), modulation.clone());
        dco.square_volume.set(instrument.square);
        dco.square_pwm.set(instrument.pwm);
        dco.triangle_volume.set(instrument.triangle);
        let params = DcoEnvelopeParams {
            dco,
            envelope: EnvelopeParams::new(
                instrument.adsr.0,
                instrument.adsr.1,
                instrument.adsr.2,
                instrument.adsr.3,
            ),
        };

        let group = instrument_group(instrument, &params, keylab);
        engine.ui.borrow_mut().add_layer(group.clone());
        engine.channels.assign(
            instrument.channel,
            ChannelPreset {
                name: instrument.name.into(),
                params: SoundParams::DcoEnvelope(params),
                group,
            },
        );
    }

    // The noise drum has no bound surface controls, only a volume item
    let drum_params = NoiseParams::default();
    let drum_group = Group::new("drum", Some(DRUM_CHANNEL as i8));
    engine.ui.borrow_mut().add_layer(drum_group.clone());
    engine.channels.assign(
        DRUM_CHANNEL,
        ChannelPreset {
            name: "drum".into(),
            params: SoundParams::Noise(drum_params),
            group: drum_group,
        },
    );

    // The arpeggiator feeds on the lower half of the channel-0 keyboard
    let arpeggiator = engine
        .add_arpeggiator(Arpeggiator::with_range(engine.midi.insert_handle(0), 0, 60));

    if let Some(keylab) = keylab {
        let transport = arpeggiator.clone();
        keylab
            .borrow()
            .controls
            .play_pause
            .add_action(move |value| transport.borrow_mut().run(value != 0));
    }

    // Start focused on the lead channel
    engine.select_next_channel();
    arpeggiator
}

/// The master group: mix-chain parameters under the surface knobs.
fn master_group(engine: &Engine, keylab: Option<&Rc<RefCell<KeylabEssential>>>) -> GroupHandle {
    let group = Group::new("master", None);
    if let Some(keylab) = keylab {
        let keylab = keylab.borrow();
        let mut g = group.borrow_mut();
        g.bind(
            &keylab.controls.cutoff_knob,
            Item::level("Cutoff", engine.master.cutoff_smoothing.clone()),
        );
        g.bind(
            &keylab.controls.resonance_knob,
            Item::level("Resonance", engine.master.resonance_amount.clone()),
        );
        g.bind(
            &keylab.controls.top_right_knob,
            Item::level("Volume", engine.mixer.master_volume.clone()),
        );
        g.bind(
            &keylab.controls.param_knobs[0],
            Item::level("Rectifier", engine.mixer.rectification.clone()),
        );
        g.bind(
            &keylab.controls.param_knobs[1],
            Item::time("Delay time", 2.0, engine.delay.delay_time.clone()),
        );
        g.bind(
            &keylab.controls.param_knobs[2],
            Item::level("Delay mix", engine.delay.delay_ratio.clone()),
        );
        g.bind(
            &keylab.controls.param_knobs[3],
            Item::level("Feedback", engine.delay.feedback_ratio.clone()),
        );
    }
    group
}

/// An instrument's group: its envelope under the surface sliders, its
/// oscillator mix under two of the knobs.
fn instrument_group(
    instrument: &Instrument,
    params: &DcoEnvelopeParams,
    keylab: Option<&Rc<RefCell<KeylabEssential>>>,
) -> GroupHandle {
    let group = Group::new(instrument.name, Some(instrument.channel as i8));
    if let Some(keylab) = keylab {
        let keylab = keylab.borrow();
        let mut g = group.borrow_mut();
        g.bind(
            &keylab.controls.attack_slider,
            Item::time("Attack", TIME_RANGE_SECONDS, params.envelope.attack_time.clone()),
        );
        g.bind(
            &keylab.controls.decay_slider,
            Item::time("Decay", TIME_RANGE_SECONDS, params.envelope.decay_time.clone()),
        );
        g.bind(
            &keylab.controls.sustain_slider,
            Item::level("Sustain", params.envelope.sustain_level.clone()),
        );
        g.bind(
            &keylab.controls.release_slider,
            Item::time("Release", TIME_RANGE_SECONDS, params.envelope.release_time.clone()),
        );
        g.bind(
            &keylab.controls.upper_sliders[0],
            Item::level("Square", params.dco.square_volume.clone()),
        );
        g.bind(
            &keylab.controls.upper_sliders[1],
            Item::level("Triangle", params.dco.triangle_volume.clone()),
        );
        g.bind(
            &keylab.controls.upper_sliders[2],
            Item::level("PWM", params.dco.square_pwm.clone()),
        );
        g.bind(
            &keylab.controls.upper_sliders[3],
            Item::level("Detune", params.dco.detune.clone()),
        );
    }
    group
}
