//! The synthesis engine: one object owning the whole per-frame loop.
//!
//! Everything the loop touches is single-threaded state owned here: the
//! MIDI adapter queues are the only seam to the driver threads, and the
//! finished frame handed to the audio output is the only thing leaving.
//!
//! Per frame: drain the registered-action FIFOs, pump the sustain filter
//! and route what comes out (arpeggiators observe everything, notes reach
//! the voice map through the channel assignment, SysEx drives channel
//! selection), advance the clock, render and mix the voices, run the
//! effects, emit the frame.

use std::cell::RefCell;
use std::rc::Rc;

use sintonia_control::{ChannelAssignment, KeylabEssential, UiHandle, UserInterface};
use sintonia_core::audio::{Frame, silence};
use sintonia_core::clock::{Clock, ClockEvent};
use sintonia_core::lfo::Lfo;
use sintonia_core::midi::Message;
use sintonia_core::param::Param;
use sintonia_effects::{Delay, Flanger};
use sintonia_io::{AudioOutput, MidiInput, PortIndex, Result};
use sintonia_synth::{Arpeggiator, Mixer, Sustain, VoiceMap};

/// Number of MIDI input ports the engine watches.
const MIDI_PORTS: usize = 2;

/// Port the note stream is read from.
const NOTE_PORT: PortIndex = 0;

/// Arturia SysEx body reporting a surface button: `02 00 00 <button>
/// <state>`.
const BUTTON_REPORT: [u8; 3] = [0x02, 0x00, 0x00];
/// Button id selecting the next part (channel).
const PART_NEXT_BUTTON: u8 = 0x1a;
/// Button id selecting the previous part (channel).
const PART_PREVIOUS_BUTTON: u8 = 0x1b;

/// Master-section parameters, bindable to surface controls.
pub struct MasterParams {
    /// Low-pass smoothing factor in [0, 1]; 1 is wide open.
    pub cutoff_smoothing: Param,
    /// Resonance filter frequency in Hz.
    pub resonance_frequency: Param,
    /// Resonance amount in [0, 1]; 0 leaves the filter transparent.
    pub resonance_amount: Param,
}

impl Default for MasterParams {
    fn default() -> Self {
        Self {
            cutoff_smoothing: Param::new(1.0),
            resonance_frequency: Param::new(1000.0),
            resonance_amount: Param::new(0.0),
        }
    }
}

/// The synthesis engine.
pub struct Engine {
    pub midi: MidiInput,
    pub clock: Clock,
    pub voices: VoiceMap,
    pub mixer: Mixer,
    pub master: MasterParams,
    pub channels: ChannelAssignment,
    pub sustain: Sustain,
    pub delay: Delay,
    pub flanger: Option<Flanger>,
    pub ui: UiHandle,
    arpeggiators: Vec<Rc<RefCell<Arpeggiator>>>,
    lfo: Rc<RefCell<Lfo>>,
    /// Range the LFO scales the post-filter level into.
    lfo_range: (f64, f64),
    /// Resonance settings last pushed into the mixer; coefficients are
    /// recomputed only when a parameter actually moves.
    applied_resonance: Option<(f64, f64)>,
    keylab: Option<Rc<RefCell<KeylabEssential>>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with empty channel map, no effects engaged and the clock
    /// stopped.
    pub fn new() -> Self {
        let mut clock = Clock::new();
        let lfo = Rc::new(RefCell::new(Lfo::new()));
        let ticker = lfo.clone();
        clock.subscribe(ClockEvent::FrameClock, move |_| ticker.borrow_mut().tick_frame());

        Self {
            midi: MidiInput::new(MIDI_PORTS),
            clock,
            voices: VoiceMap::new(),
            mixer: Mixer::new(),
            master: MasterParams::default(),
            channels: ChannelAssignment::new(),
            sustain: Sustain::new(),
            delay: Delay::new(),
            flanger: None,
            ui: UserInterface::shared(),
            arpeggiators: Vec::new(),
            lfo,
            lfo_range: (1.0, 1.0),
            applied_resonance: None,
            keylab: None,
        }
    }

    /// Register an arpeggiator: it observes the note stream and follows
    /// the MIDI clock.
    pub fn add_arpeggiator(&mut self, arpeggiator: Arpeggiator) -> Rc<RefCell<Arpeggiator>> {
        let arpeggiator = Rc::new(RefCell::new(arpeggiator));
        let follower = arpeggiator.clone();
        self.clock.subscribe(ClockEvent::MidiClock, move |tick| {
            follower.borrow_mut().on_midi_clock(tick);
        });
        self.arpeggiators.push(arpeggiator.clone());
        arpeggiator
    }

    /// Run the mixer LFO as a tremolo between `low` and `high`.
    pub fn set_tremolo(&mut self, frequency: f64, low: f64, high: f64) {
        self.lfo_range = (low, high);
        self.lfo.borrow_mut().set_frequency(frequency).run();
    }

    /// Launch an automation routine paced by the MIDI clock.
    pub fn add_automation(
        &mut self,
        routine: impl FnOnce(sintonia_synth::AutomateContext) + Send + 'static,
    ) {
        let automate = sintonia_synth::Automate::new(routine);
        self.clock
            .subscribe(ClockEvent::MidiClock, move |_| automate.midi_clock());
    }

    /// Attach the control surface: metro light, display refresh and
    /// channel-selection SysEx handling.
    pub fn attach_keylab(&mut self, keylab: Rc<RefCell<KeylabEssential>>) {
        KeylabEssential::follow_clock(&keylab, &mut self.clock);
        self.keylab = Some(keylab);
    }

    /// Select the next assigned channel and refocus surface and display.
    pub fn select_next_channel(&mut self) {
        self.channels.select_next();
        self.focus_selection();
    }

    /// Select the previous assigned channel and refocus surface and
    /// display.
    pub fn select_previous_channel(&mut self) {
        self.channels.select_previous();
        self.focus_selection();
    }

    fn focus_selection(&mut self) {
        self.channels.apply_selection(&mut self.ui.borrow_mut());
        if let Some(preset) = self.channels.selected_preset() {
            tracing::info!(preset = %preset.name, "channel selected");
            if let Some(keylab) = &self.keylab {
                keylab.borrow_mut().display(&preset.name);
            }
        }
    }

    /// Channel-selection buttons arrive as surface SysEx reports.
    fn handle_sysex(&mut self, bytes: &[u8]) {
        // F0 <manufacturer…> <dev> <sub> 02 00 00 <button> <state> F7
        let Some(body) = bytes.strip_prefix(&[0xf0, 0x00, 0x20, 0x6b, 0x7f, 0x42][..]) else {
            return;
        };
        let Some(report) = body.strip_prefix(&BUTTON_REPORT[..]) else {
            return;
        };
        if let [button, state, 0xf7] = report {
            if *state == 0 {
                return;
            }
            match *button {
                PART_NEXT_BUTTON => self.select_next_channel(),
                PART_PREVIOUS_BUTTON => self.select_previous_channel(),
                _ => {}
            }
        }
    }

    fn route(&mut self, message: &Message) {
        for arpeggiator in &self.arpeggiators {
            arpeggiator.borrow_mut().midi(message);
        }
        match message {
            Message::NoteOn(on) => match self.channels.get(on.channel as i32) {
                Some(preset) => self.voices.start_note(&preset.params, on),
                None => {
                    tracing::warn!(
                        channel = on.channel as i32,
                        note = on.note as i32,
                        "note-on to unassigned channel"
                    );
                }
            },
            Message::NoteOff(off) => self.voices.stop_note(off),
            Message::SysEx(bytes) => self.handle_sysex(bytes),
            // Control changes already fired their registered actions
            _ => {}
        }
    }

    /// Produce the next audio frame.
    pub fn process_frame(&mut self) -> Frame {
        self.midi.dispatch_registered_actions();

        let mut message = Message::None;
        while self.sustain.process(&self.midi, NOTE_PORT, &mut message) {
            let message = std::mem::take(&mut message);
            self.route(&message);
        }

        self.clock.tick_frame_clock();

        self.mixer.lfo_level = self.lfo.borrow().out_in(self.lfo_range.0, self.lfo_range.1);
        self.mixer.set_low_pass_smoothing(self.master.cutoff_smoothing.get());
        // The resonance stage stays transparent until first engaged;
        // afterwards any parameter move recomputes the coefficients.
        let resonance = (
            self.master.resonance_frequency.get(),
            self.master.resonance_amount.get(),
        );
        let engaged = self.applied_resonance.is_some() || resonance.1 > 0.0;
        if engaged && self.applied_resonance != Some(resonance) {
            self.mixer.set_resonance(resonance.0, resonance.1);
            self.applied_resonance = Some(resonance);
        }

        let mut frame = silence();
        let voice_count = self.voices.render(&mut frame);
        self.mixer.process(&mut frame, voice_count);
        if let Some(flanger) = &mut self.flanger {
            flanger.process(&mut frame);
        }
        self.delay.process(&mut frame);
        frame
    }

    /// The forever loop: render frames into the audio output until the
    /// stream goes away.
    pub fn run(&mut self, audio: &AudioOutput) -> Result<()> {
        loop {
            let frame = self.process_frame();
            audio.write(frame)?;
        }
    }
}
