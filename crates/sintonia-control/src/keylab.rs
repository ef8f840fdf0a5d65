//! Arturia KeyLab Essential control surface.
//!
//! Drives the controller over MIDI: SysEx for the LCD display and button
//! lights, and a bank of physical items for the knobs, sliders, buttons
//! and pads. The SysEx ids and command prefixes were gathered from the
//! Arturia forums and the MIDI Control Center's console.
//!
//! The device overwrites its own display when the user touches its local
//! UI, so the last message is re-sent on a ~250 ms cycle.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use sintonia_core::clock::{Clock, ClockEvent, Tick};
use sintonia_core::midi::CLOCKS_PER_QUARTER;
use sintonia_io::{MidiInput, MidiOutput};

use crate::physical::{PhysicalEvent, PhysicalItem, PhysicalKind};
use crate::ui::UiHandle;

/// Arturia's manufacturer SysEx id.
const SYSEX_ID: [u8; 3] = [0x00, 0x20, 0x6b];
/// Broadcast device id.
const DEV_ID: u8 = 0x7f;
const SUB_DEV_ID: u8 = 0x42;
/// Command prefix for LCD display text.
const DISPLAY_COMMAND: [u8; 3] = [0x04, 0x00, 0x60];
/// Command prefix for button lights.
const BUTTON_LIGHT_COMMAND: [u8; 3] = [0x02, 0x00, 0x10];

/// Characters per display line.
const DISPLAY_LINE_CHARS: usize = 16;
/// Lines on the display.
const DISPLAY_LINES: usize = 2;

/// Display refresh period.
const DISPLAY_REFRESH: Duration = Duration::from_millis(250);

/// Button light ids.
///
/// Some entries have `Bis` variants because the firmware answers the same
/// action under several codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Button {
    OctaveMinus = 0x10,
    OctavePlus = 0x11,
    Chord = 0x12,
    Transpose = 0x13,
    MidiChannel = 0x14,
    MapSelect = 0x15,
    CatChar = 0x16,
    Preset = 0x17,
    Backward = 0x18,
    Forward = 0x19,
    Part1Next = 0x1a,
    Part2Prev = 0x1b,
    LiveBank = 0x1c,
    Metro = 0x1d,
    FastForward = 0x1e,
    Record = 0x1f,
    Pad1Blue = 0x20,
    Pad1Green = 0x21,
    Pad1Red = 0x22,
    Pad2Blue = 0x23,
    Pad2Green = 0x24,
    Pad2Red = 0x25,
    Save = 0x3e,
    Punch = 0x3f,
    Undo = 0x57,
    MetroBis = 0x59,
    Loop = 0x5a,
    Rewind = 0x5b,
    Stop = 0x5d,
    PlayPause = 0x5e,
    RecordBis = 0x5f,
}

/// The physical control bank of the surface.
///
/// CC and note numbers are the device's DAW-mode defaults.
pub struct KeylabControls {
    pub cutoff_knob: PhysicalItem,
    pub resonance_knob: PhysicalItem,
    pub lfo_rate_knob: PhysicalItem,
    pub lfo_amount_knob: PhysicalItem,
    pub param_knobs: [PhysicalItem; 4],
    /// The unnamed knob on the top right, unmapped in DAW mode.
    pub top_right_knob: PhysicalItem,
    pub attack_slider: PhysicalItem,
    pub decay_slider: PhysicalItem,
    pub sustain_slider: PhysicalItem,
    pub release_slider: PhysicalItem,
    pub upper_sliders: [PhysicalItem; 4],
    pub play_pause: PhysicalItem,
    pub pads: [PhysicalItem; 2],
}

impl KeylabControls {
    fn new(midi: &mut MidiInput, ui: &UiHandle) -> Self {
        let knob = |midi: &mut MidiInput, cc, name: &str| {
            PhysicalItem::new(midi, ui.clone(), PhysicalKind::Knob, PhysicalEvent::Cc(cc), name)
        };
        let slider = |midi: &mut MidiInput, cc, name: &str| {
            PhysicalItem::new(midi, ui.clone(), PhysicalKind::Slider, PhysicalEvent::Cc(cc), name)
        };
        Self {
            cutoff_knob: knob(midi, 0x4a, "Cutoff"),
            resonance_knob: knob(midi, 0x47, "Resonance"),
            lfo_rate_knob: knob(midi, 0x4c, "LFO rate"),
            lfo_amount_knob: knob(midi, 0x4d, "LFO amount"),
            param_knobs: [
                knob(midi, 0x5d, "Param 1"),
                knob(midi, 0x12, "Param 2"),
                knob(midi, 0x13, "Param 3"),
                knob(midi, 0x10, "Param 4"),
            ],
            top_right_knob: knob(midi, 0x11, "Knob 9"),
            attack_slider: slider(midi, 0x49, "Attack"),
            decay_slider: slider(midi, 0x4b, "Decay"),
            sustain_slider: slider(midi, 0x4f, "Sustain"),
            release_slider: slider(midi, 0x48, "Release"),
            upper_sliders: [
                slider(midi, 0x50, "Slider 5"),
                slider(midi, 0x51, "Slider 6"),
                slider(midi, 0x52, "Slider 7"),
                slider(midi, 0x53, "Slider 8"),
            ],
            play_pause: PhysicalItem::new(
                midi,
                ui.clone(),
                PhysicalKind::Button,
                PhysicalEvent::Note(0x5e),
                "Play/Pause",
            ),
            pads: [
                PhysicalItem::new(
                    midi,
                    ui.clone(),
                    PhysicalKind::Pad,
                    PhysicalEvent::Pad {
                        note: 0x24,
                        red: Button::Pad1Red as u8,
                        green: Button::Pad1Green as u8,
                        blue: Button::Pad1Blue as u8,
                    },
                    "Pad 1",
                ),
                PhysicalItem::new(
                    midi,
                    ui.clone(),
                    PhysicalKind::Pad,
                    PhysicalEvent::Pad {
                        note: 0x25,
                        red: Button::Pad2Red as u8,
                        green: Button::Pad2Green as u8,
                        blue: Button::Pad2Blue as u8,
                    },
                    "Pad 2",
                ),
            ],
        }
    }
}

/// The KeyLab Essential surface.
pub struct KeylabEssential {
    midi_out: Rc<RefCell<MidiOutput>>,
    /// MIDI output port the controller listens on.
    port: usize,
    /// Last display SysEx, re-sent by the refresh cycle.
    last_displayed: Vec<u8>,
    pub controls: KeylabControls,
}

impl KeylabEssential {
    /// Build the surface, register its control bank and greet on the
    /// display.
    pub fn new(
        midi_in: &mut MidiInput,
        ui: &UiHandle,
        midi_out: Rc<RefCell<MidiOutput>>,
        port: usize,
    ) -> Rc<RefCell<Self>> {
        let controls = KeylabControls::new(midi_in, ui);
        let keylab = Rc::new(RefCell::new(Self {
            midi_out,
            port,
            last_displayed: Vec::new(),
            controls,
        }));
        keylab.borrow_mut().display("sintonia");
        keylab
    }

    /// Hook the metro light and the display refresh into the clock.
    pub fn follow_clock(this: &Rc<RefCell<Self>>, clock: &mut Clock) {
        let keylab = this.clone();
        clock.subscribe(ClockEvent::MidiClock, move |tick| {
            keylab.borrow_mut().midi_clock(tick);
        });
        let keylab = this.clone();
        clock.scheduler.appoint_cyclic(DISPLAY_REFRESH, move |_| {
            keylab.borrow_mut().refresh_display();
        });
    }

    /// Send a SysEx body framed with the Arturia ids.
    ///
    /// Returns the full message for later replay.
    pub fn send_sysex(&mut self, body: &[u8]) -> Vec<u8> {
        let message = frame_sysex(body);
        self.midi_out.borrow_mut().write(self.port, &message);
        message
    }

    /// Show a message on the LCD, split over its two 16-character lines.
    pub fn display(&mut self, message: &str) {
        let body = display_body(message);
        self.last_displayed = self.send_sysex(&body);
    }

    /// Re-send the last display message; external state garbles the LCD.
    pub fn refresh_display(&mut self) {
        if !self.last_displayed.is_empty() {
            let message = self.last_displayed.clone();
            self.midi_out.borrow_mut().write(self.port, &message);
        }
    }

    /// Light a button at a brightness level, 0 to 127.
    pub fn button_light(&mut self, button: Button, level: u8) {
        let mut body = BUTTON_LIGHT_COMMAND.to_vec();
        body.push(button as u8);
        body.push(level & 0x7f);
        self.send_sysex(&body);
    }

    /// Blink the metro light on the beat grid: lit for the first 16th of
    /// each beat, brightest on the measure start.
    fn midi_clock(&mut self, tick: &Tick) {
        self.button_light(Button::Metro, metro_light_level(tick));
    }
}

/// Wrap a body in `F0 <manufacturer> <dev> <sub-dev> … F7`.
fn frame_sysex(body: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(body.len() + 7);
    message.push(0xf0);
    message.extend_from_slice(&SYSEX_ID);
    message.push(DEV_ID);
    message.push(SUB_DEV_ID);
    message.extend_from_slice(body);
    message.push(0xf7);
    message
}

/// The display command body: up to two lines of 16 characters, each
/// prefixed with its 1-based line number and NUL-terminated.
fn display_body(message: &str) -> Vec<u8> {
    let mut body = DISPLAY_COMMAND.to_vec();
    let bytes = message.as_bytes();
    for (line, chunk) in bytes.chunks(DISPLAY_LINE_CHARS).take(DISPLAY_LINES).enumerate() {
        body.push(line as u8 + 1);
        body.extend_from_slice(chunk);
        body.push(0x00);
    }
    body
}

/// Metro brightness for a tick: 32 within the first 16th of a beat, 127
/// on the measure start, dark otherwise.
fn metro_light_level(tick: &Tick) -> u8 {
    if tick.midi_clock_index < CLOCKS_PER_QUARTER / 4 {
        32 + 95 * u8::from(tick.beat_index == 0)
    } else {
        0
    }
}
