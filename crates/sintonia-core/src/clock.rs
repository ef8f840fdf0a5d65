//! The timing substrate: frame ticks, MIDI ticks, beats and measures.
//!
//! The clock is single-threaded state driven by the synthesis loop calling
//! [`Clock::tick_frame_clock`] exactly once per output frame. It derives
//! the MIDI clock (24 per quarter note), beats and measures from the tempo
//! and distributes them to subscribers.
//!
//! Subscribers register a callback per event under a stable
//! [`SubscriberId`]; registration and unregistration are explicit, and
//! notification order within one event is registration order. On each frame
//! the events fire in the order measure, beat, MIDI clock, frame.

use std::collections::BTreeMap;

use crate::config::FRAME_PERIOD;
use crate::midi::CLOCKS_PER_QUARTER;
use crate::scheduler::Scheduler;

/// What the current frame means in musical time.
///
/// The boolean flags are true only on the first frame of the corresponding
/// cycle; the indices locate that frame within the enclosing cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tick {
    /// Position within the beat, 0 to 23.
    pub midi_clock_index: u8,
    /// Position within the measure, 0 to meter - 1.
    pub beat_index: u32,
    /// True on the frame a MIDI clock fires.
    pub midi_clock: bool,
    /// True on the frame a beat starts.
    pub beat: bool,
    /// True on the frame a measure starts.
    pub measure: bool,
}

/// The clock events a subscriber can follow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockEvent {
    FrameClock,
    MidiClock,
    Beat,
    Measure,
}

/// Stable identity of a clock subscriber.
///
/// Monotonically allocated, so iterating a registry in key order is
/// registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubscriberId(u64);

type TickCallback = Box<dyn FnMut(&Tick)>;

/// The process-wide clock.
///
/// Owns the wall-clock [`Scheduler`] so appointments fire at the top of
/// every frame, before any musical-time notification.
pub struct Clock {
    /// Phase within the current MIDI clock period, in [0, 1).
    phase: f64,
    /// Phase increment per frame for the MIDI clock.
    midi_dphase: f64,
    /// Beats per measure.
    meter: u32,
    tick: Tick,
    next_subscriber: u64,
    frame_subscribers: BTreeMap<SubscriberId, TickCallback>,
    midi_clock_subscribers: BTreeMap<SubscriberId, TickCallback>,
    beat_subscribers: BTreeMap<SubscriberId, TickCallback>,
    measure_subscribers: BTreeMap<SubscriberId, TickCallback>,
    /// Wall-clock appointments, run at the top of each frame.
    pub scheduler: Scheduler,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// A clock with the default 4/4 meter and a stopped tempo.
    pub fn new() -> Self {
        Self {
            phase: 0.0,
            midi_dphase: 0.0,
            meter: 4,
            tick: Tick::default(),
            next_subscriber: 0,
            frame_subscribers: BTreeMap::new(),
            midi_clock_subscribers: BTreeMap::new(),
            beat_subscribers: BTreeMap::new(),
            measure_subscribers: BTreeMap::new(),
            scheduler: Scheduler::new(),
        }
    }

    /// Set the beat frequency in Hz.
    ///
    /// A tempo fast enough that a whole MIDI clock period fits inside one
    /// frame cannot be honored tick-for-tick; the clock logs a warning and
    /// accepts the skipped ticks.
    pub fn set_tempo_hz(&mut self, frequency: f64) {
        self.midi_dphase = frequency * CLOCKS_PER_QUARTER as f64 * FRAME_PERIOD;
        if self.midi_dphase > 1.0 {
            tracing::warn!(
                frequency,
                midi_dphase = self.midi_dphase,
                "tempo faster than one MIDI clock per frame, ticks will be skipped"
            );
        }
        tracing::info!(
            frequency,
            bpm = frequency * 60.0,
            period_s = 1.0 / frequency,
            "tempo set"
        );
    }

    /// Set the tempo in beats per minute.
    pub fn set_tempo_bpm(&mut self, bpm: f64) {
        self.set_tempo_hz(bpm / 60.0);
    }

    /// Set the meter of the measure (beats per bar).
    pub fn set_meter(&mut self, beats: u32) {
        self.meter = beats.max(1);
    }

    pub fn meter(&self) -> u32 {
        self.meter
    }

    /// The tick describing the current frame.
    pub fn tick(&self) -> &Tick {
        &self.tick
    }

    /// Subscribe a callback to one clock event.
    ///
    /// An object subscribes only to the events it has a handler for; one
    /// id per (object, event) pair.
    pub fn subscribe(
        &mut self,
        event: ClockEvent,
        callback: impl FnMut(&Tick) + 'static,
    ) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;
        self.registry_mut(event).insert(id, Box::new(callback));
        id
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.frame_subscribers.remove(&id);
        self.midi_clock_subscribers.remove(&id);
        self.beat_subscribers.remove(&id);
        self.measure_subscribers.remove(&id);
    }

    /// Advance the clock by one audio frame.
    ///
    /// Runs due appointments, derives which musical boundaries this frame
    /// crosses, notifies subscribers (measure, beat, MIDI clock, frame, in
    /// that order), then advances the MIDI clock and beat indices.
    pub fn tick_frame_clock(&mut self) {
        self.scheduler.run_due();

        self.tick.midi_clock = false;
        self.tick.beat = false;
        self.tick.measure = false;

        self.phase += self.midi_dphase;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
            self.tick.midi_clock = true;
            if self.tick.midi_clock_index == 0 {
                self.tick.beat = true;
                if self.tick.beat_index == 0 {
                    self.tick.measure = true;
                    self.notify(ClockEvent::Measure);
                }
                self.notify(ClockEvent::Beat);
            }
            self.notify(ClockEvent::MidiClock);
        }
        self.notify(ClockEvent::FrameClock);

        if self.tick.midi_clock {
            self.tick.midi_clock_index += 1;
            if self.tick.midi_clock_index == CLOCKS_PER_QUARTER {
                self.tick.midi_clock_index = 0;
                self.tick.beat_index += 1;
                if self.tick.beat_index == self.meter {
                    self.tick.beat_index = 0;
                }
            }
        }
    }

    fn notify(&mut self, event: ClockEvent) {
        let tick = self.tick;
        for callback in self.registry_mut(event).values_mut() {
            callback(&tick);
        }
    }

    fn registry_mut(&mut self, event: ClockEvent) -> &mut BTreeMap<SubscriberId, TickCallback> {
        match event {
            ClockEvent::FrameClock => &mut self.frame_subscribers,
            ClockEvent::MidiClock => &mut self.midi_clock_subscribers,
            ClockEvent::Beat => &mut self.beat_subscribers,
            ClockEvent::Measure => &mut self.measure_subscribers,
        }
    }
}
