//! Tick-paced automation routines.
//!
//! An automation is a routine that performs actions at points in musical
//! time: press a virtual key, wait eight MIDI ticks, move a parameter,
//! wait a beat. Each [`Automate`] runs its routine on its own lightweight
//! worker thread; the routine blocks in [`AutomateContext::pause`] popping
//! tick tokens that the synthesis thread pushes from a `midi_clock`
//! subscription. The channel is unbounded so the clock never blocks.

use crossbeam_channel::{Receiver, Sender, unbounded};
use std::thread;

/// Handed to the automation routine; lives on the worker thread.
pub struct AutomateContext {
    ticks: Receiver<()>,
}

impl AutomateContext {
    /// Block until `midi_ticks` MIDI clocks have elapsed.
    ///
    /// Returns early (with `false`) when the clock side has gone away,
    /// which is the shutdown signal for a routine that loops forever.
    pub fn pause(&self, midi_ticks: u32) -> bool {
        for _ in 0..midi_ticks {
            if self.ticks.recv().is_err() {
                return false;
            }
        }
        true
    }
}

/// A running automation.
pub struct Automate {
    tick_tx: Sender<()>,
}

impl Automate {
    /// Launch a routine on its own worker thread.
    pub fn new(routine: impl FnOnce(AutomateContext) + Send + 'static) -> Self {
        let (tick_tx, ticks) = unbounded();
        thread::spawn(move || routine(AutomateContext { ticks }));
        Self { tick_tx }
    }

    /// The MIDI clock notification; wire this to a `midi_clock`
    /// subscription. Never blocks.
    pub fn midi_clock(&self) {
        let _ = self.tick_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn pause_counts_ticks() {
        let (done_tx, done_rx) = unbounded();
        let automate = Automate::new(move |ctx| {
            ctx.pause(3);
            done_tx.send("after 3").unwrap();
            ctx.pause(2);
            done_tx.send("after 5").unwrap();
        });

        for _ in 0..2 {
            automate.midi_clock();
        }
        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());

        automate.midi_clock();
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(1)).unwrap(), "after 3");

        for _ in 0..2 {
            automate.midi_clock();
        }
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(1)).unwrap(), "after 5");
    }

    #[test]
    fn dropping_the_automate_unblocks_the_routine() {
        let (done_tx, done_rx) = unbounded();
        let automate = Automate::new(move |ctx| {
            let completed = ctx.pause(1000);
            done_tx.send(completed).unwrap();
        });
        drop(automate);
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(1)).unwrap(), false);
    }
}
