//! Wall-clock scheduling of one-shot and cyclic appointments.
//!
//! A min-heap of `(wake time, action)` pairs on `std::time::Instant`.
//! [`Scheduler::run_due`] is infrastructure: the clock calls it once per
//! frame, firing every appointment whose wake time has passed. There is no
//! cancellation; appointments run to completion.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Callable invoked with the appointment's nominal wake time (which may be
/// slightly in the past by the time it runs).
pub type Action = Box<dyn FnMut(Instant)>;

/// A cyclic action is shared between the heap entry currently queued and
/// the next one it re-appoints.
type CyclicAction = Rc<RefCell<dyn FnMut(Instant)>>;

enum AppointmentKind {
    Once(Action),
    Cyclic { period: Duration, action: CyclicAction },
}

struct Appointment {
    at: Instant,
    /// Tie-breaker so same-instant appointments fire in insertion order.
    seq: u64,
    kind: AppointmentKind,
}

impl PartialEq for Appointment {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Appointment {}

impl PartialOrd for Appointment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Appointment {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the std max-heap behaves as a min-heap on (at, seq)
        other.at.cmp(&self.at).then(other.seq.cmp(&self.seq))
    }
}

/// A simple scheduler based on wall-clock steady time rather than MIDI time.
#[derive(Default)]
pub struct Scheduler {
    queue: BinaryHeap<Appointment>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current time point.
    #[inline]
    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Number of queued appointments.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Create an appointment at a specific time point.
    pub fn appoint_at(&mut self, at: Instant, action: impl FnMut(Instant) + 'static) {
        self.push(at, AppointmentKind::Once(Box::new(action)));
    }

    /// Create an appointment at a duration from now.
    pub fn appoint_in(&mut self, delay: Duration, action: impl FnMut(Instant) + 'static) {
        self.appoint_at(self.now() + delay, action);
    }

    /// Create an appointment repeating every `period`.
    ///
    /// Each firing re-appoints itself at `wake + period`, so the cadence
    /// does not drift with processing time.
    pub fn appoint_cyclic(&mut self, period: Duration, action: impl FnMut(Instant) + 'static) {
        let action: CyclicAction = Rc::new(RefCell::new(action));
        let at = self.now() + period;
        self.push(at, AppointmentKind::Cyclic { period, action });
    }

    /// Fire every appointment whose wake time is not in the future.
    ///
    /// Expected to be called on a regular basis (the clock does, once per
    /// frame).
    pub fn run_due(&mut self) {
        let now = self.now();
        while let Some(appointment) = self.pop_due(now) {
            match appointment.kind {
                AppointmentKind::Once(mut action) => action(appointment.at),
                AppointmentKind::Cyclic { period, action } => {
                    (action.borrow_mut())(appointment.at);
                    let next = appointment.at + period;
                    self.push(next, AppointmentKind::Cyclic { period, action });
                }
            }
        }
    }

    fn push(&mut self, at: Instant, kind: AppointmentKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Appointment { at, seq, kind });
    }

    fn pop_due(&mut self, now: Instant) -> Option<Appointment> {
        if self.queue.peek()?.at <= now {
            self.queue.pop()
        } else {
            None
        }
    }
}
