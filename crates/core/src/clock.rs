//! Deferred clock-event scheduler.
//!
//! Peripherals schedule callbacks a number of cycles into the future. Entries
//! live in a singly linked list sorted by absolute due cycle; unlinked entries
//! go back into a small pool so steady-state rescheduling does not allocate.
//! Callbacks are identified by `Rc` pointer identity.

use std::rc::Rc;

use crate::cpu::Cpu;

/// Callback fired when an event comes due.
pub type ClockEventCallback = Rc<dyn Fn(&mut Cpu)>;

const POOL_CAPACITY: usize = 10;

struct ClockEventEntry {
    cycles: u64,
    callback: Option<ClockEventCallback>,
    next: Option<Box<ClockEventEntry>>,
}

impl ClockEventEntry {
    fn matches(&self, callback: &ClockEventCallback) -> bool {
        self.callback.as_ref().is_some_and(|cb| Rc::ptr_eq(cb, callback))
    }
}

#[derive(Default)]
pub struct ClockScheduler {
    head: Option<Box<ClockEventEntry>>,
    pool: Vec<Box<ClockEventEntry>>,
}

impl ClockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `callback` at `now + max(1, delay)`.
    ///
    /// The entry goes in front of the first entry due at the same cycle or
    /// later, so among equal due cycles the newest fires first.
    pub fn schedule(&mut self, now: u64, callback: ClockEventCallback, delay: u64) {
        let due = now + delay.max(1);
        let mut entry = match self.pool.pop() {
            Some(mut entry) => {
                entry.cycles = due;
                entry.callback = Some(callback);
                entry
            }
            None => Box::new(ClockEventEntry { cycles: due, callback: Some(callback), next: None }),
        };

        let mut cursor = &mut self.head;
        while cursor.as_ref().is_some_and(|e| e.cycles < due) {
            if let Some(e) = cursor {
                cursor = &mut e.next;
            }
        }
        entry.next = cursor.take();
        *cursor = Some(entry);
    }

    /// Unlink the entry for `callback`. Returns false if it is not scheduled.
    pub fn cancel(&mut self, callback: &ClockEventCallback) -> bool {
        let mut cursor = &mut self.head;
        while cursor.as_ref().is_some_and(|e| !e.matches(callback)) {
            if let Some(e) = cursor {
                cursor = &mut e.next;
            }
        }
        let Some(mut entry) = cursor.take() else {
            return false;
        };
        *cursor = entry.next.take();
        self.recycle(entry);
        true
    }

    pub fn reschedule(&mut self, now: u64, callback: &ClockEventCallback, delay: u64) -> bool {
        if !self.cancel(callback) {
            return false;
        }
        self.schedule(now, Rc::clone(callback), delay);
        true
    }

    /// Unlink the head entry if it is due and hand back its callback.
    ///
    /// The entry is already back in the pool when the caller runs the
    /// callback, so a callback may reschedule itself with `schedule`.
    pub fn pop_due(&mut self, now: u64) -> Option<ClockEventCallback> {
        if !self.head.as_ref().is_some_and(|e| e.cycles <= now) {
            return None;
        }
        let mut entry = self.head.take()?;
        self.head = entry.next.take();
        let callback = entry.callback.take();
        self.recycle(entry);
        callback
    }

    /// Due cycle of the earliest event.
    pub fn next_due(&self) -> Option<u64> {
        self.head.as_ref().map(|e| e.cycles)
    }

    pub fn is_scheduled(&self, callback: &ClockEventCallback) -> bool {
        let mut cursor = self.head.as_deref();
        while let Some(e) = cursor {
            if e.matches(callback) {
                return true;
            }
            cursor = e.next.as_deref();
        }
        false
    }

    pub fn len(&self) -> usize {
        let mut n = 0;
        let mut cursor = self.head.as_deref();
        while let Some(e) = cursor {
            n += 1;
            cursor = e.next.as_deref();
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn clear(&mut self) {
        let mut cursor = self.head.take();
        while let Some(mut entry) = cursor {
            cursor = entry.next.take();
            self.recycle(entry);
        }
    }

    fn recycle(&mut self, mut entry: Box<ClockEventEntry>) {
        if self.pool.len() < POOL_CAPACITY {
            entry.callback = None;
            entry.next = None;
            self.pool.push(entry);
        }
    }
}

impl Drop for ClockScheduler {
    fn drop(&mut self) {
        let mut cursor = self.head.take();
        while let Some(mut entry) = cursor {
            cursor = entry.next.take();
        }
    }
}

impl Cpu {
    /// Run `callback` `delay` cycles from now (at least one cycle).
    pub fn add_clock_event(&mut self, callback: ClockEventCallback, delay: u64) -> ClockEventCallback {
        self.clock.schedule(self.cycles, Rc::clone(&callback), delay);
        callback
    }

    /// Move an already scheduled callback to `delay` cycles from now.
    pub fn update_clock_event(&mut self, callback: &ClockEventCallback, delay: u64) -> bool {
        self.clock.reschedule(self.cycles, callback, delay)
    }

    pub fn clear_clock_event(&mut self, callback: &ClockEventCallback) -> bool {
        self.clock.cancel(callback)
    }
}
