//! Tick state shared between the tick interrupt and the main loop
//!
//! Delay counters are `u32`, four bytes on an 8-bit data path, so every
//! access goes through a critical section. Nothing outside this module
//! touches the counters directly.
//!
//! On each tick a slot whose delay is already zero is marked due;
//! any other slot counts down by one. A task with offset `O` and period
//! `P` is therefore due on ticks `O`, `O + P`, `O + 2P`, ...
//!
//! A due slot also counts the ticks it waits to be claimed, and the claim
//! subtracts them from the reload, so a late run never moves that grid.

use core::cell::RefCell;

use critical_section::Mutex;

use super::Ticks;

struct Shared<const N: usize> {
    delays: [Ticks; N],
    due: [bool; N],
    late: [Ticks; N],
    used: usize,
    taken: bool,
    locked: bool,
    ticks: u32,
    overruns: u32,
}

impl<const N: usize> Shared<N> {
    const fn new() -> Self {
        Self {
            delays: [0; N],
            due: [false; N],
            late: [0; N],
            used: 0,
            taken: false,
            locked: true,
            ticks: 0,
            overruns: 0,
        }
    }
}

/// Per-slot countdowns plus the scheduler lock.
///
/// The lock is set whenever the main loop goes to sleep and cleared by
/// the tick handler once its pass over the table is complete.
pub struct TickState<const N: usize> {
    shared: Mutex<RefCell<Shared<N>>>,
}

impl<const N: usize> TickState<N> {
    pub const fn new() -> Self {
        Self {
            shared: Mutex::new(RefCell::new(Shared::new())),
        }
    }

    /// Hand the state to a new scheduler: forget every slot and re-arm
    /// the lock. Fails if a scheduler already owns it.
    pub(crate) fn take(&self) -> bool {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            if shared.taken {
                return false;
            }
            *shared = Shared::new();
            shared.taken = true;
            true
        })
    }

    /// Whether a scheduler owns this state.
    pub fn is_taken(&self) -> bool {
        critical_section::with(|cs| self.shared.borrow_ref(cs).taken)
    }

    pub(crate) fn load(&self, slot: usize, delay: Ticks) {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            shared.delays[slot] = delay;
            shared.due[slot] = false;
            shared.late[slot] = 0;
            shared.used = shared.used.max(slot + 1);
        });
    }

    /// Ticks left before `slot` is released.
    pub fn delay(&self, slot: usize) -> Option<Ticks> {
        critical_section::with(|cs| {
            let shared = self.shared.borrow_ref(cs);
            (slot < shared.used).then(|| shared.delays[slot])
        })
    }

    /// Whether `slot` was released by a tick and not yet claimed.
    pub fn is_due(&self, slot: usize) -> bool {
        critical_section::with(|cs| {
            let shared = self.shared.borrow_ref(cs);
            slot < shared.used && shared.due[slot]
        })
    }

    pub fn slots(&self) -> usize {
        critical_section::with(|cs| self.shared.borrow_ref(cs).used)
    }

    pub fn is_locked(&self) -> bool {
        critical_section::with(|cs| self.shared.borrow_ref(cs).locked)
    }

    pub(crate) fn lock(&self) {
        critical_section::with(|cs| self.shared.borrow_ref_mut(cs).locked = true);
    }

    pub(crate) fn release(&self) {
        critical_section::with(|cs| self.shared.borrow_ref_mut(cs).locked = false);
    }

    /// Release every slot sitting at zero and count the others down. A slot
    /// still due from an earlier tick falls one more tick behind.
    ///
    /// A tick that finds the lock already clear means the main loop never
    /// got back to sleep after the previous one; it is counted as an overrun.
    pub(crate) fn advance(&self) {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            if !shared.locked {
                shared.overruns = shared.overruns.wrapping_add(1);
            }
            shared.ticks = shared.ticks.wrapping_add(1);
            let Shared {
                delays,
                due,
                late,
                used,
                ..
            } = &mut *shared;
            let slots = delays[..*used].iter_mut().zip(due.iter_mut()).zip(late.iter_mut());
            for ((delay, released), behind) in slots {
                if *released {
                    *behind = behind.wrapping_add(1);
                } else if *delay == 0 {
                    *released = true;
                    *behind = 0;
                } else {
                    *delay -= 1;
                }
            }
        })
    }

    /// Take a due slot and reload it so it is next due `period` ticks after
    /// the tick that released it. Returns whether it was due.
    pub(crate) fn claim(&self, slot: usize, period: Ticks) -> bool {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            if shared.due[slot] {
                let late = shared.late[slot] % period;
                shared.due[slot] = false;
                shared.late[slot] = 0;
                shared.delays[slot] = period - 1 - late;
                true
            } else {
                false
            }
        })
    }

    /// Ticks serviced since `begin`.
    pub fn ticks(&self) -> u32 {
        critical_section::with(|cs| self.shared.borrow_ref(cs).ticks)
    }

    pub fn overruns(&self) -> u32 {
        critical_section::with(|cs| self.shared.borrow_ref(cs).overruns)
    }
}

impl<const N: usize> Default for TickState<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_locked_and_empty() {
        let state = TickState::<4>::new();
        assert!(state.is_locked());
        assert_eq!(state.slots(), 0);
        assert_eq!(state.delay(0), None);
        assert!(!state.is_due(0));
        assert_eq!(state.ticks(), 0);
    }

    #[test]
    fn test_advance_releases_at_zero() {
        let state = TickState::<4>::new();
        state.load(0, 2);
        state.load(1, 0);
        state.advance();
        assert_eq!(state.delay(0), Some(1));
        assert!(!state.is_due(0));
        assert_eq!(state.delay(1), Some(0));
        assert!(state.is_due(1));
        state.advance();
        assert_eq!(state.delay(0), Some(0));
        assert!(!state.is_due(0));
        state.advance();
        assert!(state.is_due(0));
        assert_eq!(state.ticks(), 3);
    }

    #[test]
    fn test_claim_needs_a_tick() {
        let state = TickState::<2>::new();
        state.load(0, 0);
        assert!(!state.claim(0, 5));
        state.advance();
        assert!(state.claim(0, 5));
        assert_eq!(state.delay(0), Some(4));
        assert!(!state.claim(0, 5));
    }

    #[test]
    fn test_period_one_due_every_tick() {
        let state = TickState::<1>::new();
        state.load(0, 0);
        for _ in 0..3 {
            state.advance();
            assert!(state.claim(0, 1));
            assert_eq!(state.delay(0), Some(0));
        }
    }

    #[test]
    fn test_unclaimed_slot_stays_due() {
        let state = TickState::<1>::new();
        state.load(0, 0);
        state.advance();
        state.advance();
        assert!(state.claim(0, 3));
        assert!(!state.claim(0, 3));
        // Claimed one tick late: due again on tick 3, two ticks from now
        assert_eq!(state.delay(0), Some(1));
    }

    #[test]
    fn test_late_claim_keeps_grid() {
        let state = TickState::<1>::new();
        state.load(0, 0);
        // Released on tick 0, claimed on tick 2
        for _ in 0..3 {
            state.advance();
        }
        assert!(state.claim(0, 4));
        assert_eq!(state.delay(0), Some(1));
        state.advance();
        assert!(!state.is_due(0));
        state.advance();
        assert!(state.is_due(0));
        assert_eq!(state.ticks(), 5);
    }

    #[test]
    fn test_claim_a_full_period_late() {
        let state = TickState::<1>::new();
        state.load(0, 0);
        // Released on tick 0, claimed on tick 3 which is a release tick itself
        for _ in 0..4 {
            state.advance();
        }
        assert!(state.claim(0, 3));
        assert_eq!(state.delay(0), Some(2));
    }

    #[test]
    fn test_overrun_counted_when_lock_clear() {
        let state = TickState::<1>::new();
        state.advance();
        assert_eq!(state.overruns(), 0);
        state.release();
        state.advance();
        assert_eq!(state.overruns(), 1);
        state.lock();
        state.advance();
        assert_eq!(state.overruns(), 1);
    }

    #[test]
    fn test_take_clears_everything_once() {
        let state = TickState::<2>::new();
        state.load(1, 3);
        state.release();
        state.advance();
        assert!(!state.is_taken());

        assert!(state.take());
        assert!(state.is_taken());
        assert!(state.is_locked());
        assert_eq!(state.slots(), 0);
        assert_eq!(state.ticks(), 0);
        assert_eq!(state.overruns(), 0);

        state.load(0, 1);
        state.advance();
        assert!(!state.take());
        assert_eq!(state.slots(), 1);
        assert_eq!(state.ticks(), 1);
    }
}
