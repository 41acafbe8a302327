//! Time-triggered cooperative scheduler
//!
//! Setup builds a [`Scheduler`] (the task table) once. [`Scheduler::start`]
//! runs every task's `init`, arms the tick source and splits the table:
//!
//! ```text
//! Scheduler::begin ─► add_task (×n) ─► start ─┬─► Dispatcher   (main loop, normal tasks)
//!                                              └─► TickHandler  (tick ISR, forced tasks)
//! ```
//!
//! Both halves share one [`TickState`] holding the delay counters and the
//! scheduler lock.

use embedded_hal::timer::{CountDown, Periodic};
use heapless::Vec;

use super::state::TickState;
use super::task::{Runnable, Task, TaskBuilder, TaskId, TaskInfo, Timing};
use super::Ticks;
use crate::error::{Error, Result};
use crate::hal::PowerControl;

pub(crate) struct Slot<'a> {
    index: usize,
    task: Task<'a>,
}

impl<'a> Slot<'a> {
    fn info(&self) -> TaskInfo {
        self.task.info(TaskId(self.index))
    }
}

/// Fixed-capacity task table, populated during setup.
pub struct Scheduler<'a, const N: usize> {
    state: &'a TickState<N>,
    tasks: Vec<Task<'a>, N>,
    capacity: usize,
    last_error: Option<Error>,
}

impl<'a, const N: usize> Scheduler<'a, N> {
    /// Reserve `capacity` of the `N` slots backing `state` and lock the
    /// scheduler until the first tick.
    ///
    /// A state serves one scheduler for the life of the program; a second
    /// `begin` on it fails with [`Error::StateInUse`].
    pub fn begin(state: &'a TickState<N>, capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > N {
            return Err(Error::CapacityAllocation {
                requested: capacity,
                available: N,
            });
        }

        if !state.take() {
            return Err(Error::StateInUse);
        }

        Ok(Self {
            state,
            tasks: Vec::new(),
            capacity,
            last_error: None,
        })
    }

    /// Register a normal task released every `period` ticks, first at tick `offset`.
    pub fn add_task(
        &mut self,
        body: &'a mut (dyn Runnable + Send),
        period: Ticks,
        offset: Ticks,
    ) -> Result<TaskId> {
        TaskBuilder::new(body)
            .period(period)
            .offset(offset)
            .build(self)
    }

    /// A rejected task leaves the table untouched; the error is returned
    /// and also kept for [`Scheduler::last_error`].
    pub(crate) fn register(&mut self, mut task: Task<'a>) -> Result<TaskId> {
        let slot = self.tasks.len();
        let capacity = self.capacity;

        if slot >= capacity {
            return self.reject(Error::TooManyTasks { capacity });
        }
        if task.period == 0 {
            return self.reject(Error::InvalidPeriod);
        }
        if task.offset >= task.period {
            return self.reject(Error::InvalidOffset {
                offset: task.offset,
                period: task.period,
            });
        }

        if let Some(signal) = task.signal.as_deref_mut() {
            signal.lower();
        }
        self.state.load(slot, task.offset);
        self.tasks
            .push(task)
            .map_err(|_| Error::TooManyTasks { capacity })?;

        Ok(TaskId(slot))
    }

    fn reject(&mut self, error: Error) -> Result<TaskId> {
        self.last_error = Some(error);
        Err(error)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn tasks_used(&self) -> usize {
        self.tasks.len()
    }

    pub fn task(&self, id: TaskId) -> Option<TaskInfo> {
        self.tasks.get(id.0).map(|task| task.info(id))
    }

    pub fn last_task(&self) -> Option<TaskInfo> {
        self.tasks_used()
            .checked_sub(1)
            .and_then(|index| self.task(TaskId(index)))
    }

    /// Most recent registration failure, if any.
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
    }

    pub fn state(&self) -> &'a TickState<N> {
        self.state
    }

    /// Run every `init` in registration order, arm the periodic tick and
    /// hand the table over to its two execution contexts.
    ///
    /// The returned [`TickHandler`] must be serviced from the tick
    /// interrupt; interrupts should stay masked until it is bound.
    pub fn start<C, P>(self, tick: &mut C, period: P) -> (Dispatcher<'a, N>, TickHandler<'a, N>)
    where
        C: CountDown + Periodic,
        P: Into<C::Time>,
    {
        let Scheduler {
            state, mut tasks, ..
        } = self;

        for task in tasks.iter_mut() {
            task.body.init();
        }

        let mut normal = Vec::new();
        let mut forced = Vec::new();
        for (index, task) in tasks.into_iter().enumerate() {
            let side = match task.timing {
                Timing::Normal => &mut normal,
                Timing::Forced => &mut forced,
            };
            // Each side has room for the whole table
            side.push(Slot { index, task }).ok();
        }

        tick.start(period);

        (
            Dispatcher { state, normal },
            TickHandler { state, forced },
        )
    }
}

/// Why [`Dispatcher::run_tasks`] returned.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Wake {
    /// Woken by something other than the tick. Nothing ran.
    Spurious,
    /// A tick was serviced and `dispatched` normal tasks ran.
    Tick { dispatched: usize },
}

/// Main-loop half: sleeps until the tick, then runs due normal tasks.
pub struct Dispatcher<'a, const N: usize> {
    state: &'a TickState<N>,
    normal: Vec<Slot<'a>, N>,
}

impl<'a, const N: usize> Dispatcher<'a, N> {
    /// One iteration of the main loop.
    ///
    /// Due tasks run in registration order. Each is reloaded before its
    /// body runs, so ticks arriving mid-run still count toward its next
    /// release, and a task claimed late stays on its `offset + k*period`
    /// grid.
    pub fn run_tasks<P: PowerControl>(&mut self, power: &mut P) -> Wake {
        self.sleep_now(power);

        if self.state.is_locked() {
            return Wake::Spurious;
        }

        let mut dispatched = 0;
        for slot in self.normal.iter_mut() {
            if self.state.claim(slot.index, slot.task.period) {
                slot.task.execute();
                dispatched += 1;
            }
        }
        Wake::Tick { dispatched }
    }

    /// Idle the core until the next interrupt.
    ///
    /// The lock is set with interrupts masked and the power controller
    /// unmasks them as it halts, so a tick can never land between the two.
    fn sleep_now<P: PowerControl>(&self, power: &mut P) {
        power.prepare_sleep();
        power.sleep_with(|| self.state.lock());
    }

    pub fn len(&self) -> usize {
        self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normal.is_empty()
    }

    pub fn tasks(&self) -> impl Iterator<Item = TaskInfo> + use<'_, 'a, N> {
        self.normal.iter().map(Slot::info)
    }
}

/// Interrupt half: counts the tick down and runs due forced tasks.
///
/// Everything here runs with interrupts disabled, so forced bodies and the
/// pass over the table must finish well inside one tick.
pub struct TickHandler<'a, const N: usize> {
    state: &'a TickState<N>,
    forced: Vec<Slot<'a>, N>,
}

impl<'a, const N: usize> TickHandler<'a, N> {
    /// Body of the tick interrupt.
    pub fn on_tick<P: PowerControl>(&mut self, power: &mut P) {
        power.wake();
        self.state.advance();

        for slot in self.forced.iter_mut() {
            if self.state.claim(slot.index, slot.task.period) {
                slot.task.execute();
            }
        }

        self.state.release();
    }

    pub fn len(&self) -> usize {
        self.forced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forced.is_empty()
    }

    pub fn tasks(&self) -> impl Iterator<Item = TaskInfo> + use<'_, 'a, N> {
        self.forced.iter().map(Slot::info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::Millis;
    use crate::testing::{ManualTick, PowerState, SimPower};
    use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::vec::Vec as StdVec;

    #[test]
    fn test_begin_rejects_bad_capacity() {
        let state = TickState::<4>::new();
        assert_eq!(
            Scheduler::begin(&state, 5).err(),
            Some(Error::CapacityAllocation {
                requested: 5,
                available: 4
            })
        );
        assert!(Scheduler::begin(&state, 0).is_err());
        assert!(Scheduler::begin(&state, 4).is_ok());
    }

    #[test]
    fn test_second_begin_on_same_state_is_rejected() {
        let state = TickState::<2>::new();
        let mut a = || {};
        let mut scheduler = Scheduler::begin(&state, 2).unwrap();
        scheduler.add_task(&mut a, 3, 1).unwrap();

        assert_eq!(Scheduler::begin(&state, 2).err(), Some(Error::StateInUse));
        assert_eq!(state.slots(), 1);
        assert_eq!(state.delay(0), Some(1));
        assert_eq!(scheduler.tasks_used(), 1);
    }

    #[test]
    fn test_begin_locks_scheduler() {
        let state = TickState::<2>::new();
        state.release();
        let scheduler = Scheduler::begin(&state, 2).unwrap();
        assert!(scheduler.state().is_locked());
        assert_eq!(scheduler.tasks_used(), 0);
        assert_eq!(scheduler.capacity(), 2);
    }

    #[test]
    fn test_validation_leaves_table_unchanged() {
        let state = TickState::<2>::new();
        let mut a = || {};
        let mut b = || {};
        let mut scheduler = Scheduler::begin(&state, 2).unwrap();

        assert_eq!(scheduler.add_task(&mut a, 0, 0), Err(Error::InvalidPeriod));
        assert_eq!(
            scheduler.add_task(&mut b, 3, 3),
            Err(Error::InvalidOffset {
                offset: 3,
                period: 3
            })
        );
        assert_eq!(scheduler.tasks_used(), 0);
        assert_eq!(scheduler.last_error(), Some(Error::InvalidOffset { offset: 3, period: 3 }));
        assert_eq!(state.slots(), 0);
    }

    #[test]
    fn test_offset_loaded_into_state() {
        let state = TickState::<2>::new();
        let mut a = || {};
        let mut scheduler = Scheduler::begin(&state, 2).unwrap();
        let id = scheduler.add_task(&mut a, 5, 2).unwrap();
        assert_eq!(id.index(), 0);
        assert_eq!(state.delay(0), Some(2));
        let info = scheduler.last_task().unwrap();
        assert_eq!(info.offset, 2);
        assert_eq!(info.period, 5);
    }

    #[test]
    fn test_start_splits_by_timing_and_arms_tick() {
        let state = TickState::<3>::new();
        let mut a = || {};
        let mut b = || {};
        let mut c = || {};
        let mut scheduler = Scheduler::begin(&state, 3).unwrap();
        scheduler.add_task(&mut a, 2, 0).unwrap();
        TaskBuilder::new(&mut b).period(1).forced().build(&mut scheduler).unwrap();
        scheduler.add_task(&mut c, 4, 1).unwrap();

        let mut tick = ManualTick::new();
        let (dispatcher, handler) = scheduler.start(&mut tick, 10u16);

        assert_eq!(tick.armed(), Some(Millis(10)));
        let normal: StdVec<usize> = dispatcher.tasks().map(|t| t.id.index()).collect();
        let forced: StdVec<usize> = handler.tasks().map(|t| t.id.index()).collect();
        assert_eq!(normal, [0, 2]);
        assert_eq!(forced, [1]);
    }

    #[test]
    fn test_reload_is_period_minus_one() {
        let state = TickState::<1>::new();
        let runs = AtomicU32::new(0);
        let mut body = || {
            runs.fetch_add(1, Ordering::Relaxed);
        };
        let mut scheduler = Scheduler::begin(&state, 1).unwrap();
        scheduler.add_task(&mut body, 4, 0).unwrap();
        let (mut dispatcher, mut handler) = scheduler.start(&mut ManualTick::new(), 1u16);

        let board = PowerState::new();
        let mut isr = || handler.on_tick(&mut SimPower::new(&board));
        let mut power = SimPower::new(&board).on_sleep(&mut isr);

        assert_eq!(dispatcher.run_tasks(&mut power), Wake::Tick { dispatched: 1 });
        assert_eq!(state.delay(0), Some(3));
        for expected in [2, 1, 0] {
            assert_eq!(dispatcher.run_tasks(&mut power), Wake::Tick { dispatched: 0 });
            assert_eq!(state.delay(0), Some(expected));
        }
        assert_eq!(dispatcher.run_tasks(&mut power), Wake::Tick { dispatched: 1 });
        assert_eq!(state.delay(0), Some(3));
        drop(power);
        drop(isr);
        assert_eq!(runs.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_tick_during_pass_keeps_earlier_task_on_grid() {
        let state = TickState::<2>::new();
        let runs = Mutex::new(StdVec::new());
        let simulated = AtomicBool::new(false);

        // Registered first, so its due check in each pass comes first
        let mut early = || runs.lock().unwrap().push(state.ticks() - 1);
        // Its first run outlasts a tick, which lands after `early` was checked
        let mut slow = || {
            if !simulated.swap(true, Ordering::Relaxed) {
                state.advance();
                state.release();
            }
        };

        let mut scheduler = Scheduler::begin(&state, 2).unwrap();
        scheduler.add_task(&mut early, 3, 1).unwrap();
        scheduler.add_task(&mut slow, 3, 0).unwrap();
        let (mut dispatcher, mut handler) = scheduler.start(&mut ManualTick::new(), 1u16);

        let board = PowerState::new();
        let mut isr = || handler.on_tick(&mut SimPower::new(&board));
        let mut power = SimPower::new(&board).on_sleep(&mut isr);
        for _ in 0..7 {
            dispatcher.run_tasks(&mut power);
        }
        drop(power);
        drop(isr);

        // Released on tick 1, run late on tick 2, then back on 4 and 7
        assert_eq!(*runs.lock().unwrap(), [2, 4, 7]);
        assert_eq!(state.ticks(), 8);
    }
}
