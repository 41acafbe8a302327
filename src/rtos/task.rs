use embedded_hal::digital::v2::OutputPin;

use super::scheduler::Scheduler;
use super::Ticks;
use crate::error::Result;

/// Work the scheduler runs to completion on every release.
///
/// Closures implement this directly. Types that carry their own state
/// can also override [`Runnable::init`], which runs once before the tick
/// source is armed.
pub trait Runnable {
    fn run(&mut self);

    fn init(&mut self) {}
}

impl<F: FnMut()> Runnable for F {
    #[inline]
    fn run(&mut self) {
        self()
    }
}

/// Output line held high while a task runs, for scope timing.
///
/// Pin errors are ignored: instrumentation never changes scheduling.
pub trait Instrument {
    fn raise(&mut self);
    fn lower(&mut self);
}

impl<P: OutputPin> Instrument for P {
    #[inline]
    fn raise(&mut self) {
        self.set_high().ok();
    }

    #[inline]
    fn lower(&mut self) {
        self.set_low().ok();
    }
}

/// Where a task is released from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Timing {
    /// Dispatched from the main loop after the tick.
    #[default]
    Normal,
    /// Dispatched inside the tick interrupt itself.
    Forced,
}

/// Registration-order index of a task.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Snapshot of a task's configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: TaskId,
    pub name: Option<&'static str>,
    pub offset: Ticks,
    pub period: Ticks,
    pub timing: Timing,
    pub instrumented: bool,
}

pub struct Task<'a> {
    pub(crate) name: Option<&'static str>,
    pub(crate) body: &'a mut (dyn Runnable + Send),
    pub(crate) period: Ticks,
    pub(crate) offset: Ticks,
    pub(crate) timing: Timing,
    pub(crate) signal: Option<&'a mut (dyn Instrument + Send)>,
}

impl<'a> Task<'a> {
    pub(crate) fn execute(&mut self) {
        if let Some(signal) = self.signal.as_deref_mut() {
            signal.raise();
        }
        self.body.run();
        if let Some(signal) = self.signal.as_deref_mut() {
            signal.lower();
        }
    }

    pub(crate) fn info(&self, id: TaskId) -> TaskInfo {
        TaskInfo {
            id,
            name: self.name,
            offset: self.offset,
            period: self.period,
            timing: self.timing,
            instrumented: self.signal.is_some(),
        }
    }
}

/// Configures one task and registers it with a [`Scheduler`].
///
/// Defaults: period of one tick, no offset, [`Timing::Normal`], not instrumented.
pub struct TaskBuilder<'a> {
    task: Task<'a>,
}

impl<'a> TaskBuilder<'a> {
    pub fn new(body: &'a mut (dyn Runnable + Send)) -> Self {
        Self {
            task: Task {
                name: None,
                body,
                period: 1,
                offset: 0,
                timing: Timing::Normal,
                signal: None,
            },
        }
    }

    pub fn name(mut self, name: &'static str) -> Self {
        self.task.name = Some(name);
        self
    }

    /// Ticks between releases.
    pub fn period(mut self, period: Ticks) -> Self {
        self.task.period = period;
        self
    }

    /// Ticks before the first release.
    pub fn offset(mut self, offset: Ticks) -> Self {
        self.task.offset = offset;
        self
    }

    pub fn timing(mut self, timing: Timing) -> Self {
        self.task.timing = timing;
        self
    }

    pub fn forced(self) -> Self {
        self.timing(Timing::Forced)
    }

    pub fn instrument(mut self, signal: &'a mut (dyn Instrument + Send)) -> Self {
        self.task.signal = Some(signal);
        self
    }

    pub fn build<const N: usize>(self, scheduler: &mut Scheduler<'a, N>) -> Result<TaskId> {
        scheduler.register(self.task)
    }
}
