//! Operator-facing reports on the schedule
//!
//! Read-only: nothing here feeds back into scheduling.

use ufmt::{uWrite, uwrite};

use crate::error::Error;
use crate::logger::{Hex, Logger};
use crate::rtos::{Scheduler, TaskInfo, TickState, Timing};

/// `[ERR] 0xCODE message`
pub fn report_error<W: uWrite>(log: &mut Logger<W>, error: Error) {
    log.error(|w| uwrite!(w, "{} {}", Hex(error.code()), error));
}

/// Describe the most recently registered task, preceded by the last
/// registration error if there was one.
pub fn report_added_task<W: uWrite, const N: usize>(
    log: &mut Logger<W>,
    scheduler: &Scheduler<'_, N>,
) {
    if let Some(error) = scheduler.last_error() {
        report_error(log, error);
    }

    match scheduler.last_task() {
        Some(info) => {
            report_task(log, &info);
            let (used, capacity) = (scheduler.tasks_used(), scheduler.capacity());
            log.debug(|w| uwrite!(w, "schedule {}/{}", used, capacity));
        }
        None => log.system(|w| uwrite!(w, "no tasks in schedule")),
    }
}

fn report_task<W: uWrite>(log: &mut Logger<W>, info: &TaskInfo) {
    let timing = match info.timing {
        Timing::Normal => "normal",
        Timing::Forced => "forced",
    };
    let signal = if info.instrumented { "on" } else { "off" };
    let index = info.id.index();

    log.system(|w| {
        uwrite!(&mut *w, "added task {}", index)?;
        if let Some(name) = info.name {
            uwrite!(&mut *w, " ({})", name)?;
        }
        uwrite!(
            w,
            ": offset {}, period {}, {}, signal {}",
            info.offset,
            info.period,
            timing,
            signal
        )
    });
}

/// Ticks serviced so far and how many of them overran the main loop.
pub fn report_runtime<W: uWrite, const N: usize>(log: &mut Logger<W>, state: &TickState<N>) {
    let (ticks, overruns) = (state.ticks(), state.overruns());
    if overruns == 0 {
        log.system(|w| uwrite!(w, "ticks {}, no overruns", ticks));
    } else {
        log.error(|w| uwrite!(w, "ticks {}, overruns {}", ticks, overruns));
    }
}
