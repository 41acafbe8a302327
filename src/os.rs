//! Tick interrupt trampoline
//!
//! One scheduler per device: its tick state is a static, and the tick
//! handler returned by [`Scheduler::start`] is bound to a single slot that
//! the TIMER1 compare vector services.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::config::MAX_TASKS;
use crate::error::{Error, Result};
use crate::hal::PowerControl;
use crate::rtos::{TickHandler, TickState};

#[cfg(target_arch = "avr")]
use crate::{
    hal::{Power, TickPeriod, Timer1},
    rtos::Scheduler,
};

/// Tick state backing the firmware's scheduler
pub static TICK_STATE: TickState<MAX_TASKS> = TickState::new();

static TICK_HANDLER: Mutex<RefCell<Option<TickHandler<'static, MAX_TASKS>>>> =
    Mutex::new(RefCell::new(None));

pub fn is_bound() -> bool {
    critical_section::with(|cs| TICK_HANDLER.borrow_ref(cs).is_some())
}

/// Hand `handler` to the tick interrupt. Only the first bind succeeds.
pub fn bind(handler: TickHandler<'static, MAX_TASKS>) -> Result<()> {
    critical_section::with(|cs| {
        let mut slot = TICK_HANDLER.borrow_ref_mut(cs);
        if slot.is_some() {
            return Err(Error::AlreadyBound);
        }
        *slot = Some(handler);
        Ok(())
    })
}

/// Body of the tick vector. A tick with nothing bound is ignored.
pub fn service_tick<P: PowerControl>(power: &mut P) {
    critical_section::with(|cs| {
        if let Some(handler) = TICK_HANDLER.borrow_ref_mut(cs).as_mut() {
            handler.on_tick(power);
        }
    });
}

/// Arm the tick, bind its handler and run the main loop forever.
///
/// Returns only if a handler is already bound, before anything is armed.
#[cfg(target_arch = "avr")]
pub fn run(
    scheduler: Scheduler<'_, MAX_TASKS>,
    timer: &mut Timer1,
    period: TickPeriod,
    power: &mut Power,
) -> Result<core::convert::Infallible> {
    if is_bound() {
        return Err(Error::AlreadyBound);
    }

    avr_device::interrupt::disable();
    let (mut dispatcher, handler) = scheduler.start(timer, period);

    // SAFETY: the task bodies borrowed by `handler` live in callers' frames,
    // and this function never returns once the handler is bound.
    let handler: TickHandler<'static, MAX_TASKS> = unsafe { core::mem::transmute(handler) };
    bind(handler)?;

    unsafe { avr_device::interrupt::enable() };

    loop {
        dispatcher.run_tasks(power);
    }
}
