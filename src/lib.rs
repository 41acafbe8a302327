//! Time-triggered cooperative task scheduler for the ATmega328P
//!
//! A periodic TIMER1 interrupt counts every task down. Normal tasks run
//! to completion from the main loop after each tick; forced tasks run
//! inside the interrupt itself. Between ticks the core idles with unused
//! peripheral clocks gated.
//!
//! ```ignore
//! let mut scheduler = Scheduler::begin(&os::TICK_STATE, 2)?;
//! scheduler.add_task(&mut blink, 500, 0)?;
//! TaskBuilder::new(&mut servo).period(20).forced().build(&mut scheduler)?;
//! os::run(scheduler, &mut Timer1::new(), TickPeriod::try_from(Millis(1))?, &mut power)
//! ```

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod hal;
pub mod logger;
pub mod os;
pub mod rtos;
pub mod testing;

#[cfg(target_arch = "avr")]
pub mod drivers;

pub use error::{Error, Result};
