//! Hardware abstraction for the ATmega328P
//!
//! The encodings (prescalers, sleep modes, clock gating masks) compile on
//! every target. Register access goes through the `avr-device` PAC and only
//! exists on AVR.

pub mod power;
pub mod timer;

#[cfg(target_arch = "avr")]
pub mod gpio;
#[cfg(target_arch = "avr")]
pub mod uart;
#[cfg(target_arch = "avr")]
pub mod watchdog;

// Re-export commonly used types
pub use power::{Peripheral, PeripheralSet, PowerConfig, PowerControl, SleepMode};
pub use timer::{Millis, Prescaler, TickPeriod};

#[cfg(target_arch = "avr")]
pub use gpio::{board, Input, Output, Pin};
#[cfg(target_arch = "avr")]
pub use power::Power;
#[cfg(target_arch = "avr")]
pub use timer::Timer1;
#[cfg(target_arch = "avr")]
pub use uart::Uart;
#[cfg(target_arch = "avr")]
pub use watchdog::Watchdog;
