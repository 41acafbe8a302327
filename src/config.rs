//! Configuration constants for the scheduler firmware

use crate::hal::PowerConfig;
use crate::logger::LogType;

/// CPU frequency in Hz
pub const CPU_FREQ_HZ: u32 = 16_000_000;

/// UART baud rate
pub const UART_BAUD: u32 = 9600;

/// Length of one scheduler tick in milliseconds
pub const TICK_MS: u16 = 1;

/// Task slots reserved in the static table
pub const MAX_TASKS: usize = 8;

/// Lowest log kind written to the console
#[cfg(feature = "debug")]
pub const LOG_LEVEL: LogType = LogType::Debug;
#[cfg(not(feature = "debug"))]
pub const LOG_LEVEL: LogType = LogType::System;

/// Clocks gated while the core idles between ticks
pub const POWER_CONFIG: PowerConfig = PowerConfig::new();
