//! Error codes for scheduler setup and the tick hardware

use ufmt::{uDisplay, uWrite, uwrite, Formatter};

use crate::rtos::Ticks;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// `begin` asked for zero slots or more than the static table holds.
    CapacityAllocation { requested: usize, available: usize },
    /// Registration after every slot is taken.
    TooManyTasks { capacity: usize },
    /// A task period of zero ticks.
    InvalidPeriod,
    /// An initial offset outside `0..period`.
    InvalidOffset { offset: Ticks, period: Ticks },
    /// TIMER1 cannot produce a tick of this length.
    TickPeriodOutOfRange { millis: u16 },
    /// The interrupt trampoline already services a tick handler.
    AlreadyBound,
    /// `begin` on a tick state another scheduler already owns.
    StateInUse,
}

impl Error {
    /// Numeric code reported on the console, grouped like the
    /// firmware's diagnostic ranges.
    pub const fn code(&self) -> u16 {
        match self {
            Error::CapacityAllocation { .. } => 0x6001,
            Error::TooManyTasks { .. } => 0x6002,
            Error::InvalidPeriod => 0x5001,
            Error::InvalidOffset { .. } => 0x5002,
            Error::TickPeriodOutOfRange { .. } => 0x5003,
            Error::AlreadyBound => 0x8001,
            Error::StateInUse => 0x8002,
        }
    }

    /// Fatal errors leave nothing to schedule; the tick must not be armed.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::CapacityAllocation { .. }
                | Error::TickPeriodOutOfRange { .. }
                | Error::StateInUse
        )
    }
}

impl uDisplay for Error {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> core::result::Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        match *self {
            Error::CapacityAllocation {
                requested,
                available,
            } => uwrite!(
                f,
                "cannot reserve {} task slots ({} available)",
                requested,
                available
            ),
            Error::TooManyTasks { capacity } => {
                uwrite!(f, "too many tasks, schedule holds {}", capacity)
            }
            Error::InvalidPeriod => f.write_str("task period must be at least one tick"),
            Error::InvalidOffset { offset, period } => {
                uwrite!(f, "offset {} out of range for period {}", offset, period)
            }
            Error::TickPeriodOutOfRange { millis } => {
                uwrite!(f, "tick of {}ms out of TIMER1 range", millis)
            }
            Error::AlreadyBound => f.write_str("tick handler already bound"),
            Error::StateInUse => f.write_str("tick state already owned by a scheduler"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let alloc = Error::CapacityAllocation {
            requested: 9,
            available: 8,
        };
        assert!(alloc.is_fatal());
        assert!(Error::StateInUse.is_fatal());
        assert!(!Error::TooManyTasks { capacity: 1 }.is_fatal());
        assert!(!Error::InvalidPeriod.is_fatal());
    }

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            Error::CapacityAllocation {
                requested: 0,
                available: 0,
            },
            Error::TooManyTasks { capacity: 0 },
            Error::InvalidPeriod,
            Error::InvalidOffset {
                offset: 0,
                period: 0,
            },
            Error::TickPeriodOutOfRange { millis: 0 },
            Error::AlreadyBound,
            Error::StateInUse,
        ];
        for (i, a) in errors.iter().enumerate() {
            for b in &errors[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn test_display() {
        let mut out = std::string::String::new();
        uwrite!(&mut out, "{}", Error::TooManyTasks { capacity: 1 }).unwrap();
        assert_eq!(out, "too many tasks, schedule holds 1");
    }
}
