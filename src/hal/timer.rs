//! TIMER1 in CTC mode as the scheduler tick
//!
//! The counter clears on compare match A and raises `TIMER1_COMPA` once per
//! tick. [`TickPeriod::from_millis`] picks the finest prescaler whose
//! compare value still fits in 16 bits.

use crate::config::CPU_FREQ_HZ;
use crate::error::{Error, Result};

/// Tick length in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Millis(pub u16);

impl From<u16> for Millis {
    fn from(ms: u16) -> Self {
        Millis(ms)
    }
}

/// TIMER1 clock select, CS1[2:0]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Prescaler {
    Stop = 0,
    Direct = 1,
    Div8 = 2,
    Div64 = 3,
    Div256 = 4,
    Div1024 = 5,
}

impl Prescaler {
    const RUNNING: [Prescaler; 5] = [
        Prescaler::Direct,
        Prescaler::Div8,
        Prescaler::Div64,
        Prescaler::Div256,
        Prescaler::Div1024,
    ];

    pub const fn divisor(self) -> u32 {
        match self {
            Prescaler::Stop => 0,
            Prescaler::Direct => 1,
            Prescaler::Div8 => 8,
            Prescaler::Div64 => 64,
            Prescaler::Div256 => 256,
            Prescaler::Div1024 => 1024,
        }
    }
}

/// Clock select and compare value for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPeriod {
    prescaler: Prescaler,
    compare: u16,
}

impl TickPeriod {
    pub fn from_millis(ms: Millis, cpu_hz: u32) -> Result<Self> {
        let cycles = u64::from(cpu_hz) * u64::from(ms.0) / 1000;

        Prescaler::RUNNING
            .iter()
            .find_map(|&prescaler| {
                let counts = cycles / u64::from(prescaler.divisor());
                let compare = u16::try_from(counts.checked_sub(1)?).ok()?;
                Some(TickPeriod { prescaler, compare })
            })
            .ok_or(Error::TickPeriodOutOfRange { millis: ms.0 })
    }

    pub const fn prescaler(&self) -> Prescaler {
        self.prescaler
    }

    pub const fn compare(&self) -> u16 {
        self.compare
    }
}

impl TryFrom<Millis> for TickPeriod {
    type Error = Error;

    fn try_from(ms: Millis) -> Result<Self> {
        TickPeriod::from_millis(ms, CPU_FREQ_HZ)
    }
}

#[cfg(target_arch = "avr")]
mod timer1 {
    use avr_device::atmega328p::TC1;
    use embedded_hal::timer::{CountDown, Periodic};
    use void::Void;

    use super::{Prescaler, TickPeriod};

    const WGM12: u8 = 1 << 3;
    const OCIE1A: u8 = 1 << 1;
    const OCF1A: u8 = 1 << 1;

    /// TIMER1 as a periodic compare-match source
    pub struct Timer1 {
        _private: (),
    }

    impl Timer1 {
        /// Stop the counter and mask its compare interrupt.
        pub fn new() -> Self {
            let mut timer = Self { _private: () };
            timer.stop();
            timer
        }

        pub fn stop(&mut self) {
            unsafe {
                let p = TC1::ptr();
                (*p).tccr1b.write(|w| w.bits(Prescaler::Stop as u8));
                (*p).timsk1.modify(|r, w| w.bits(r.bits() & !OCIE1A));
            }
        }
    }

    impl Default for Timer1 {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CountDown for Timer1 {
        type Time = TickPeriod;

        fn start<T>(&mut self, count: T)
        where
            T: Into<TickPeriod>,
        {
            let period = count.into();

            avr_device::interrupt::free(|_| unsafe {
                let p = TC1::ptr();
                (*p).tccr1a.write(|w| w.bits(0));
                (*p).tccr1b.write(|w| w.bits(0));
                (*p).tcnt1.write(|w| w.bits(0));
                (*p).ocr1a.write(|w| w.bits(period.compare()));
                (*p).tifr1.write(|w| w.bits(OCF1A));
                (*p).timsk1.modify(|r, w| w.bits(r.bits() | OCIE1A));
                (*p).tccr1b
                    .write(|w| w.bits(WGM12 | period.prescaler() as u8));
            });
        }

        /// Only meaningful while polling; the compare vector clears the
        /// flag itself once interrupts are enabled.
        fn wait(&mut self) -> nb::Result<(), Void> {
            unsafe {
                let p = TC1::ptr();
                if (*p).tifr1.read().bits() & OCF1A != 0 {
                    (*p).tifr1.write(|w| w.bits(OCF1A));
                    Ok(())
                } else {
                    Err(nb::Error::WouldBlock)
                }
            }
        }
    }

    impl Periodic for Timer1 {}
}

#[cfg(target_arch = "avr")]
pub use timer1::Timer1;

#[cfg(test)]
mod tests {
    use super::*;

    const UNO: u32 = 16_000_000;

    #[test]
    fn test_one_millisecond_runs_undivided() {
        let period = TickPeriod::from_millis(Millis(1), UNO).unwrap();
        assert_eq!(period.prescaler(), Prescaler::Direct);
        assert_eq!(period.compare(), 15_999);
    }

    #[test]
    fn test_smallest_prescaler_that_fits() {
        let period = TickPeriod::from_millis(Millis(10), UNO).unwrap();
        assert_eq!(period.prescaler(), Prescaler::Div8);
        assert_eq!(period.compare(), 19_999);

        let period = TickPeriod::from_millis(Millis(1000), UNO).unwrap();
        assert_eq!(period.prescaler(), Prescaler::Div256);
        assert_eq!(period.compare(), 62_499);
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(
            TickPeriod::from_millis(Millis(0), UNO),
            Err(Error::TickPeriodOutOfRange { millis: 0 })
        );
        assert!(TickPeriod::from_millis(Millis(4000), UNO).is_ok());
        assert_eq!(
            TickPeriod::from_millis(Millis(5000), UNO),
            Err(Error::TickPeriodOutOfRange { millis: 5000 })
        );
    }

    #[test]
    fn test_try_from_uses_board_clock() {
        let period = TickPeriod::try_from(Millis(1)).unwrap();
        assert_eq!(period, TickPeriod::from_millis(Millis(1), CPU_FREQ_HZ).unwrap());
    }
}
