//! Watchdog control
//!
//! A watchdog left armed by a bootloader or a previous reset would reset
//! the board between ticks, so setup turns it off before anything else.

use avr_device::atmega328p::{CPU, WDT};

const WDRF: u8 = 1 << 3;
const WDE: u8 = 1 << 3;
const WDCE: u8 = 1 << 4;

pub struct Watchdog {
    _private: (),
}

impl Watchdog {
    #[inline]
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Whether the last reset came from the watchdog.
    pub fn caused_reset(&self) -> bool {
        unsafe { (*CPU::ptr()).mcusr.read().bits() & WDRF != 0 }
    }

    #[inline]
    pub fn feed(&mut self) {
        avr_device::asm::wdr();
    }

    /// Timed sequence: WDCE and WDE, then zero within four cycles. WDRF
    /// must be cleared first or WDE stays forced on.
    pub fn disable(&mut self) {
        avr_device::interrupt::free(|_| {
            self.feed();
            unsafe {
                (*CPU::ptr()).mcusr.modify(|r, w| w.bits(r.bits() & !WDRF));
                let p = WDT::ptr();
                (*p).wdtcsr.modify(|r, w| w.bits(r.bits() | WDCE | WDE));
                (*p).wdtcsr.write(|w| w.bits(0));
            }
        });
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}
