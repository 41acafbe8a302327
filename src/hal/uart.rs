//! Blocking transmit on USART0
//!
//! Only TX is wired up; the console is write-only.

use core::convert::Infallible;

use avr_device::atmega328p::USART0;
use embedded_hal::serial;

use crate::config::CPU_FREQ_HZ;

const TXEN0: u8 = 1 << 3;
const UDRE0: u8 = 1 << 5;
const TXC0: u8 = 1 << 6;
/// Asynchronous, 8 data bits, no parity, one stop bit
const FRAME_8N1: u8 = 0x06;

/// UBRR0 for normal-speed asynchronous mode
pub const fn ubrr(cpu_hz: u32, baud: u32) -> u16 {
    (cpu_hz / (16 * baud) - 1) as u16
}

pub struct Uart {
    _private: (),
}

impl Uart {
    pub fn new(baud: u32) -> Self {
        unsafe {
            let p = USART0::ptr();
            (*p).ubrr0.write(|w| w.bits(ubrr(CPU_FREQ_HZ, baud)));
            (*p).ucsr0c.write(|w| w.bits(FRAME_8N1));
            (*p).ucsr0b.write(|w| w.bits(TXEN0));
        }
        Self { _private: () }
    }

    pub fn write_byte(&mut self, byte: u8) {
        nb::block!(serial::Write::write(self, byte)).ok();
    }

    /// Wait until the last byte has left the shift register.
    pub fn flush(&mut self) {
        nb::block!(serial::Write::flush(self)).ok();
    }
}

impl serial::Write<u8> for Uart {
    type Error = Infallible;

    fn write(&mut self, byte: u8) -> nb::Result<(), Infallible> {
        unsafe {
            let p = USART0::ptr();
            if (*p).ucsr0a.read().bits() & UDRE0 == 0 {
                return Err(nb::Error::WouldBlock);
            }
            // Writing one clears TXC0 so flush sees this byte
            (*p).ucsr0a.modify(|r, w| w.bits(r.bits() | TXC0));
            (*p).udr0.write(|w| w.bits(byte));
        }
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Infallible> {
        unsafe {
            if (*USART0::ptr()).ucsr0a.read().bits() & TXC0 == 0 {
                Err(nb::Error::WouldBlock)
            } else {
                Ok(())
            }
        }
    }
}
