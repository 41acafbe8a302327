//! Type-state output pins for ports B, C and D

use core::convert::Infallible;
use core::marker::PhantomData;

use avr_device::atmega328p::{PORTB, PORTC, PORTD};
use embedded_hal::digital::v2::{OutputPin, ToggleableOutputPin};

/// Reset state
pub struct Input;
pub struct Output;

/// Register access for one I/O port, by bit mask
pub trait Port {
    fn make_output(mask: u8);
    fn set(mask: u8);
    fn clear(mask: u8);
    fn toggle(mask: u8);
}

macro_rules! impl_port {
    ($PORT:ident, $pin:ident, $ddr:ident, $port:ident) => {
        impl Port for $PORT {
            #[inline]
            fn make_output(mask: u8) {
                unsafe {
                    (*$PORT::ptr()).$ddr.modify(|r, w| w.bits(r.bits() | mask));
                }
            }

            #[inline]
            fn set(mask: u8) {
                unsafe {
                    (*$PORT::ptr()).$port.modify(|r, w| w.bits(r.bits() | mask));
                }
            }

            #[inline]
            fn clear(mask: u8) {
                unsafe {
                    (*$PORT::ptr()).$port.modify(|r, w| w.bits(r.bits() & !mask));
                }
            }

            /// Writing one to PINx flips the output latch in a single store.
            #[inline]
            fn toggle(mask: u8) {
                unsafe {
                    (*$PORT::ptr()).$pin.write(|w| w.bits(mask));
                }
            }
        }
    };
}

impl_port!(PORTB, pinb, ddrb, portb);
impl_port!(PORTC, pinc, ddrc, portc);
impl_port!(PORTD, pind, ddrd, portd);

#[derive(Debug)]
pub struct Pin<PORT, const N: u8, MODE> {
    _port: PhantomData<PORT>,
    _mode: PhantomData<MODE>,
}

impl<PORT: Port, const N: u8> Pin<PORT, N, Input> {
    /// Pin in its reset state. Construct each pin once.
    pub const fn new() -> Self {
        Pin {
            _port: PhantomData,
            _mode: PhantomData,
        }
    }

    pub fn into_output(self) -> Pin<PORT, N, Output> {
        PORT::make_output(1 << N);
        Pin {
            _port: PhantomData,
            _mode: PhantomData,
        }
    }
}

impl<PORT: Port, const N: u8> OutputPin for Pin<PORT, N, Output> {
    type Error = Infallible;

    #[inline]
    fn set_high(&mut self) -> Result<(), Infallible> {
        // The tick handler may drive pins on the same port
        avr_device::interrupt::free(|_| PORT::set(1 << N));
        Ok(())
    }

    #[inline]
    fn set_low(&mut self) -> Result<(), Infallible> {
        avr_device::interrupt::free(|_| PORT::clear(1 << N));
        Ok(())
    }
}

impl<PORT: Port, const N: u8> ToggleableOutputPin for Pin<PORT, N, Output> {
    type Error = Infallible;

    fn toggle(&mut self) -> Result<(), Infallible> {
        PORT::toggle(1 << N);
        Ok(())
    }
}

/// Arduino Uno header pins
pub mod board {
    use super::*;

    pub type D8 = Pin<PORTB, 0, Input>;
    pub type D12 = Pin<PORTB, 4, Input>;
    /// On-board LED
    pub type D13 = Pin<PORTB, 5, Input>;
}
