use core::convert::Infallible;

use ufmt::uWrite;

use crate::config::UART_BAUD;
use crate::hal::Uart;

/// Write-only text console on USART0
pub struct SerialConsole {
    uart: Uart,
}

impl SerialConsole {
    pub fn new() -> Self {
        Self {
            uart: Uart::new(UART_BAUD),
        }
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.uart.write_byte(byte);
    }

    /// Block until everything written so far is on the wire.
    pub fn flush(&mut self) {
        self.uart.flush();
    }
}

impl uWrite for SerialConsole {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
        s.bytes().for_each(|b| self.write_byte(b));
        Ok(())
    }
}

impl Default for SerialConsole {
    fn default() -> Self {
        Self::new()
    }
}
