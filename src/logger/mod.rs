//! Tagged line logging over any `ufmt` sink

use ufmt::{uDisplay, uWrite, Formatter};

/// Severity, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogType {
    Debug = 0,
    System = 1,
    Error = 2,
}

impl LogType {
    pub const fn tag(self) -> &'static str {
        match self {
            LogType::Debug => "[DBG]",
            LogType::System => "[SYS]",
            LogType::Error => "[ERR]",
        }
    }
}

/// `0x` and four upper-case hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hex(pub u16);

impl uDisplay for Hex {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

        f.write_str("0x")?;
        for shift in [12, 8, 4, 0] {
            let nibble = usize::from((self.0 >> shift) & 0xF);
            f.write_char(char::from(DIGITS[nibble]))?;
        }
        Ok(())
    }
}

/// Writes `[TAG] message\r\n` lines, skipping anything below `level`.
///
/// Never call from interrupt context: writes to the serial console block
/// until the UART drains.
pub struct Logger<W: uWrite> {
    sink: W,
    level: LogType,
    emitted: u32,
    dropped: u32,
}

impl<W: uWrite> Logger<W> {
    pub fn new(sink: W, level: LogType) -> Self {
        Self {
            sink,
            level,
            emitted: 0,
            dropped: 0,
        }
    }

    pub fn set_level(&mut self, level: LogType) {
        self.level = level;
    }

    pub fn system<F>(&mut self, message: F)
    where
        F: FnOnce(&mut W) -> Result<(), W::Error>,
    {
        self.log(LogType::System, message)
    }

    pub fn error<F>(&mut self, message: F)
    where
        F: FnOnce(&mut W) -> Result<(), W::Error>,
    {
        self.log(LogType::Error, message)
    }

    pub fn debug<F>(&mut self, message: F)
    where
        F: FnOnce(&mut W) -> Result<(), W::Error>,
    {
        self.log(LogType::Debug, message)
    }

    /// Filtered entries and entries the sink refused both count as dropped.
    pub fn log<F>(&mut self, log_type: LogType, message: F)
    where
        F: FnOnce(&mut W) -> Result<(), W::Error>,
    {
        if log_type < self.level {
            self.dropped = self.dropped.wrapping_add(1);
            return;
        }

        match self.write_line(log_type, message) {
            Ok(()) => self.emitted = self.emitted.wrapping_add(1),
            Err(_) => self.dropped = self.dropped.wrapping_add(1),
        }
    }

    fn write_line<F>(&mut self, log_type: LogType, message: F) -> Result<(), W::Error>
    where
        F: FnOnce(&mut W) -> Result<(), W::Error>,
    {
        self.sink.write_str(log_type.tag())?;
        self.sink.write_char(' ')?;
        message(&mut self.sink)?;
        self.sink.write_str("\r\n")
    }

    pub fn emitted(&self) -> u32 {
        self.emitted
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;
    use ufmt::uwrite;

    /// Accepts `room` bytes, then refuses everything.
    struct Cramped {
        room: usize,
    }

    impl uWrite for Cramped {
        type Error = ();

        fn write_str(&mut self, s: &str) -> Result<(), ()> {
            self.room = self.room.checked_sub(s.len()).ok_or(())?;
            Ok(())
        }
    }

    #[test]
    fn test_tagged_lines() {
        let mut log = Logger::new(String::new(), LogType::Debug);
        log.system(|w| uwrite!(w, "boot"));
        log.error(|w| uwrite!(w, "code {}", Hex(0x6002)));
        assert_eq!(log.sink(), "[SYS] boot\r\n[ERR] code 0x6002\r\n");
        assert_eq!(log.emitted(), 2);
    }

    #[test]
    fn test_level_filter() {
        let mut log = Logger::new(String::new(), LogType::System);
        log.debug(|w| uwrite!(w, "hidden"));
        log.system(|w| uwrite!(w, "shown"));
        assert_eq!(log.sink(), "[SYS] shown\r\n");
        assert_eq!((log.emitted(), log.dropped()), (1, 1));

        log.set_level(LogType::Debug);
        log.debug(|w| uwrite!(w, "now shown"));
        assert_eq!(log.emitted(), 2);
    }

    #[test]
    fn test_refused_write_counts_as_dropped() {
        let mut log = Logger::new(Cramped { room: 8 }, LogType::Debug);
        log.system(|w| uwrite!(w, "much too long for the sink"));
        assert_eq!((log.emitted(), log.dropped()), (0, 1));
    }

    #[test]
    fn test_hex_is_padded_upper_case() {
        let mut out = String::new();
        uwrite!(&mut out, "{} {}", Hex(0xA), Hex(0x8001)).unwrap();
        assert_eq!(out, "0x000A 0x8001");
    }
}
