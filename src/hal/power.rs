//! Sleep and peripheral clock gating
//!
//! Between ticks the core idles. TIMER1 drives the tick, so only idle sleep
//! keeps it running, and its clock is never gated.

/// Sleep modes selectable through SMCR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SleepMode {
    Idle = 0,
    AdcNoiseReduction = 1,
    PowerDown = 2,
    PowerSave = 3,
    Standby = 6,
    ExtendedStandby = 7,
}

impl SleepMode {
    /// SM bits for this mode, already shifted into place.
    pub const fn bits(self) -> u8 {
        (self as u8) << 1
    }

    /// Whether the I/O clock, and with it TIMER1, keeps running.
    pub const fn keeps_timer1(self) -> bool {
        matches!(self, SleepMode::Idle)
    }
}

/// Clock domains in the power reduction register, by bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Peripheral {
    Adc = 0,
    Usart0 = 1,
    Spi = 2,
    Timer1 = 3,
    Timer0 = 5,
    Timer2 = 6,
    Twi = 7,
}

impl Peripheral {
    pub const fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

/// Set of clock domains, laid out like PRR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeripheralSet(u8);

impl PeripheralSet {
    pub const EMPTY: Self = Self(0);

    pub const fn with(self, peripheral: Peripheral) -> Self {
        Self(self.0 | peripheral.mask())
    }

    pub const fn without(self, peripheral: Peripheral) -> Self {
        Self(self.0 & !peripheral.mask())
    }

    pub const fn contains(self, peripheral: Peripheral) -> bool {
        self.0 & peripheral.mask() != 0
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// What to gate while the core sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerConfig {
    mode: SleepMode,
    gated: PeripheralSet,
}

impl PowerConfig {
    /// Idle sleep with the ADC, SPI, TIMER0 and TWI clocks gated.
    pub const fn new() -> Self {
        Self::gating(
            PeripheralSet::EMPTY
                .with(Peripheral::Adc)
                .with(Peripheral::Spi)
                .with(Peripheral::Timer0)
                .with(Peripheral::Twi),
        )
    }

    /// Gate `set` during sleep. TIMER1 is dropped from the set.
    pub const fn gating(set: PeripheralSet) -> Self {
        Self {
            mode: SleepMode::Idle,
            gated: set.without(Peripheral::Timer1),
        }
    }

    pub const fn mode(&self) -> SleepMode {
        self.mode
    }

    pub const fn gated(&self) -> PeripheralSet {
        self.gated
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Low-power hooks the dispatcher and tick handler drive.
pub trait PowerControl {
    /// Select the sleep mode and gate the configured clocks.
    fn prepare_sleep(&mut self);

    /// Mask interrupts, run `before`, then unmask and halt until the next
    /// interrupt as one indivisible step.
    ///
    /// An interrupt pending while `before` runs is taken only once the
    /// core is asleep, so it always ends this sleep.
    fn sleep_with<F: FnOnce()>(&mut self, before: F);

    /// Clear sleep enable and restore the clocks gated for sleep. First
    /// thing the tick interrupt does.
    fn wake(&mut self);
}

#[cfg(target_arch = "avr")]
mod mcu {
    use avr_device::atmega328p::CPU;
    use avr_device::interrupt;

    use super::{Peripheral, PeripheralSet, PowerConfig, PowerControl, SleepMode};

    /// SMCR sleep enable bit
    const SE: u8 = 1 << 0;
    /// SMCR SM[2:0]
    const SM_MASK: u8 = 0x0E;

    /// SMCR and PRR of the running MCU
    pub struct Power {
        config: PowerConfig,
    }

    impl Power {
        pub const fn new(config: PowerConfig) -> Self {
            Self { config }
        }

        #[inline]
        pub fn set_sleep_mode(&mut self, mode: SleepMode) {
            unsafe {
                let p = CPU::ptr();
                (*p).smcr
                    .modify(|r, w| w.bits((r.bits() & !SM_MASK) | mode.bits()));
            }
        }

        #[inline]
        pub fn enable_sleep(&mut self) {
            unsafe {
                let p = CPU::ptr();
                (*p).smcr.modify(|r, w| w.bits(r.bits() | SE));
            }
        }

        #[inline]
        pub fn disable_sleep(&mut self) {
            unsafe {
                let p = CPU::ptr();
                (*p).smcr.modify(|r, w| w.bits(r.bits() & !SE));
            }
        }

        /// Stop the clocks in `set`. TIMER1 is never stopped.
        pub fn disable_clocks(&mut self, set: PeripheralSet) {
            let mask = set.without(Peripheral::Timer1).bits();
            unsafe {
                let p = CPU::ptr();
                (*p).prr.modify(|r, w| w.bits(r.bits() | mask));
            }
        }

        pub fn enable_clocks(&mut self, set: PeripheralSet) {
            unsafe {
                let p = CPU::ptr();
                (*p).prr.modify(|r, w| w.bits(r.bits() & !set.bits()));
            }
        }
    }

    impl Default for Power {
        fn default() -> Self {
            Self::new(PowerConfig::default())
        }
    }

    impl PowerControl for Power {
        fn prepare_sleep(&mut self) {
            self.set_sleep_mode(self.config.mode());
            self.enable_sleep();
            self.disable_clocks(self.config.gated());
        }

        #[inline(always)]
        fn sleep_with<F: FnOnce()>(&mut self, before: F) {
            interrupt::disable();
            before();
            // The instruction after sei always runs before a pending interrupt
            unsafe { interrupt::enable() };
            avr_device::asm::sleep();
        }

        fn wake(&mut self) {
            self.disable_sleep();
            self.enable_clocks(self.config.gated());
        }
    }
}

#[cfg(target_arch = "avr")]
pub use mcu::Power;
