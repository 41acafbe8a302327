//! Host stand-ins for the tick timer and the power controller
//!
//! Used by the unit and integration tests and by the host simulation in
//! the firmware binary. Nothing here touches hardware.

use core::cell::Cell;

use embedded_hal::timer::{CountDown, Periodic};
use void::Void;

use crate::hal::{Millis, PowerConfig, PowerControl};

/// Tick source advanced by hand.
#[derive(Debug, Default)]
pub struct ManualTick {
    armed: Option<Millis>,
    pending: u32,
}

impl ManualTick {
    pub const fn new() -> Self {
        Self {
            armed: None,
            pending: 0,
        }
    }

    /// Period passed to the last `start`, if it was armed.
    pub fn armed(&self) -> Option<Millis> {
        self.armed
    }

    /// Let one period elapse. Ignored until armed.
    pub fn fire(&mut self) {
        if self.armed.is_some() {
            self.pending += 1;
        }
    }
}

impl CountDown for ManualTick {
    type Time = Millis;

    fn start<T>(&mut self, count: T)
    where
        T: Into<Millis>,
    {
        self.armed = Some(count.into());
        self.pending = 0;
    }

    fn wait(&mut self) -> nb::Result<(), Void> {
        if self.pending == 0 {
            return Err(nb::Error::WouldBlock);
        }
        self.pending -= 1;
        Ok(())
    }
}

impl Periodic for ManualTick {}

/// What a simulated MCU's SMCR and PRR would hold.
#[derive(Debug, Default)]
pub struct PowerState {
    masked: Cell<bool>,
    sleep_enabled: Cell<bool>,
    gated: Cell<u8>,
    sleeps: Cell<u32>,
    wakes: Cell<u32>,
}

impl PowerState {
    pub const fn new() -> Self {
        Self {
            masked: Cell::new(false),
            sleep_enabled: Cell::new(false),
            gated: Cell::new(0),
            sleeps: Cell::new(0),
            wakes: Cell::new(0),
        }
    }

    /// Whether interrupts are globally masked.
    pub fn masked(&self) -> bool {
        self.masked.get()
    }

    pub fn sleep_enabled(&self) -> bool {
        self.sleep_enabled.get()
    }

    /// Clock domains currently gated, as PRR bits.
    pub fn gated(&self) -> u8 {
        self.gated.get()
    }

    pub fn sleeps(&self) -> u32 {
        self.sleeps.get()
    }

    pub fn wakes(&self) -> u32 {
        self.wakes.get()
    }
}

/// [`PowerControl`] over a [`PowerState`].
///
/// `sleep_with` calls the closure given to [`SimPower::on_sleep`], standing in
/// for whatever interrupt ends the sleep. Without one, every sleep wakes
/// spuriously.
pub struct SimPower<'a> {
    board: &'a PowerState,
    config: PowerConfig,
    interrupt: Option<&'a mut dyn FnMut()>,
}

impl<'a> SimPower<'a> {
    pub fn new(board: &'a PowerState) -> Self {
        Self {
            board,
            config: PowerConfig::default(),
            interrupt: None,
        }
    }

    pub fn with_config(mut self, config: PowerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn on_sleep(mut self, interrupt: &'a mut dyn FnMut()) -> Self {
        self.interrupt = Some(interrupt);
        self
    }
}

impl PowerControl for SimPower<'_> {
    fn prepare_sleep(&mut self) {
        self.board.sleep_enabled.set(true);
        self.board
            .gated
            .set(self.board.gated.get() | self.config.gated().bits());
    }

    fn sleep_with<F: FnOnce()>(&mut self, before: F) {
        self.board.masked.set(true);
        before();
        self.board.masked.set(false);
        self.board.sleeps.set(self.board.sleeps.get() + 1);
        if let Some(interrupt) = self.interrupt.as_deref_mut() {
            interrupt();
        }
    }

    fn wake(&mut self) {
        self.board.sleep_enabled.set(false);
        self.board
            .gated
            .set(self.board.gated.get() & !self.config.gated().bits());
        self.board.wakes.set(self.board.wakes.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{Peripheral, PeripheralSet};
    use core::cell::RefCell;
    use std::vec::Vec;

    #[test]
    fn test_manual_tick_counts_fires() {
        let mut tick = ManualTick::new();
        tick.fire();
        tick.start(5u16);
        assert_eq!(tick.armed(), Some(Millis(5)));
        assert!(tick.wait().is_err());
        tick.fire();
        tick.fire();
        assert!(tick.wait().is_ok());
        assert!(tick.wait().is_ok());
        assert!(tick.wait().is_err());
    }

    #[test]
    fn test_sim_power_gates_and_restores() {
        let board = PowerState::new();
        let config = PowerConfig::gating(PeripheralSet::EMPTY.with(Peripheral::Adc));
        let mut power = SimPower::new(&board).with_config(config);

        power.prepare_sleep();
        assert!(board.sleep_enabled());
        assert_eq!(board.gated(), Peripheral::Adc.mask());
        power.sleep_with(|| {});
        power.wake();
        assert!(!board.sleep_enabled());
        assert_eq!(board.gated(), 0);
        assert_eq!((board.sleeps(), board.wakes()), (1, 1));
    }

    #[test]
    fn test_sleep_runs_interrupt_after_unmasking() {
        let board = PowerState::new();
        let order = RefCell::new(Vec::new());
        let mut isr = || order.borrow_mut().push(("isr", board.masked()));
        let mut power = SimPower::new(&board).on_sleep(&mut isr);
        power.sleep_with(|| order.borrow_mut().push(("before", board.masked())));
        power.sleep_with(|| {});
        drop(power);
        drop(isr);
        assert_eq!(
            order.into_inner(),
            [("before", true), ("isr", false), ("isr", false)]
        );
        assert!(!board.masked());
    }
}
