//! Scheduler firmware for the Arduino Uno
//!
//! On AVR this blinks the on-board LED from a normal task, strobes D8 from
//! a forced task with D12 as its timing signal, and reports tick statistics
//! on the serial console. Built for the host it replays the same kind of
//! schedule against simulated hardware and prints each dispatch.

#![cfg_attr(target_arch = "avr", no_std)]
#![cfg_attr(target_arch = "avr", no_main)]
#![cfg_attr(target_arch = "avr", feature(abi_avr_interrupt))]

#[cfg(target_arch = "avr")]
mod firmware {
    use panic_halt as _;

    use embedded_hal::digital::v2::ToggleableOutputPin;
    use tt_scheduler::config::{LOG_LEVEL, MAX_TASKS, POWER_CONFIG, TICK_MS};
    use tt_scheduler::diagnostics::{report_added_task, report_error, report_runtime};
    use tt_scheduler::drivers::SerialConsole;
    use tt_scheduler::hal::{board, Millis, Power, TickPeriod, Timer1, Watchdog};
    use tt_scheduler::logger::Logger;
    use tt_scheduler::os;
    use tt_scheduler::rtos::{Scheduler, TaskBuilder};
    use tt_scheduler::Error;
    use ufmt::uwrite;

    /// Report `error` on a fresh console handle and stop.
    fn halt(error: Error) -> ! {
        let mut log = Logger::new(SerialConsole::new(), LOG_LEVEL);
        report_error(&mut log, error);
        log.sink_mut().flush();
        avr_device::interrupt::disable();
        #[allow(clippy::empty_loop)]
        loop {}
    }

    #[avr_device::entry]
    fn main() -> ! {
        let mut watchdog = Watchdog::new();
        let watchdog_reset = watchdog.caused_reset();
        watchdog.disable();

        let mut log = Logger::new(SerialConsole::new(), LOG_LEVEL);
        log.system(|w| uwrite!(w, "tt_scheduler {}", env!("CARGO_PKG_VERSION")));
        if watchdog_reset {
            log.error(|w| uwrite!(w, "reset by watchdog"));
        }

        let period = TickPeriod::try_from(Millis(TICK_MS)).unwrap_or_else(|e| halt(e));

        let mut led = board::D13::new().into_output();
        let mut strobe = board::D8::new().into_output();
        let mut signal = board::D12::new().into_output();

        let mut heartbeat = move || {
            led.toggle().ok();
        };
        let mut strobe_task = move || {
            strobe.toggle().ok();
        };
        let mut status;

        let mut scheduler =
            Scheduler::begin(&os::TICK_STATE, MAX_TASKS).unwrap_or_else(|e| halt(e));

        if let Err(error) = scheduler.add_task(&mut heartbeat, 500, 0) {
            halt(error);
        }
        report_added_task(&mut log, &scheduler);

        let strobe_added = TaskBuilder::new(&mut strobe_task)
            .name("strobe")
            .period(10)
            .offset(3)
            .forced()
            .instrument(&mut signal)
            .build(&mut scheduler);
        if let Err(error) = strobe_added {
            halt(error);
        }
        report_added_task(&mut log, &scheduler);

        // Takes the console for good, so it is registered last
        status = || report_runtime(&mut log, &os::TICK_STATE);
        if let Err(error) = scheduler.add_task(&mut status, 5000, 4999) {
            halt(error);
        }

        let mut power = Power::new(POWER_CONFIG);
        match os::run(scheduler, &mut Timer1::new(), period, &mut power) {
            Ok(never) => match never {},
            Err(error) => halt(error),
        }
    }

    #[avr_device::interrupt(atmega328p)]
    fn TIMER1_COMPA() {
        os::service_tick(&mut Power::new(POWER_CONFIG));
    }
}

#[cfg(not(target_arch = "avr"))]
fn main() {
    host::simulate(20);
}

#[cfg(not(target_arch = "avr"))]
mod host {
    use core::convert::Infallible;

    use embedded_hal::timer::CountDown;
    use tt_scheduler::diagnostics::{report_added_task, report_error, report_runtime};
    use tt_scheduler::logger::{LogType, Logger};
    use tt_scheduler::rtos::{Scheduler, TaskBuilder, TickState, Wake};
    use tt_scheduler::testing::{ManualTick, PowerState, SimPower};
    use tt_scheduler::Result;
    use ufmt::{uWrite, uwrite};

    struct Stdout;

    impl uWrite for Stdout {
        type Error = Infallible;

        fn write_str(&mut self, s: &str) -> core::result::Result<(), Infallible> {
            print!("{}", s);
            Ok(())
        }
    }

    /// Run a three-task schedule for `ticks` ticks and print every dispatch.
    pub fn simulate(ticks: u32) {
        let mut log = Logger::new(Stdout, LogType::Debug);
        if let Err(error) = run(&mut log, ticks) {
            report_error(&mut log, error);
        }
    }

    fn run(log: &mut Logger<Stdout>, ticks: u32) -> Result<()> {
        let state = TickState::<4>::new();
        let now = || state.ticks() - 1;

        let mut a = || println!("tick {:>3}: A", now());
        let mut b = || println!("tick {:>3}: B", now());
        let mut strobe = || println!("tick {:>3}: strobe (in tick handler)", now());

        let mut scheduler = Scheduler::begin(&state, 4)?;
        scheduler.add_task(&mut a, 3, 0)?;
        report_added_task(log, &scheduler);
        scheduler.add_task(&mut b, 5, 2)?;
        report_added_task(log, &scheduler);
        TaskBuilder::new(&mut strobe)
            .name("strobe")
            .period(4)
            .offset(1)
            .forced()
            .build(&mut scheduler)?;
        report_added_task(log, &scheduler);

        let mut tick = ManualTick::new();
        let (mut dispatcher, mut handler) = scheduler.start(&mut tick, 1u16);

        let board = PowerState::new();
        let mut isr = || {
            tick.fire();
            if tick.wait().is_ok() {
                handler.on_tick(&mut SimPower::new(&board));
            }
        };
        let mut power = SimPower::new(&board).on_sleep(&mut isr);

        for _ in 0..ticks {
            if let Wake::Spurious = dispatcher.run_tasks(&mut power) {
                log.debug(|w| uwrite!(w, "spurious wake"));
            }
        }
        drop(power);
        drop(isr);

        report_runtime(log, &state);
        Ok(())
    }
}
