//! Time-triggered cooperative scheduling

pub mod scheduler;
pub mod state;
pub mod task;

pub use scheduler::{Dispatcher, Scheduler, TickHandler, Wake};
pub use state::TickState;
pub use task::{Instrument, Runnable, TaskBuilder, TaskId, TaskInfo, Timing};

/// Count of scheduler ticks.
pub type Ticks = u32;
