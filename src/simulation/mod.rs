pub mod alarm;
pub mod commands;
pub mod game_loop;
pub mod metrics;
pub mod tick;

pub use alarm::{Alarm, AlarmContext, AlarmOwner, AlarmRegistry};
pub use commands::{Command, Commands};
pub use game_loop::{GameLoop, LoopState, Simulation};
pub use metrics::TickMetrics;
pub use tick::{run_simulation_tick, Stepper, TickReport};
