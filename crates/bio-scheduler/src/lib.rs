//! Job scheduler: submission persists the job and hands the computation to a background task.

mod task;
mod trait_;

pub use task::TaskScheduler;
pub use trait_::{Scheduler, SchedulerError};
