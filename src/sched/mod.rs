// src/sched/mod.rs

pub mod scheduler;

pub use scheduler::{FrameStats, Scheduler, SchedulerConfig, SchedulerStatus};
