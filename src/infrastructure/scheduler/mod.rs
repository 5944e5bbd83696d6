//! Scheduler - 后台定时任务

mod periodic_task;

pub use periodic_task::PeriodicTask;
