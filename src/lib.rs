//! k2-bench library crate: load testing for K2 search command-line clients.
//!
//! Test plans drive `rcvdk`/`rck2` with shuffled queries on a fixed pool of
//! worker threads, parse hit counts and timings from their output, and collect
//! the runs into a sortable, persistable [`Report`].

pub mod command;
pub mod config;
pub mod logging;
pub mod output;
pub mod plan;
pub mod queue;
pub mod report;
pub mod result;
pub mod runner;
pub mod scheduler;

pub use command::{CommandTemplate, CommandVariant, SearchTool, ToolKind};
pub use config::{Config, ConfigError, TestPlanConfig};
pub use plan::TestPlan;
pub use queue::{CommandQueue, WorkItem, WorkQueueSet};
pub use report::{RenderFormat, Report, ReportError, ReportItem, SortField};
pub use result::{CommandError, ExecutionError, ExecutionResult, Outcome};
pub use runner::{ProcessRunner, SystemRunner};
pub use scheduler::Scheduler;
