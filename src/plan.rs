//! Test plan runner: fill the queues, run the pool, hand back the outcomes.

use std::io;
use std::sync::Arc;

use tracing::info;

use crate::config::TestPlanConfig;
use crate::queue::WorkQueueSet;
use crate::result::Outcome;
use crate::runner::ProcessRunner;
use crate::scheduler::Scheduler;

pub struct TestPlan {
    config: TestPlanConfig,
}

impl TestPlan {
    pub fn new(config: TestPlanConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TestPlanConfig {
        &self.config
    }

    /// Execute `max_executions` commands on `threads` workers.
    pub fn run(&self, runner: Arc<dyn ProcessRunner>) -> io::Result<Vec<Outcome>> {
        let config = &self.config;
        info!(
            plan = %config.name,
            tool = %config.command.kind,
            threads = config.threads,
            executions = config.max_executions,
            collections = config.collections.len(),
            "Starting test plan"
        );

        let mut queues = WorkQueueSet::from_config(config);
        queues.fill_source_queries();
        queues.fill_queries(config.max_executions);
        let commands =
            queues.build_command_queue(config.max_executions, &config.command_template());

        let outcomes = Scheduler::start(commands, runner, config.threads)?.join();
        let failures = outcomes.iter().filter(|o| o.is_err()).count();
        info!(
            plan = %config.name,
            results = outcomes.len(),
            failures,
            "Test plan complete"
        );
        Ok(outcomes)
    }
}

/// Run plans one after another and concatenate their outcomes.
pub fn run_all(plans: &[TestPlan], runner: Arc<dyn ProcessRunner>) -> io::Result<Vec<Outcome>> {
    let mut outcomes = Vec::new();
    for plan in plans {
        outcomes.extend(plan.run(Arc::clone(&runner))?);
    }
    Ok(outcomes)
}
