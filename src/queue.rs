//! Work sources: shuffled query queues and the closable command queue.

use std::collections::VecDeque;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::command::{CommandTemplate, CommandVariant};
use crate::config::TestPlanConfig;

/// One queued, fully bound command. `id` is its position in the fill order.
#[derive(Clone, Debug)]
pub struct WorkItem {
    pub id: usize,
    pub command: CommandVariant,
}

/// Multi-consumer FIFO of work items.
///
/// Once every sender is dropped the queue is closed: [`CommandQueue::recv`]
/// hands out the remaining items and then returns `None`, so "is there more
/// work" and "take it" are a single operation.
#[derive(Clone, Debug)]
pub struct CommandQueue {
    rx: flume::Receiver<WorkItem>,
}

impl CommandQueue {
    /// An open queue; it closes when the returned sender (and its clones) drop.
    pub fn channel() -> (flume::Sender<WorkItem>, Self) {
        let (tx, rx) = flume::unbounded();
        (tx, Self { rx })
    }

    /// A closed queue holding exactly `items`.
    pub fn from_items(items: impl IntoIterator<Item = WorkItem>) -> Self {
        let (tx, queue) = Self::channel();
        for item in items {
            // Cannot fail: the receiver is alive in `queue`.
            let _ = tx.send(item);
        }
        queue
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Non-blocking pop; `None` when nothing is queued right now.
    pub fn take(&self) -> Option<WorkItem> {
        self.rx.try_recv().ok()
    }

    /// Blocking pop; `None` once the queue is drained and closed.
    pub fn recv(&self) -> Option<WorkItem> {
        self.rx.recv().ok()
    }
}

/// Query and source-query queues for one test plan.
pub struct WorkQueueSet {
    queries: Vec<String>,
    source_queries: Vec<String>,
    query_queue: VecDeque<String>,
    source_query_queue: VecDeque<String>,
    rng: StdRng,
}

impl WorkQueueSet {
    /// `seed` makes the shuffles reproducible.
    pub fn new(queries: Vec<String>, source_queries: Vec<String>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            queries,
            source_queries,
            query_queue: VecDeque::new(),
            source_query_queue: VecDeque::new(),
            rng,
        }
    }

    pub fn from_config(config: &TestPlanConfig) -> Self {
        Self::new(
            config.queries.clone(),
            config.source_queries.clone(),
            config.seed,
        )
    }

    fn shuffled(&mut self, list: &[String]) -> Vec<String> {
        let mut copy = list.to_vec();
        copy.shuffle(&mut self.rng);
        copy
    }

    /// Enqueue one random permutation of the source queries.
    pub fn fill_source_queries(&mut self) {
        let source_queries = self.source_queries.clone();
        let shuffled = self.shuffled(&source_queries);
        self.source_query_queue.extend(shuffled);
    }

    /// Enqueue freshly shuffled copies of the query list until at least
    /// `target` queries are queued. The last copy is not trimmed.
    pub fn fill_queries(&mut self, target: usize) {
        if self.queries.is_empty() {
            if target > 0 {
                warn!("No queries configured; nothing will be queued");
            }
            return;
        }
        let queries = self.queries.clone();
        while self.query_queue.len() < target {
            let shuffled = self.shuffled(&queries);
            self.query_queue.extend(shuffled);
        }
    }

    pub fn take_query(&mut self) -> Option<String> {
        self.query_queue.pop_front()
    }

    pub fn take_source_query(&mut self) -> Option<String> {
        self.source_query_queue.pop_front()
    }

    pub fn query_len(&self) -> usize {
        self.query_queue.len()
    }

    pub fn source_query_len(&self) -> usize {
        self.source_query_queue.len()
    }

    /// Bind up to `target` commands from the queued queries. Stops early if the
    /// query queue runs dry. Once the source queries run out, later items get none.
    pub fn build_command_queue(&mut self, target: usize, template: &CommandTemplate) -> CommandQueue {
        let mut items = Vec::with_capacity(target);
        while items.len() < target {
            let Some(query) = self.take_query() else {
                warn!(
                    queued = items.len(),
                    target, "Query queue exhausted before reaching the execution target"
                );
                break;
            };
            let source_query = self.take_source_query();
            items.push(WorkItem {
                id: items.len(),
                command: template.bind(query, source_query),
            });
        }
        debug!(items = items.len(), "Command queue loaded");
        CommandQueue::from_items(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ToolKind;
    use proptest::prelude::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn template() -> CommandTemplate {
        CommandTemplate::new(ToolKind::DirectClient, vec![], strings(&["coll"]))
    }

    #[test]
    fn source_queries_are_a_single_permutation() {
        let mut set = WorkQueueSet::new(strings(&["q"]), strings(&["a", "b", "c"]), Some(1));
        set.fill_source_queries();
        assert_eq!(set.source_query_len(), 3);
        let mut drained: Vec<String> = std::iter::from_fn(|| set.take_source_query()).collect();
        drained.sort();
        assert_eq!(drained, strings(&["a", "b", "c"]));
        assert_eq!(set.take_source_query(), None);
    }

    #[test]
    fn query_fill_overshoots_by_whole_copies() {
        let mut set = WorkQueueSet::new(strings(&["a", "b", "c"]), vec![], Some(9));
        set.fill_queries(4);
        assert_eq!(set.query_len(), 6);
    }

    #[test]
    fn later_items_run_without_source_query() {
        let mut set = WorkQueueSet::new(strings(&["a", "b"]), strings(&["only"]), Some(3));
        set.fill_source_queries();
        set.fill_queries(3);
        let queue = set.build_command_queue(3, &template());
        let items: Vec<WorkItem> = std::iter::from_fn(|| queue.take()).collect();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].command.source_query(), Some("only"));
        assert!(items[1..].iter().all(|i| i.command.source_query().is_none()));
    }

    #[test]
    fn exhausted_query_queue_stops_short() {
        let mut set = WorkQueueSet::new(strings(&["a", "b"]), vec![], Some(4));
        set.fill_queries(2);
        let queue = set.build_command_queue(5, &template());
        assert_eq!(queue.len(), 2);
        let items: Vec<WorkItem> = std::iter::from_fn(|| queue.take()).collect();
        assert!(items.iter().all(|i| !i.command.query().is_empty()));

        let mut empty = WorkQueueSet::new(vec![], strings(&["s"]), Some(4));
        empty.fill_queries(3);
        assert!(empty.build_command_queue(3, &template()).is_empty());
    }

    #[test]
    fn same_seed_same_order() {
        let run = || {
            let mut set = WorkQueueSet::new(strings(&["a", "b", "c", "d"]), vec![], Some(42));
            set.fill_queries(8);
            std::iter::from_fn(|| set.take_query()).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn closed_queue_recv_drains_then_ends() {
        let mut set = WorkQueueSet::new(strings(&["a"]), vec![], Some(0));
        set.fill_queries(2);
        let queue = set.build_command_queue(2, &template());
        assert_eq!(queue.len(), 2);
        assert!(queue.recv().is_some());
        assert!(queue.recv().is_some());
        assert!(queue.recv().is_none());
        assert!(queue.take().is_none());
    }

    proptest! {
        #[test]
        fn command_queue_has_exactly_target_items(
            queries in prop::collection::vec("[a-z]{1,6}", 1..6),
            source_queries in prop::collection::vec("[A-Z]{1,6}", 0..4),
            target in 0usize..40,
            seed in any::<u64>(),
        ) {
            let mut set = WorkQueueSet::new(queries.clone(), source_queries.clone(), Some(seed));
            set.fill_source_queries();
            set.fill_queries(target);
            let queue = set.build_command_queue(target, &template());
            prop_assert_eq!(queue.len(), target);
            let items: Vec<WorkItem> = std::iter::from_fn(|| queue.take()).collect();
            prop_assert_eq!(items.len(), target);
            for item in &items {
                prop_assert!(queries.iter().any(|q| q == item.command.query()));
                if let Some(sq) = item.command.source_query() {
                    prop_assert!(source_queries.iter().any(|s| s == sq));
                }
            }
        }
    }
}
