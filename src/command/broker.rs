//! `rcvdk`: search collections through the broker servers.

use std::sync::OnceLock;

use super::{Binding, OutputPatterns, SearchTool};

pub const TOOL_NAME: &str = "rcvdk";
const PARAM_PREFIX: &str = "-";
const HIT_COUNT_PATTERN: &str = r"Retrieved:\s+\d+\((\d+)\)/(\d+)";
const ELAPSED_TIME_PATTERN: &str = r"Elapsed time is (\d+) milliseconds";

static PATTERNS: OnceLock<OutputPatterns> = OnceLock::new();

fn patterns() -> &'static OutputPatterns {
    PATTERNS.get_or_init(|| {
        OutputPatterns::new(HIT_COUNT_PATTERN, ELAPSED_TIME_PATTERN)
            .expect("rcvdk output patterns are valid")
    })
}

#[derive(Clone, Debug)]
pub struct BrokerClient {
    binding: Binding,
    patterns: &'static OutputPatterns,
}

impl BrokerClient {
    pub fn new(binding: Binding) -> Self {
        Self {
            binding,
            patterns: patterns(),
        }
    }
}

impl SearchTool for BrokerClient {
    fn tool_name(&self) -> &str {
        TOOL_NAME
    }

    fn param_prefix(&self) -> &str {
        PARAM_PREFIX
    }

    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn patterns(&self) -> &OutputPatterns {
        self.patterns
    }

    /// Attach each collection, switch to the result-set view, then search.
    fn input_script(&self) -> String {
        let mut script = String::new();
        for collection in &self.binding.collections {
            script.push_str(&format!("a {collection}\n"));
        }
        script.push_str("x\ns\nt\n");
        script.push_str(&format!("s {}\n", self.binding.query));
        script
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(collections: &[&str], source_query: Option<&str>) -> BrokerClient {
        BrokerClient::new(Binding {
            params: vec![],
            collections: collections.iter().map(|c| c.to_string()).collect(),
            query: "apple pie".into(),
            source_query: source_query.map(str::to_string),
        })
    }

    #[test]
    fn script_adds_collections_then_searches() {
        let script = client(&["coll_a", "coll_b"], None).input_script();
        assert_eq!(script, "a coll_a\na coll_b\nx\ns\nt\ns apple pie\n");
    }

    #[test]
    fn source_query_is_not_sent_to_broker() {
        let script = client(&["coll_a"], Some("'vol' in <DBALIAS>")).input_script();
        assert!(!script.contains("DBALIAS"));
    }

    #[test]
    fn instances_share_patterns() {
        let a = client(&[], None);
        let b = client(&[], None);
        assert!(std::ptr::eq(a.patterns(), b.patterns()));
    }
}
