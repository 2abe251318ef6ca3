//! `rck2`: search collections directly on the file system.

use std::sync::OnceLock;

use super::{Binding, OutputPatterns, SearchTool};

pub const TOOL_NAME: &str = "rck2";
const PARAM_PREFIX: &str = "-";
const HIT_COUNT_PATTERN: &str = r"Retrieved:\(\d+\)(\d+)\sof\s(\d+)";
const ELAPSED_TIME_PATTERN: &str = r"Elapsed time:(\d+)\(ms\)";

static PATTERNS: OnceLock<OutputPatterns> = OnceLock::new();

fn patterns() -> &'static OutputPatterns {
    PATTERNS.get_or_init(|| {
        OutputPatterns::new(HIT_COUNT_PATTERN, ELAPSED_TIME_PATTERN)
            .expect("rck2 output patterns are valid")
    })
}

#[derive(Clone, Debug)]
pub struct DirectClient {
    binding: Binding,
    patterns: &'static OutputPatterns,
}

impl DirectClient {
    pub fn new(binding: Binding) -> Self {
        Self {
            binding,
            patterns: patterns(),
        }
    }
}

impl SearchTool for DirectClient {
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

    fn applied_source_query(&self) -> Option<&str> {
        self.binding.refinement()
    }

    fn input_script(&self) -> String {
        let mut script = String::from("c\n");
        for collection in &self.binding.collections {
            script.push_str(&format!("s {collection}\n"));
        }
        if let Some(refinement) = self.binding.refinement() {
            script.push_str(refinement);
            script.push('\n');
        }
        script.push_str(&format!("s {}\n", self.binding.query));
        script.push_str("q\n");
        script
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(source_query: Option<&str>) -> DirectClient {
        DirectClient::new(Binding {
            params: vec![],
            collections: vec!["/ver/coll11".into(), "/ver/coll12".into()],
            query: "invoice".into(),
            source_query: source_query.map(str::to_string),
        })
    }

    #[test]
    fn script_with_source_query() {
        let script = client(Some("'bpvolume' in <DBALIAS>")).input_script();
        assert_eq!(
            script,
            "c\ns /ver/coll11\ns /ver/coll12\n'bpvolume' in <DBALIAS>\ns invoice\nq\n"
        );
    }

    #[test]
    fn empty_source_query_adds_no_line() {
        let without = client(None).input_script();
        assert_eq!(without, client(Some("")).input_script());
        assert_eq!(without, "c\ns /ver/coll11\ns /ver/coll12\ns invoice\nq\n");
    }

    #[test]
    fn parses_rck2_summary() {
        let text = "Retrieved:(1)7 of 300\nRetrieved:(2)19 of 1500\nElapsed time:233(ms)\n";
        let parsed = client(None).parse_output(text);
        assert_eq!(parsed.hits, 19);
        assert_eq!(parsed.documents_searched, 1500);
        assert_eq!(parsed.elapsed_ms, 233);
    }
}
