//! Best-effort extraction of hit counts and elapsed time from tool output.

use regex::Regex;
use tracing::debug;

/// Elapsed time reported when the tool output carries no timing line.
pub const DEFAULT_ELAPSED_MS: u64 = 1;

/// Extraction patterns for one tool family. Built once, shared read-only.
#[derive(Debug)]
pub struct OutputPatterns {
    /// Captures `(hits, searched)`, or only `(searched)` when hits are not reported
    pub hit_count: Regex,
    /// Captures the elapsed milliseconds
    pub elapsed_time: Regex,
}

impl OutputPatterns {
    pub fn new(hit_count: &str, elapsed_time: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            hit_count: Regex::new(hit_count)?,
            elapsed_time: Regex::new(elapsed_time)?,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParsedOutput {
    pub elapsed_ms: u64,
    pub documents_searched: u64,
    pub hits: u64,
    pub hits_defaulted: bool,
    pub elapsed_defaulted: bool,
}

/// Parse tool output. Only the last match of each pattern counts; tools print
/// interim progress lines before the final summary.
pub fn parse_output(patterns: &OutputPatterns, text: &str) -> ParsedOutput {
    let mut parsed = ParsedOutput::default();

    match patterns.hit_count.captures_iter(text).last() {
        Some(caps) => {
            let first = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok());
            let second = caps.get(2).and_then(|m| m.as_str().parse::<u64>().ok());
            match (first, second) {
                (Some(hits), Some(searched)) => {
                    parsed.hits = hits;
                    parsed.documents_searched = searched;
                }
                (Some(searched), None) | (None, Some(searched)) => {
                    parsed.documents_searched = searched;
                    parsed.hits_defaulted = true;
                }
                (None, None) => parsed.hits_defaulted = true,
            }
        }
        None => {
            debug!("hit-count pattern did not match tool output");
            parsed.hits_defaulted = true;
        }
    }

    match patterns
        .elapsed_time
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
    {
        Some(ms) => parsed.elapsed_ms = ms,
        None => {
            debug!("elapsed-time pattern did not match tool output");
            parsed.elapsed_ms = DEFAULT_ELAPSED_MS;
            parsed.elapsed_defaulted = true;
        }
    }

    parsed
}
