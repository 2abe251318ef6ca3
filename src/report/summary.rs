use hdrhistogram::Histogram;

use super::{Report, ReportError};

// 1ms to 1h, 3 significant digits
const LATENCY_MS_MAX: u64 = 3_600_000;

/// Latency and hit totals over every completed row of a report.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportSummary {
    pub count: usize,
    pub failures: usize,
    pub defaulted: usize,
    pub total_hits: u64,
    pub total_searched: u64,
    pub latency_ms_min: u64,
    pub latency_ms_p50: u64,
    pub latency_ms_p95: u64,
    pub latency_ms_p99: u64,
    pub latency_ms_max: u64,
    pub latency_ms_mean: f64,
}

impl ReportSummary {
    pub fn completed(&self) -> usize {
        self.count - self.failures
    }

    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{:.2}",
            self.count,
            self.failures,
            self.defaulted,
            self.total_hits,
            self.total_searched,
            self.latency_ms_min,
            self.latency_ms_p50,
            self.latency_ms_p95,
            self.latency_ms_p99,
            self.latency_ms_max,
            self.latency_ms_mean
        )
    }

    pub fn csv_header() -> &'static str {
        "count,failures,defaulted,total_hits,total_searched,latency_ms_min,latency_ms_p50,latency_ms_p95,latency_ms_p99,latency_ms_max,latency_ms_mean"
    }
}

impl Report {
    /// Summarise the report. Failed rows count as failures and carry no latency.
    pub fn summary(&self) -> Result<ReportSummary, ReportError> {
        let mut hist = Histogram::<u64>::new_with_bounds(1, LATENCY_MS_MAX, 3)
            .map_err(|e| ReportError::Histogram(e.to_string()))?;
        let mut failures = 0;
        let mut defaulted = 0;
        let mut total_hits = 0u64;
        let mut total_searched = 0u64;

        for item in self.items() {
            if item.is_failure() {
                failures += 1;
                continue;
            }
            if item.defaulted {
                defaulted += 1;
            }
            total_hits += item.hits.unwrap_or(0);
            total_searched += item.documents_searched.unwrap_or(0);
            if let Some(ms) = item.elapsed_ms {
                hist.saturating_record(ms.max(1));
            }
        }

        Ok(ReportSummary {
            count: self.len(),
            failures,
            defaulted,
            total_hits,
            total_searched,
            // empty histograms report u64::MAX as their minimum
            latency_ms_min: if hist.is_empty() { 0 } else { hist.min() },
            latency_ms_p50: hist.value_at_quantile(0.5),
            latency_ms_p95: hist.value_at_quantile(0.95),
            latency_ms_p99: hist.value_at_quantile(0.99),
            latency_ms_max: hist.max(),
            latency_ms_mean: hist.mean(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportItem;
    use chrono::Utc;

    fn row(elapsed_ms: u64, hits: u64, failed: bool) -> ReportItem {
        ReportItem {
            date: Utc::now(),
            query: "q".into(),
            source_query: None,
            elapsed_ms: (!failed).then_some(elapsed_ms),
            documents_searched: (!failed).then_some(1000),
            hits: (!failed).then_some(hits),
            defaulted: false,
            failure: failed.then(|| "exit 1".to_string()),
            output: String::new(),
        }
    }

    #[test]
    fn summarises_completed_rows() {
        let mut report = Report::new();
        for ms in 1..=100 {
            report.add(row(ms, 2, false));
        }
        report.add(row(0, 0, true));
        let summary = report.summary().expect("summary");
        assert_eq!(summary.count, 101);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.completed(), 100);
        assert_eq!(summary.total_hits, 200);
        assert_eq!(summary.total_searched, 100_000);
        assert_eq!(summary.latency_ms_min, 1);
        assert_eq!(summary.latency_ms_max, 100);
        assert_eq!(summary.latency_ms_p50, 50);
        assert!((summary.latency_ms_mean - 50.5).abs() < 0.01);
    }

    #[test]
    fn csv_row_matches_header() {
        let summary = Report::new().summary().expect("summary");
        assert_eq!(summary.count, 0);
        assert_eq!(summary.latency_ms_min, 0);
        let header_cols = ReportSummary::csv_header().split(',').count();
        assert_eq!(summary.to_csv_row().split(',').count(), header_cols);
    }
}
