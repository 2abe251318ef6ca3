//! Sinks for rendered report rows.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::report::{RenderFormat, Report, ReportSummary};

pub struct OutputWriter {
    sink: Box<dyn Write + Send>,
    format: RenderFormat,
}

impl OutputWriter {
    pub fn new_stdout(format: RenderFormat) -> Self {
        Self::from_writer(io::stdout(), format)
    }

    pub fn new_file(path: impl AsRef<Path>, format: RenderFormat) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(BufWriter::new(file), format))
    }

    pub fn from_writer(sink: impl Write + Send + 'static, format: RenderFormat) -> Self {
        Self {
            sink: Box::new(sink),
            format,
        }
    }

    pub fn format(&self) -> RenderFormat {
        self.format
    }

    /// Header line, then one line per report item in current order.
    pub fn write_report(&mut self, report: &Report) -> io::Result<()> {
        writeln!(self.sink, "{}", Report::header(self.format))?;
        for line in report.render(self.format) {
            writeln!(self.sink, "{line}")?;
        }
        self.sink.flush()
    }

    pub fn write_summary(&mut self, summary: &ReportSummary) -> io::Result<()> {
        writeln!(self.sink, "{}", ReportSummary::csv_header())?;
        writeln!(self.sink, "{}", summary.to_csv_row())?;
        self.sink.flush()
    }
}
