use std::io::{self, Write};
use std::time::Duration;

use serde::Serialize;

use crate::metadata::ArticleRecord;
use crate::pipeline::{FetchResult, ProgressEvent, ProgressSink};

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchResult) -> io::Result<()> {
        Self::print_json(&result.package)
    }

    pub fn print_record(record: &ArticleRecord) -> io::Result<()> {
        Self::print_json(record)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Phase lines on stderr, for runs without `--quiet`.
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        let line = match event.elapsed {
            Some(elapsed) => format!("{} ({})", event.message, format_elapsed(elapsed)),
            None => event.message,
        };
        let _ = writeln!(io::stderr(), "{line}");
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}
