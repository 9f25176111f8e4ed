//! Build progress reporting.
//!
//! `luat build` reports what it is parsing, how many units are being
//! embedded, and which index is being written. Progress is emitted on
//! **stderr** so stdout stays reserved for the final status line.

use std::io::Write;

/// A single progress event for the build pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum BuildProgressEvent {
    /// Document `n` of `total` is being parsed.
    Parsing { file: String, n: u64, total: u64 },
    /// The debug export is being written.
    Exporting { dir: String },
    /// `n` of `total` units have been embedded.
    Embedding { n: u64, total: u64 },
    /// An index is being written (`"vector"` or `"keyword"`).
    Writing { index: String, units: u64 },
}

/// Reports build progress. Implementations write to stderr (human or JSON).
pub trait BuildProgressReporter: Send + Sync {
    fn report(&self, event: BuildProgressEvent);
}

/// Human-friendly progress: "build  embedding  1,234 / 5,000 units".
pub struct StderrProgress;

impl BuildProgressReporter for StderrProgress {
    fn report(&self, event: BuildProgressEvent) {
        let line = match &event {
            BuildProgressEvent::Parsing { file, n, total } => {
                format!(
                    "build  parsing  {} / {}  {}\n",
                    format_number(*n),
                    format_number(*total),
                    file
                )
            }
            BuildProgressEvent::Exporting { dir } => {
                format!("build  exporting debug data to {}\n", dir)
            }
            BuildProgressEvent::Embedding { n, total } => {
                format!(
                    "build  embedding  {} / {} units\n",
                    format_number(*n),
                    format_number(*total)
                )
            }
            BuildProgressEvent::Writing { index, units } => {
                format!(
                    "build  writing {} index  {} units\n",
                    index,
                    format_number(*units)
                )
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BuildProgressReporter for JsonProgress {
    fn report(&self, event: BuildProgressEvent) {
        let obj = event_json(&event);
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn event_json(event: &BuildProgressEvent) -> serde_json::Value {
    match event {
        BuildProgressEvent::Parsing { file, n, total } => serde_json::json!({
            "event": "progress",
            "phase": "parsing",
            "file": file,
            "n": n,
            "total": total
        }),
        BuildProgressEvent::Exporting { dir } => serde_json::json!({
            "event": "progress",
            "phase": "exporting",
            "dir": dir
        }),
        BuildProgressEvent::Embedding { n, total } => serde_json::json!({
            "event": "progress",
            "phase": "embedding",
            "n": n,
            "total": total
        }),
        BuildProgressEvent::Writing { index, units } => serde_json::json!({
            "event": "progress",
            "phase": "writing",
            "index": index,
            "units": units
        }),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BuildProgressReporter for NoProgress {
    fn report(&self, _event: BuildProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn BuildProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn json_event_shape() {
        let v = event_json(&BuildProgressEvent::Embedding { n: 8, total: 20 });
        assert_eq!(v["phase"], "embedding");
        assert_eq!(v["n"], 8);
        assert_eq!(v["total"], 20);
    }
}
