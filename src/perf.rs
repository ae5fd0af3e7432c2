use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::json;

/// Phase timings for the render pipeline, written as JSON lines.
///
/// When the logger was opened on a file, dropping the last handle writes a
/// `<stem>_hot.log` next to it with spans ranked by total time.
#[derive(Clone)]
pub(crate) struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

struct PerfState {
    writer: Box<dyn Write + Send>,
    path: Option<PathBuf>,
    span_totals: HashMap<String, f64>,
    span_counts: HashMap<String, u64>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self::with_state(Box::new(BufWriter::new(file)), Some(path)))
    }

    #[cfg(test)]
    pub(crate) fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self::with_state(Box::new(writer), None)
    }

    fn with_state(writer: Box<dyn Write + Send>, path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer,
                path,
                span_totals: HashMap::new(),
                span_counts: HashMap::new(),
            })),
        }
    }

    pub fn log_span_ms(&self, name: &str, page: Option<usize>, ms: f64) {
        let event = json!({
            "type": "perf.span",
            "name": name,
            "page": page,
            "unit": "ms",
            "ms": (ms * 1000.0).round() / 1000.0,
        });
        if let Ok(mut state) = self.inner.lock() {
            *state.span_totals.entry(name.to_string()).or_insert(0.0) += ms;
            let entry = state.span_counts.entry(name.to_string()).or_insert(0);
            *entry = entry.saturating_add(1);
            let _ = writeln!(state.writer, "{event}");
        }
    }

    pub fn log_counts(&self, name: &str, counts: &[(&str, u64)]) {
        let counts: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(key, value)| (key.to_string(), json!(value)))
            .collect();
        let event = json!({
            "type": "perf.counts",
            "name": name,
            "counts": counts,
        });
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{event}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

/// Starts a wall-clock span. Pass the result to [`elapsed_ms`].
pub(crate) fn start() -> Instant {
    Instant::now()
}

pub(crate) fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

impl Drop for PerfState {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        let Some(path) = self.path.as_ref() else {
            return;
        };
        let Ok(file) = File::create(hot_path_for(path)) else {
            return;
        };
        let mut writer = BufWriter::new(file);

        let mut spans: Vec<(&String, &f64)> = self.span_totals.iter().collect();
        spans.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (rank, (name, ms)) in spans.into_iter().enumerate() {
            let count = *self.span_counts.get(name).unwrap_or(&1);
            let avg = if count == 0 { 0.0 } else { ms / count as f64 };
            let event = json!({
                "type": "perf.hot.span",
                "rank": rank + 1,
                "name": name,
                "unit": "ms",
                "ms": ms,
                "count": count,
                "avg_ms": avg,
            });
            let _ = writeln!(writer, "{event}");
        }
    }
}

fn hot_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("coupon_sheet_perf.log");
    let stem = file_name
        .rsplit_once('.')
        .map(|(s, _)| s)
        .unwrap_or(file_name);
    path.with_file_name(format!("{stem}_hot.log"))
}
