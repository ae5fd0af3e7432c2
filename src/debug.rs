use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

/// JSON-lines event log. Each call writes one object per line; counters are
/// folded into a single `debug.summary` record when the summary is emitted.
#[derive(Clone)]
pub(crate) struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: Box<dyn Write + Send>,
    counters: BTreeMap<String, u64>,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }

    pub(crate) fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: Box::new(writer),
                counters: BTreeMap::new(),
            })),
        }
    }

    pub fn log_event(&self, event: Value) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{event}");
        }
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let counts = std::mem::take(&mut state.counters);
            let event = json!({
                "type": "debug.summary",
                "context": context,
                "counts": counts,
            });
            let _ = writeln!(state.writer, "{event}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    /// In-memory sink shared between a logger and the test reading it back.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
            String::from_utf8_lossy(&bytes)
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| serde_json::from_str(l).expect("json line"))
                .collect()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .map_err(|_| io::Error::other("poisoned"))?
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::SharedBuffer;
    use super::*;

    #[test]
    fn summary_collects_counters_in_key_order() {
        let buffer = SharedBuffer::default();
        let logger = DebugLogger::from_writer(buffer.clone());
        logger.log_event(json!({"type": "layout.grid", "columns": 2}));
        logger.increment("text.overflow", 2);
        logger.increment("font.fallback", 1);
        logger.increment("text.overflow", 1);
        logger.emit_summary("render");
        logger.flush();

        let lines = buffer.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "layout.grid");
        assert_eq!(lines[1]["type"], "debug.summary");
        assert_eq!(lines[1]["context"], "render");
        assert_eq!(lines[1]["counts"]["text.overflow"], 3);
        let keys: Vec<&String> = lines[1]["counts"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["font.fallback", "text.overflow"]);
    }

    #[test]
    fn summary_resets_counters() {
        let buffer = SharedBuffer::default();
        let logger = DebugLogger::from_writer(buffer.clone());
        logger.increment("a", 1);
        logger.emit_summary("first");
        logger.emit_summary("second");
        let lines = buffer.lines();
        assert_eq!(lines[1]["counts"], json!({}));
    }
}
