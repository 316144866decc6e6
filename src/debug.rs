use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: BufWriter<File>,
    // (job, counter) so parallel jobs keep separate totals.
    counters: BTreeMap<(String, String), u64>,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: BufWriter::new(file),
                counters: BTreeMap::new(),
            })),
        })
    }

    pub fn log_json(&self, json: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn event(&self, kind: &str, job: &str, fields: serde_json::Value) {
        let mut record = serde_json::Map::new();
        record.insert("type".to_string(), kind.into());
        record.insert("job".to_string(), job.into());
        if let serde_json::Value::Object(extra) = fields {
            record.extend(extra);
        }
        self.log_json(&serde_json::Value::Object(record).to_string());
        self.increment(job, kind, 1);
    }

    pub fn increment(&self, job: &str, key: &str, amount: u64) {
        if amount == 0 {
            return;
        }
        if let Ok(mut state) = self.inner.lock() {
            let entry = state
                .counters
                .entry((job.to_string(), key.to_string()))
                .or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    pub fn emit_summary(&self, job: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let keys: Vec<(String, String)> = state
                .counters
                .keys()
                .filter(|(owner, _)| owner == job)
                .cloned()
                .collect();
            let mut counts = String::from("{");
            for (idx, key) in keys.iter().enumerate() {
                let value = state.counters.remove(key).unwrap_or(0);
                if idx > 0 {
                    counts.push(',');
                }
                counts.push_str(&format!("\"{}\":{}", json_escape(&key.1), value));
            }
            counts.push('}');
            let json = format!(
                "{{\"type\":\"debug.summary\",\"job\":\"{}\",\"counts\":{}}}",
                json_escape(job),
                counts
            );
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

pub(crate) fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(ch),
        }
    }
    out
}
