//! JSON-lines event handler
//!
//! Writes every event as one JSON object per line, for consumption by
//! scripts and other programs. Each object gets a `timestamp` field in
//! seconds since the Unix epoch.

use super::{EventHandler, JobEvent, JobEventKind};
use serde_json::Value;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Event handler that prints events as JSON lines.
pub struct JsonEventHandler {
    output: Mutex<Box<dyn Write + Send>>,
    include_frames: bool,
}

impl JsonEventHandler {
    /// Create a handler that writes to stdout
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    /// Create a handler with a custom writer
    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            output: Mutex::new(writer),
            include_frames: false,
        }
    }

    /// Also emit the informational frame counter events.
    #[must_use]
    pub fn include_frames(mut self, include: bool) -> Self {
        self.include_frames = include;
        self
    }

    fn timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    fn write_json(&self, value: &Value) {
        if let Ok(mut output) = self.output.lock() {
            if let Ok(json_str) = serde_json::to_string(value) {
                let _ = writeln!(output, "{json_str}");
                let _ = output.flush();
            }
        }
    }
}

impl Default for JsonEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for JsonEventHandler {
    fn handle(&self, event: &JobEvent) {
        if !self.include_frames && matches!(event.kind, JobEventKind::Frame { .. }) {
            return;
        }

        match serde_json::to_value(event) {
            Ok(mut value) => {
                if let Value::Object(map) = &mut value {
                    map.insert("timestamp".to_string(), Value::from(Self::timestamp()));
                }
                self.write_json(&value);
            }
            Err(e) => log::warn!("Could not serialise event {:?}: {}", event, e),
        }
    }
}
