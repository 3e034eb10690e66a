//! Single-line record codec shared by the status and guard stores.
//!
//! A record is one line of three tab-separated fields: a fixed tag, the
//! epoch-millisecond write timestamp, and a non-negative value. Anything
//! else is treated as corruption by the caller.

use std::time::Duration;

use chrono::Utc;

/// Fixed literal tag marking a record line as ours.
pub const RECORD_TAG: &str = "srh:";

/// One parsed record line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLine {
    /// Epoch milliseconds at write time.
    pub timestamp_ms: i64,
    /// The stored value (phase index or guard count).
    pub value: u32,
}

impl RecordLine {
    /// Build a record stamped with the current time.
    pub fn now(value: u32) -> Self {
        Self {
            timestamp_ms: Utc::now().timestamp_millis(),
            value,
        }
    }

    /// Age of the record measured against its own timestamp. Records from
    /// the future (clock skew) count as age zero.
    pub fn age(&self) -> Duration {
        let elapsed_ms = Utc::now().timestamp_millis() - self.timestamp_ms;
        Duration::from_millis(elapsed_ms.max(0) as u64)
    }

    /// Encode as the on-disk line, trailing newline included.
    pub fn encode(&self) -> String {
        format!("{RECORD_TAG}\t{}\t{}\n", self.timestamp_ms, self.value)
    }

    /// Parse a record line. Returns a human-readable reason on failure; the
    /// caller decides whether that is fatal (status store) or tolerated
    /// (guard store).
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            return Err("empty record".to_string());
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 3 {
            return Err(format!(
                "expected 3 tab-separated fields, found {}",
                fields.len()
            ));
        }
        if fields[0] != RECORD_TAG {
            return Err(format!("unrecognized tag '{}'", fields[0]));
        }

        let timestamp_ms = fields[1]
            .parse::<i64>()
            .map_err(|_| format!("invalid timestamp '{}'", fields[1]))?;
        let value = fields[2]
            .parse::<u32>()
            .map_err(|_| format!("invalid value '{}'", fields[2]))?;

        Ok(Self {
            timestamp_ms,
            value,
        })
    }
}
