// src/model.rs

//! Shared entity types: detected commands, fingerprints, execution results.
//!
//! Everything here is an immutable value type. Commands are created fresh
//! on every scan; results are created once per command per run. The ledger
//! correlates the two across runs via [`Fingerprint`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Cap on captured stdout/stderr per stream.
pub const OUTPUT_CAP_BYTES: usize = 64 * 1024;

/// Marker appended when captured output was cut at [`OUTPUT_CAP_BYTES`].
pub const TRUNCATION_MARKER: &str = "\n[output truncated]";

/// A detected, executable instruction.
///
/// `text` is the authoritative identity input; `description` and
/// `metadata` are advisory and opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Literal shell command string, e.g. `npm run build`.
    pub text: String,
    /// File the command was extracted from.
    pub source: PathBuf,
    /// Human label, e.g. "NPM script: build".
    pub description: String,
    /// Free-form key/value bag (line number, construct type, ...).
    pub metadata: BTreeMap<String, String>,
}

impl Command {
    pub fn new(text: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            description: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Stable identity of this command across runs.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.text, &self.source)
    }
}

/// Stable identity key for a [`Command`].
///
/// Derived from the blake3 hash of the trimmed command text and the
/// source path, so a command rediscovered on a later scan maps to the
/// same ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(text: &str, source: &Path) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(text.trim().as_bytes());
        hasher.update(b"\0");
        hasher.update(source.to_string_lossy().as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Full lowercase hex form, used as the ledger key on disk.
    pub fn to_hex(self) -> String {
        use std::fmt::Write as _;
        let mut s = String::with_capacity(64);
        for b in self.0 {
            let _ = write!(s, "{b:02x}");
        }
        s
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let hi = (chunk[0] as char).to_digit(16)?;
            let lo = (chunk[1] as char).to_digit(16)?;
            bytes[i] = (hi * 16 + lo) as u8;
        }
        Some(Self(bytes))
    }

    /// Short form used in log lines and container names.
    pub fn short(self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Fingerprint::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid fingerprint: {s}")))
    }
}

/// Outcome category of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure,
    Timeout,
    Ignored,
    ParseSkipped,
}

impl ExecutionStatus {
    /// Whether this status places the command in the broken partition.
    pub fn is_broken(self) -> bool {
        matches!(self, ExecutionStatus::Failure | ExecutionStatus::Timeout)
    }
}

/// Outcome of running one [`Command`] once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub fingerprint: Fingerprint,
    pub status: ExecutionStatus,
    /// Exit code; `-1` is the sentinel for [`ExecutionStatus::Timeout`].
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    /// Unix seconds at completion time.
    pub executed_at: u64,
}

impl ExecutionResult {
    pub fn new(fingerprint: Fingerprint, status: ExecutionStatus, return_code: i32) -> Self {
        Self {
            fingerprint,
            status,
            return_code,
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::ZERO,
            executed_at: unix_now(),
        }
    }

    pub fn ignored(fingerprint: Fingerprint) -> Self {
        Self::new(fingerprint, ExecutionStatus::Ignored, 0)
    }

    /// A synthetic failure carrying only a diagnostic (backend unreachable,
    /// spawn error, cancellation).
    pub fn failure_with_diagnostic(fingerprint: Fingerprint, diagnostic: impl Into<String>) -> Self {
        let mut result = Self::new(fingerprint, ExecutionStatus::Failure, -1);
        result.stderr = diagnostic.into();
        result
    }
}

/// Current time as unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Truncate captured output to [`OUTPUT_CAP_BYTES`], appending a marker
/// when anything was cut. The cut lands on a UTF-8 boundary.
pub fn cap_output(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    if text.len() <= OUTPUT_CAP_BYTES {
        return text.into_owned();
    }
    let mut end = OUTPUT_CAP_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut capped = text[..end].to_string();
    capped.push_str(TRUNCATION_MARKER);
    capped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn fingerprint_is_stable_across_rediscovery() {
        let a = Command::new("npm run build", "package.json");
        let b = Command::new("npm run build", "package.json")
            .with_description("NPM script: build")
            .with_metadata("line", "12");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_normalizes_surrounding_whitespace() {
        let a = Fingerprint::of("make test", Path::new("Makefile"));
        let b = Fingerprint::of("  make test \n", Path::new("Makefile"));
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_source_files() {
        let a = Fingerprint::of("make test", Path::new("Makefile"));
        let b = Fingerprint::of("make test", Path::new("sub/Makefile"));
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_hex_round_trip() {
        let fp = Fingerprint::of("cargo test", Path::new("Cargo.toml"));
        let hex = fp.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(Fingerprint::from_hex(&hex), Some(fp));
        assert_eq!(Fingerprint::from_hex("zz"), None);
    }

    #[test]
    fn cap_output_appends_marker_past_limit() {
        let big = vec![b'x'; OUTPUT_CAP_BYTES + 100];
        let capped = cap_output(&big);
        assert!(capped.ends_with(TRUNCATION_MARKER));
        assert!(capped.len() <= OUTPUT_CAP_BYTES + TRUNCATION_MARKER.len());

        let small = b"hello";
        assert_eq!(cap_output(small), "hello");
    }

    #[test]
    fn broken_statuses() {
        assert!(ExecutionStatus::Failure.is_broken());
        assert!(ExecutionStatus::Timeout.is_broken());
        assert!(!ExecutionStatus::Success.is_broken());
        assert!(!ExecutionStatus::Ignored.is_broken());
        assert!(!ExecutionStatus::ParseSkipped.is_broken());
    }

    #[test]
    fn result_serializes_with_hex_fingerprint() {
        let fp = Fingerprint::of("exit 1", &PathBuf::from("package.json"));
        let result = ExecutionResult::new(fp, ExecutionStatus::Failure, 1);
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(&fp.to_hex()));
        let back: ExecutionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
