//! Core domain types for the minerscan engine.
//!
//! A scan pass admits a set of [`Host`]s, probes each one against the endpoint/auth
//! matrix, and yields exactly one [`ScanOutcome`] per host.

use std::borrow::Cow;
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::error::CoreError;

/// Longest raw text kept when a response body is neither JSON nor valid UTF-8.
pub const RAW_FALLBACK_LIMIT: usize = 1000;

// ── Host ──────────────────────────────────────────────────────────

/// A network address identifying one mining device.
///
/// Stored trimmed; never empty. An explicit `:port` suffix is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Host(String);

impl Host {
    /// Admit a raw address, rejecting empty and whitespace-only input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The address as it appears in a URL authority.
    ///
    /// A bare IPv6 address is bracketed; anything else, including an already
    /// bracketed `[addr]:port`, is used unchanged.
    pub fn authority(&self) -> Cow<'_, str> {
        match self.0.parse::<Ipv6Addr>() {
            Ok(addr) => Cow::Owned(format!("[{addr}]")),
            Err(_) => Cow::Borrowed(&self.0),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Outcome ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Success,
    Failed,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Body captured from a successful management response.
///
/// Decided once per response: structured when the body is JSON, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Structured(serde_json::Value),
    Raw(String),
    Absent,
}

impl ResponsePayload {
    /// Classify a response body.
    ///
    /// Bodies that are neither JSON nor UTF-8 are decoded lossily and cut to
    /// [`RAW_FALLBACK_LIMIT`] characters.
    pub fn from_body(body: &[u8]) -> Self {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
            return Self::Structured(value);
        }

        match std::str::from_utf8(body) {
            Ok(text) => Self::Raw(text.to_string()),
            Err(_) => Self::Raw(
                String::from_utf8_lossy(body)
                    .chars()
                    .take(RAW_FALLBACK_LIMIT)
                    .collect(),
            ),
        }
    }

    /// Rebuild a payload from its stored text form.
    pub fn from_stored(text: &str) -> Self {
        if text.is_empty() {
            return Self::Absent;
        }
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => Self::Structured(value),
            Err(_) => Self::Raw(text.to_string()),
        }
    }

    /// Text form written to the store. `Absent` is the empty string.
    pub fn to_stored(&self) -> String {
        match self {
            Self::Structured(value) => value.to_string(),
            Self::Raw(text) => text.clone(),
            Self::Absent => String::new(),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl Serialize for ResponsePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Structured(value) => value.serialize(serializer),
            Self::Raw(text) => serializer.serialize_str(text),
            Self::Absent => serializer.serialize_str(""),
        }
    }
}

/// The single authoritative result for one host from one scan pass.
///
/// Construct through [`ScanOutcome::success`] or [`ScanOutcome::failed`]; those keep
/// a failure free of endpoint and payload. The fields stay public for callers that
/// rehydrate stored rows, which do not re-check that pairing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanOutcome {
    pub host: Host,
    pub status: ProbeStatus,
    pub endpoint_used: String,
    #[serde(rename = "response_payload")]
    pub payload: ResponsePayload,
    pub observed_at: DateTime<Utc>,
}

impl ScanOutcome {
    pub fn success(host: Host, endpoint: impl Into<String>, payload: ResponsePayload) -> Self {
        Self {
            host,
            status: ProbeStatus::Success,
            endpoint_used: endpoint.into(),
            payload,
            observed_at: Utc::now(),
        }
    }

    pub fn failed(host: Host) -> Self {
        Self {
            host,
            status: ProbeStatus::Failed,
            endpoint_used: String::new(),
            payload: ResponsePayload::Absent,
            observed_at: Utc::now(),
        }
    }

    /// Override the observation time (used when rehydrating stored rows).
    pub fn observed(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = at;
        self
    }
}

// ── Runs ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Bulk,
    Single,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bulk => "bulk",
            Self::Single => "single",
        }
    }
}

impl FromStr for RunMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bulk" => Ok(Self::Bulk),
            "single" => Ok(Self::Single),
            other => Err(CoreError::InvalidRunMode(other.to_string())),
        }
    }
}

/// Audit record for one scan invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub persist_failures: usize,
    pub interrupted: bool,
}

impl RunRecord {
    /// Start a record with zeroed counts; `completed_at` is set by the caller when done.
    pub fn begin(mode: RunMode, total: usize) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            mode,
            started_at: now,
            completed_at: now,
            total,
            succeeded: 0,
            failed: 0,
            persist_failures: 0,
            interrupted: false,
        }
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }
}
