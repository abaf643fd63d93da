use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::{ChromError, Result};

// ---------------------------------------------------------------------------
// MetadataValue – a single header value
// ---------------------------------------------------------------------------

/// A dynamically-typed header value, guessed from its text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    /// Empty cells and the instrument's `n.a.` marker.
    Null,
}

impl MetadataValue {
    /// Guess the type of a raw header cell.
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("n.a.") {
            return MetadataValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return MetadataValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return MetadataValue::Float(f);
        }
        MetadataValue::String(s.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MetadataValue::Null)
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Null => write!(f, "n.a."),
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata – sectioned header of an instrument export
// ---------------------------------------------------------------------------

/// Header record of a trace: section name → key → value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Metadata {
    sections: BTreeMap<String, BTreeMap<String, MetadataValue>>,
}

impl Metadata {
    pub const INJECTION: &'static str = "Injection Information";
    pub const DATA_INFO: &'static str = "Chromatogram Data Information";
    pub const SIGNAL_PARAMETERS: &'static str = "Signal Parameter Information";
    /// Bucket for keys that appear before any section heading.
    pub const OTHER: &'static str = "Other";

    pub const CHANNEL: &'static str = "Channel";
    pub const TIME_MIN: &'static str = "Time Min. (min)";
    pub const TIME_MAX: &'static str = "Time Max. (min)";
    pub const DATA_POINTS: &'static str = "Data Points";

    /// Keys of [`Metadata::DATA_INFO`] a trace cannot be loaded without.
    pub const REQUIRED_KEYS: [&'static str; 3] = [Self::CHANNEL, Self::TIME_MIN, Self::TIME_MAX];

    pub fn insert(&mut self, section: &str, key: &str, value: MetadataValue) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&MetadataValue> {
        self.sections.get(section).and_then(|s| s.get(key))
    }

    pub fn section(&self, name: &str) -> Option<&BTreeMap<String, MetadataValue>> {
        self.sections.get(name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Fail with a format error naming the first missing required key.
    pub fn require_keys(&self) -> Result<()> {
        for key in Self::REQUIRED_KEYS {
            match self.get(Self::DATA_INFO, key) {
                Some(v) if !v.is_null() => {}
                _ => {
                    return Err(ChromError::format(format!(
                        "missing required metadata key '{key}' in section '{}'",
                        Self::DATA_INFO
                    )))
                }
            }
        }
        Ok(())
    }

    /// Channel identifier of the run.
    pub fn channel(&self) -> Option<String> {
        self.get(Self::DATA_INFO, Self::CHANNEL)
            .filter(|v| !v.is_null())
            .map(|v| v.to_string())
    }

    pub fn time_range(&self) -> Option<(f64, f64)> {
        let min = self.get(Self::DATA_INFO, Self::TIME_MIN)?.as_f64()?;
        let max = self.get(Self::DATA_INFO, Self::TIME_MAX)?.as_f64()?;
        Some((min, max))
    }

    pub fn data_points(&self) -> Option<usize> {
        match self.get(Self::DATA_INFO, Self::DATA_POINTS)? {
            MetadataValue::Integer(i) if *i >= 0 => Some(*i as usize),
            _ => None,
        }
    }

    /// Sampling interval implied by the run timing, in time units per sample.
    pub fn sampling_interval(&self) -> Option<f64> {
        let (min, max) = self.time_range()?;
        let points = self.data_points()?;
        if points < 2 || max <= min {
            return None;
        }
        Some((max - min) / (points - 1) as f64)
    }
}

// ---------------------------------------------------------------------------
// Trace – one loaded channel
// ---------------------------------------------------------------------------

static NEXT_TRACE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a loaded [`Trace`]. Clones share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TraceId(u64);

impl TraceId {
    fn next() -> Self {
        TraceId(NEXT_TRACE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trace#{}", self.0)
    }
}

/// Time/signal samples of a single detector channel plus its header.
#[derive(Debug, Clone)]
pub struct Trace {
    id: TraceId,
    time: Vec<f64>,
    signal: Vec<f64>,
    metadata: Metadata,
    time_unit: String,
    signal_unit: String,
}

impl Trace {
    /// Build a trace, checking that both axes line up, hold finite values and
    /// that time never decreases.
    pub fn new(time: Vec<f64>, signal: Vec<f64>, metadata: Metadata) -> Result<Self> {
        if time.len() != signal.len() {
            return Err(ChromError::format(format!(
                "time has {} values but signal has {}",
                time.len(),
                signal.len()
            )));
        }
        if time.is_empty() {
            return Err(ChromError::EmptyTrace);
        }
        if let Some(i) = time
            .iter()
            .zip(&signal)
            .position(|(t, y)| !t.is_finite() || !y.is_finite())
        {
            return Err(ChromError::format(format!("sample {i} is not finite")));
        }
        if let Some(i) = time.windows(2).position(|w| w[1] < w[0]) {
            return Err(ChromError::format(format!(
                "time decreases at sample {}: {} -> {}",
                i + 1,
                time[i],
                time[i + 1]
            )));
        }

        Ok(Trace {
            id: TraceId::next(),
            time,
            signal,
            metadata,
            time_unit: "min".to_string(),
            signal_unit: String::new(),
        })
    }

    pub fn with_units(mut self, time_unit: impl Into<String>, signal_unit: impl Into<String>) -> Self {
        self.time_unit = time_unit.into();
        self.signal_unit = signal_unit.into();
        self
    }

    pub fn id(&self) -> TraceId {
        self.id
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn signal(&self) -> &[f64] {
        &self.signal
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn time_unit(&self) -> &str {
        &self.time_unit
    }

    pub fn signal_unit(&self) -> &str {
        &self.signal_unit
    }

    /// Number of samples; never zero.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Median spacing between consecutive samples, `None` for a single sample.
    pub fn median_step(&self) -> Option<f64> {
        let mut steps: Vec<f64> = self.time.windows(2).map(|w| w[1] - w[0]).collect();
        if steps.is_empty() {
            return None;
        }
        steps.sort_by(|a, b| a.total_cmp(b));
        Some(steps[steps.len() / 2])
    }

    /// Sampling interval from the header when available, else from the data.
    pub fn sampling_interval(&self) -> Option<f64> {
        self.metadata
            .sampling_interval()
            .or_else(|| self.median_step())
    }
}
