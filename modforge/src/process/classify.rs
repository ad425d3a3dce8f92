//! Error classification for external tool output.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Start/end marker pair exempting lines from error classification.
///
/// Handles tools with noisy startup banners: every line between the start
/// marker and the end marker (inclusive) is treated as informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateMarkers {
    /// Substring opening the gate.
    pub start: String,
    /// Substring closing the gate.
    pub end: String,
}

impl GateMarkers {
    /// Creates a marker pair.
    #[must_use]
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// Verdict for a single output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineVerdict {
    /// Routine output.
    Ok,
    /// Counts toward failing the step.
    Error,
}

/// Stateful line classifier for one process run.
///
/// A line is an error candidate if it arrived on the error stream or matches
/// one of the error patterns. Candidates are downgraded by the exclusion
/// list; the ignore-error gate exempts everything between its markers and
/// takes precedence over both.
#[derive(Debug)]
pub struct LineClassifier {
    exclusions: Vec<String>,
    error_patterns: Vec<Regex>,
    gate: Option<GateMarkers>,
    in_gate: bool,
}

impl LineClassifier {
    /// Builds a classifier from pattern strings.
    ///
    /// # Errors
    ///
    /// Returns the regex error text if an error pattern does not compile.
    pub fn new(
        exclusions: Vec<String>,
        error_patterns: &[String],
        gate: Option<GateMarkers>,
    ) -> Result<Self, String> {
        let error_patterns = error_patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| format!("bad error pattern '{p}': {e}")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            exclusions,
            error_patterns,
            gate,
            in_gate: false,
        })
    }

    /// Returns true while the gate is open.
    #[must_use]
    pub fn in_gate(&self) -> bool {
        self.in_gate
    }

    /// Classifies one line of output.
    pub fn classify(&mut self, line: &str, from_error_stream: bool) -> LineVerdict {
        if let Some(gate) = &self.gate {
            if self.in_gate {
                if line.contains(&gate.end) {
                    self.in_gate = false;
                }
                return LineVerdict::Ok;
            }
            if line.contains(&gate.start) {
                self.in_gate = true;
                return LineVerdict::Ok;
            }
        }

        let candidate =
            from_error_stream || self.error_patterns.iter().any(|re| re.is_match(line));
        if !candidate {
            return LineVerdict::Ok;
        }

        if self.exclusions.iter().any(|pat| line.contains(pat)) {
            return LineVerdict::Ok;
        }

        LineVerdict::Error
    }
}
