use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

use crate::artifacts::ArtifactThresholds;
use crate::error::ReadResult;

/// Participant identifier.
///
/// Numbers are zero-padded to two digits in directory names (`sub-01`),
/// labels are used verbatim (`sub-pilot`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectId {
    Number(u32),
    Label(String),
}

impl SubjectId {
    /// BIDS directory name for this subject
    pub fn dir_name(&self) -> String {
        match self {
            SubjectId::Number(n) => format!("sub-{:02}", n),
            SubjectId::Label(label) => format!("sub-{}", label),
        }
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectId::Number(n) => write!(f, "{:02}", n),
            SubjectId::Label(label) => write!(f, "{}", label),
        }
    }
}

impl From<u32> for SubjectId {
    fn from(n: u32) -> Self {
        SubjectId::Number(n)
    }
}

impl From<&str> for SubjectId {
    fn from(label: &str) -> Self {
        SubjectId::Label(label.to_string())
    }
}

impl From<String> for SubjectId {
    fn from(label: String) -> Self {
        SubjectId::Label(label)
    }
}

/// Keyword overrides forwarded untouched to the eye-tracking reader
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EyeReaderOptions(pub Map<String, Value>);

impl EyeReaderOptions {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

/// Settings for reading one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    pub subject: SubjectId,
    /// Root of the BIDS-style data folder
    pub folder: PathBuf,
    /// Seconds of EEG to keep after the last trigger; `None` keeps everything
    pub eeg_margin: Option<f64>,
    /// Minimum saccade duration (ms) for a BAD_SACCADE annotation
    pub min_sacc_dur: f64,
    /// Minimum saccade size (px) for a BAD_SACCADE annotation
    pub min_sacc_size: f64,
    /// Minimum blink duration (ms) for a BAD_BLINK annotation
    pub min_blink_dur: f64,
    /// Eye-tracking column holding the timestamp of the trial's second boundary
    pub second_boundary_column: String,
    /// Phase whose traces are merged into the EEG
    pub trial_phase: String,
    pub eye_options: EyeReaderOptions,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            subject: SubjectId::Number(1),
            folder: PathBuf::from("data/"),
            eeg_margin: Some(30.0),
            min_sacc_dur: 10.0,
            min_sacc_size: 30.0,
            min_blink_dur: 10.0,
            second_boundary_column: "t_onset_1".to_string(),
            trial_phase: "trial".to_string(),
            eye_options: EyeReaderOptions::default(),
        }
    }
}

impl ReadConfig {
    /// Parse a JSON configuration; missing keys take their defaults
    pub fn from_json_str(json: &str) -> ReadResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn thresholds(&self) -> ArtifactThresholds {
        ArtifactThresholds {
            min_blink_dur: self.min_blink_dur,
            min_sacc_dur: self.min_sacc_dur,
            min_sacc_size: self.min_sacc_size,
        }
    }
}
