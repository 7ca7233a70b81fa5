//! Eye-tracking data model and the reader interface.
//!
//! An eye-tracking recording arrives as one [`EyeTrial`] per trial. Event
//! lists (fixations, blinks) are fixed-capacity buffers: a prefix of real
//! detections followed by non-finite padding. The accessors here stop at the
//! first padded slot, which is the normal end of a list and not an error.

pub mod trace;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EyeReaderOptions;

/// Fixation lists of one trial (timestamps in ms, coordinates in pixels)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixations {
    pub start: Vec<f64>,
    pub end: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// A saccade inferred from two consecutive fixations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Saccade {
    /// End of the fixation the eye leaves
    pub start: f64,
    /// Start of the fixation the eye lands on
    pub end: f64,
    pub from: (f64, f64),
    pub to: (f64, f64),
}

impl Saccade {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Euclidean distance between the two fixation centres
    pub fn size(&self) -> f64 {
        let dx = self.from.0 - self.to.0;
        let dy = self.from.1 - self.to.1;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Fixations {
    /// Saccades between fixation `n` and `n + 1`, up to the first padded slot
    pub fn saccades(&self) -> impl Iterator<Item = Saccade> + '_ {
        let n = self
            .end
            .len()
            .min(self.start.len())
            .min(self.x.len())
            .min(self.y.len());
        (1..n)
            .map(move |i| Saccade {
                start: self.end[i - 1],
                end: self.start[i],
                from: (self.x[i - 1], self.y[i - 1]),
                to: (self.x[i], self.y[i]),
            })
            .take_while(|s| s.start.is_finite() && s.end.is_finite())
    }
}

/// Blink lists of one trial (timestamps in ms)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blinks {
    pub start: Vec<f64>,
    pub end: Vec<f64>,
}

impl Blinks {
    /// `(start, end)` pairs up to the first padded slot
    pub fn valid(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.start
            .iter()
            .zip(&self.end)
            .map(|(&s, &e)| (s, e))
            .take_while(|(s, e)| s.is_finite() && e.is_finite())
    }
}

/// Full-resolution samples of one trial phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GazeTraces {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub pupil: Vec<f64>,
    /// Eye-tracker timestamps in ms
    pub time: Vec<f64>,
}

impl GazeTraces {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Timestamp of the first sample, if it is a real timestamp
    pub fn first_timestamp(&self) -> Option<f64> {
        self.time.first().copied().filter(|t| t.is_finite())
    }
}

/// One row of an eye-tracking table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EyeTrial {
    /// Scalar columns, e.g. `t_onset_1` or experimental variables logged
    /// through the eye tracker
    pub variables: BTreeMap<String, Value>,
    pub fixations: Fixations,
    pub blinks: Blinks,
    /// Present when the table was read in full-resolution mode
    pub traces: Option<GazeTraces>,
    /// Filled in by the aligner
    pub eye_offset: Option<f64>,
}

impl EyeTrial {
    /// A scalar column as a number
    pub fn numeric(&self, name: &str) -> Option<f64> {
        self.variables.get(name).and_then(Value::as_f64)
    }
}

/// Ordered eye-tracking trials
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EyeTable {
    pub trials: Vec<EyeTrial>,
}

impl EyeTable {
    pub fn new(trials: Vec<EyeTrial>) -> Self {
        Self { trials }
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EyeTrial> {
        self.trials.iter()
    }

    /// Mean of the per-trial offsets that have been set
    pub fn mean_offset(&self) -> Option<f64> {
        let offsets: Vec<f64> = self.trials.iter().filter_map(|t| t.eye_offset).collect();
        if offsets.is_empty() {
            None
        } else {
            Some(offsets.iter().sum::<f64>() / offsets.len() as f64)
        }
    }
}

/// How much of the recording the eye reader should return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EyeReadMode {
    /// One row per trial with scalar variables and event lists, traces
    /// reduced as far as the reader allows
    Summary,
    /// Traces of a single phase at the tracker's native rate, without
    /// downsampling
    FullResolution { phase: String },
}

/// Everything an [`EyeTrackingReader`] is asked to honour for one read
#[derive(Debug, Clone, Copy)]
pub struct EyeReadRequest<'a> {
    pub mode: &'a EyeReadMode,
    pub options: &'a EyeReaderOptions,
}

/// Device-specific parser for an eye-tracking folder
pub trait EyeTrackingReader: Send + Sync {
    fn read(&self, folder: &Path, request: &EyeReadRequest<'_>) -> Result<EyeTable>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blink_iteration_stops_at_padding() {
        let blinks = Blinks {
            start: vec![100.0, 300.0, f64::NAN, 900.0],
            end: vec![150.0, 320.0, f64::NAN, 950.0],
        };
        let valid: Vec<_> = blinks.valid().collect();
        assert_eq!(valid, vec![(100.0, 150.0), (300.0, 320.0)]);
    }

    #[test]
    fn saccades_span_fixation_gaps() {
        let fixations = Fixations {
            start: vec![0.0, 250.0, 600.0, f64::NAN],
            end: vec![200.0, 550.0, 800.0, f64::NAN],
            x: vec![100.0, 400.0, 400.0, f64::NAN],
            y: vec![100.0, 500.0, 520.0, f64::NAN],
        };
        let saccades: Vec<_> = fixations.saccades().collect();
        assert_eq!(saccades.len(), 2);
        assert_eq!(saccades[0].start, 200.0);
        assert_eq!(saccades[0].end, 250.0);
        assert_eq!(saccades[0].size(), 500.0);
        assert_eq!(saccades[1].duration(), 50.0);
    }

    #[test]
    fn single_fixation_has_no_saccades() {
        let fixations = Fixations {
            start: vec![0.0],
            end: vec![200.0],
            x: vec![1.0],
            y: vec![1.0],
        };
        assert_eq!(fixations.saccades().count(), 0);
    }

    #[test]
    fn mean_offset_ignores_unset_trials() {
        let mut table = EyeTable::new(vec![EyeTrial::default(); 3]);
        table.trials[0].eye_offset = Some(2.0);
        table.trials[2].eye_offset = Some(4.0);
        assert_eq!(table.mean_offset(), Some(3.0));
        assert_eq!(EyeTable::default().mean_offset(), None);
    }
}
