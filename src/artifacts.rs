//! Blink and saccade bad intervals projected onto the EEG timeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::eye::{EyeTable, EyeTrial};
use crate::raw::{Annotation, Annotations, RawEeg};
use crate::triggers::TriggerEvent;

/// Kind of eye-movement artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    #[serde(rename = "BAD_BLINK")]
    Blink,
    #[serde(rename = "BAD_SACCADE")]
    Saccade,
}

impl ArtifactKind {
    pub fn description(&self) -> &'static str {
        match self {
            ArtifactKind::Blink => "BAD_BLINK",
            ArtifactKind::Saccade => "BAD_SACCADE",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Lower bounds an event must reach to be annotated. Events strictly below
/// a bound are skipped; an event exactly at the bound is kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArtifactThresholds {
    /// ms
    pub min_blink_dur: f64,
    /// ms
    pub min_sacc_dur: f64,
    /// px
    pub min_sacc_size: f64,
}

impl Default for ArtifactThresholds {
    fn default() -> Self {
        Self {
            min_blink_dur: 10.0,
            min_sacc_dur: 10.0,
            min_sacc_size: 30.0,
        }
    }
}

/// Where a trial sits on the EEG timeline
#[derive(Debug, Clone, Copy)]
struct TrialAnchor {
    /// Onset of the trial in EEG seconds
    onset_s: f64,
    /// Offset of the eye clock, ms
    offset: f64,
    /// First eye timestamp of the trial phase, ms
    t0: f64,
}

impl TrialAnchor {
    fn annotation(&self, kind: ArtifactKind, start: f64, end: f64) -> Annotation {
        Annotation {
            onset: self.onset_s + (self.offset + start - self.t0) / 1000.0,
            duration: (end - start) / 1000.0,
            description: kind.description().to_string(),
        }
    }
}

fn anchor(trial: &EyeTrial, onset: &TriggerEvent, offset: f64, sfreq: f64) -> Option<TrialAnchor> {
    let t0 = trial.traces.as_ref()?.first_timestamp()?;
    Some(TrialAnchor {
        onset_s: onset.sample as f64 / sfreq,
        offset,
        t0,
    })
}

/// BAD_BLINK annotations of one trial
pub fn blink_annotations(
    trial: &EyeTrial,
    onset: &TriggerEvent,
    offset: f64,
    sfreq: f64,
    thresholds: &ArtifactThresholds,
) -> Vec<Annotation> {
    let Some(anchor) = anchor(trial, onset, offset, sfreq) else {
        return Vec::new();
    };
    trial
        .blinks
        .valid()
        .filter(|(start, end)| end - start >= thresholds.min_blink_dur)
        .map(|(start, end)| anchor.annotation(ArtifactKind::Blink, start, end))
        .collect()
}

/// BAD_SACCADE annotations of one trial, saccades being the gaps between
/// consecutive fixations
pub fn saccade_annotations(
    trial: &EyeTrial,
    onset: &TriggerEvent,
    offset: f64,
    sfreq: f64,
    thresholds: &ArtifactThresholds,
) -> Vec<Annotation> {
    let Some(anchor) = anchor(trial, onset, offset, sfreq) else {
        return Vec::new();
    };
    trial
        .fixations
        .saccades()
        .filter(|s| s.duration() >= thresholds.min_sacc_dur)
        .filter(|s| s.size() >= thresholds.min_sacc_size)
        .map(|s| anchor.annotation(ArtifactKind::Saccade, s.start, s.end))
        .collect()
}

/// Blink and saccade annotations for all trials, trial by trial
pub fn artifact_annotations(
    onsets: &[TriggerEvent],
    full: &EyeTable,
    offsets: &[f64],
    sfreq: f64,
    thresholds: &ArtifactThresholds,
) -> Annotations {
    let mut annotations = Vec::new();
    for (trial, ((onset, row), &offset)) in
        onsets.iter().zip(full.iter()).zip(offsets).enumerate()
    {
        if row.traces.as_ref().and_then(|t| t.first_timestamp()).is_none() {
            tracing::warn!("Trial {} has no trace timestamps, skipping its artifacts", trial);
            continue;
        }
        annotations.extend(blink_annotations(row, onset, offset, sfreq, thresholds));
        annotations.extend(saccade_annotations(row, onset, offset, sfreq, thresholds));
    }
    annotations.into_iter().collect()
}

/// Append bad intervals after the recording's existing annotations
pub fn annotate(raw: &mut RawEeg, bad: Annotations) {
    let combined = raw.annotations().clone() + bad;
    raw.set_annotations(combined);
}
