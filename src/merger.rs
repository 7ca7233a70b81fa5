use std::sync::Arc;

use crate::align::{apply_offsets, compute_offsets};
use crate::artifacts::{ArtifactKind, ArtifactThresholds, annotate, artifact_annotations};
use crate::channels::{add_eye_channels, synthesize_channels};
use crate::error::ReadResult;
use crate::eye::EyeTable;
use crate::eye::trace::{BlinkReconstructor, TraceProcessor};
use crate::raw::RawEeg;
use crate::triggers::{Events, TriggerEvent, trial_bounds};

#[derive(Debug, Clone)]
pub struct MergerConfig {
    pub thresholds: ArtifactThresholds,
    /// Eye-tracking column with the timestamp of each trial's second boundary
    pub boundary_column: String,
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            thresholds: ArtifactThresholds::default(),
            boundary_column: "t_onset_1".to_string(),
        }
    }
}

/// What a merge added to the recording
#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    pub n_trials: usize,
    pub offsets: Vec<f64>,
    pub n_blinks: usize,
    pub n_saccades: usize,
}

impl MergeReport {
    /// Mean eye-tracker offset over all trials, in ms
    pub fn mean_offset(&self) -> Option<f64> {
        if self.offsets.is_empty() {
            None
        } else {
            Some(self.offsets.iter().sum::<f64>() / self.offsets.len() as f64)
        }
    }

    pub fn summary(&self) -> String {
        let mut summary = String::from("Merge Summary\n");
        summary.push_str("=============\n");
        summary.push_str(&format!("Trials merged: {}\n", self.n_trials));
        if let Some(mean) = self.mean_offset() {
            summary.push_str(&format!("Mean offset (eye - eeg): {:.3} ms\n", mean));
        }
        summary.push_str(&format!("BAD_BLINK annotations: {}\n", self.n_blinks));
        summary.push_str(&format!("BAD_SACCADE annotations: {}\n", self.n_saccades));
        summary
    }
}

/// Merges full-resolution eye-tracking data into an EEG recording.
///
/// The merge adds the `GazeX`, `GazeY` and `PupilSize` channels and appends
/// `BAD_BLINK` / `BAD_SACCADE` annotations; the trial offsets are written
/// back to both eye tables as `eye_offset`.
pub struct EyeEegMerger {
    config: MergerConfig,
    trace_processor: Arc<dyn TraceProcessor>,
}

impl EyeEegMerger {
    pub fn new(config: MergerConfig) -> Self {
        Self {
            config,
            trace_processor: Arc::new(BlinkReconstructor::default()),
        }
    }

    /// Replace the trace processor applied before merging
    pub fn with_trace_processor(mut self, processor: Arc<dyn TraceProcessor>) -> Self {
        self.trace_processor = processor;
        self
    }

    /// Run the trace processor over every trial of a full-resolution table
    pub fn process_traces(&self, full: &mut EyeTable) {
        for trial in &mut full.trials {
            if let Some(traces) = trial.traces.take() {
                trial.traces = Some(self.trace_processor.process(traces, &trial.blinks));
            }
        }
    }

    /// Merge `full` into `raw`.
    ///
    /// `events` must have passed validation and `summary` / `full` must hold
    /// one row per EEG trial onset, in order.
    pub fn merge(
        &self,
        raw: &mut RawEeg,
        events: &Events,
        summary: &mut EyeTable,
        full: &mut EyeTable,
    ) -> ReadResult<MergeReport> {
        tracing::info!("Merging eye-tracking and EEG data");
        let sfreq = raw.sfreq();

        self.process_traces(full);

        let bounds = trial_bounds(events);
        let offsets = compute_offsets(&bounds, summary, full, sfreq, &self.config.boundary_column)?;
        apply_offsets(&offsets, summary, full);
        if let Some(mean) = full.mean_offset() {
            tracing::info!("Trial offset (eye - eeg): {:.3} ms", mean);
        }
        for (trial, offset) in offsets.iter().enumerate() {
            tracing::debug!("Trial {}: offset = {:.3} ms", trial, offset);
        }

        let onsets: Vec<TriggerEvent> = bounds.iter().map(|(onset, _)| *onset).collect();

        tracing::info!("Adding GazeX, GazeY, and PupilSize channels");
        let data = synthesize_channels(raw.len(), &onsets, full, &offsets, sfreq);
        add_eye_channels(raw, data)?;

        tracing::info!("Adding BAD_BLINK and BAD_SACCADE annotations");
        let bad = artifact_annotations(&onsets, full, &offsets, sfreq, &self.config.thresholds);
        let report = MergeReport {
            n_trials: offsets.len(),
            n_blinks: bad.count(ArtifactKind::Blink.description()),
            n_saccades: bad.count(ArtifactKind::Saccade.description()),
            offsets,
        };
        annotate(raw, bad);

        tracing::info!(
            "Merged {} trials: {} blinks, {} saccades annotated",
            report.n_trials,
            report.n_blinks,
            report.n_saccades
        );
        Ok(report)
    }
}
