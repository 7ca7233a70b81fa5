//! Per-trial alignment of the eye-tracker clock to the EEG sample grid.
//!
//! Only the EEG spacing between a trial onset and its second boundary is
//! taken as ground truth. The eye tracker contributes the time from the first
//! sample of the trial phase to the same boundary, so drift of its absolute
//! clock does not matter.

use crate::error::{ReadError, ReadResult};
use crate::eye::EyeTable;
use crate::triggers::TriggerEvent;

/// Convert a span of EEG samples to milliseconds
pub fn samples_to_ms(samples: f64, sfreq: f64) -> f64 {
    samples * 1000.0 / sfreq
}

/// Convert milliseconds to (fractional) EEG samples
pub fn ms_to_samples(ms: f64, sfreq: f64) -> f64 {
    ms * sfreq / 1000.0
}

/// Compute the offset (ms) of every trial.
///
/// `bounds` holds the EEG trial onset and second-boundary trigger of each
/// trial, `summary` provides the eye-tracker timestamp of the second boundary
/// in `boundary_column`, and `full` provides the first trace sample of the
/// trial phase. All three sequences are paired positionally and must have
/// the same length.
pub fn compute_offsets(
    bounds: &[(TriggerEvent, TriggerEvent)],
    summary: &EyeTable,
    full: &EyeTable,
    sfreq: f64,
    boundary_column: &str,
) -> ReadResult<Vec<f64>> {
    if bounds.len() != summary.len() {
        return Err(ReadError::TrialCountMismatch {
            eeg: bounds.len(),
            eye: summary.len(),
        });
    }
    if bounds.len() != full.len() {
        return Err(ReadError::TrialCountMismatch {
            eeg: bounds.len(),
            eye: full.len(),
        });
    }

    bounds
        .iter()
        .zip(summary.iter().zip(full.iter()))
        .enumerate()
        .map(|(trial, ((onset, boundary), (row, big_row)))| {
            let eye_t0 = big_row
                .traces
                .as_ref()
                .and_then(|traces| traces.first_timestamp())
                .ok_or_else(|| ReadError::MissingTrialData {
                    trial,
                    what: "trace samples".to_string(),
                })?;
            let eye_t1 = row
                .numeric(boundary_column)
                .ok_or_else(|| ReadError::MissingTrialData {
                    trial,
                    what: format!("numeric column '{}'", boundary_column),
                })?;

            let eeg_delta = samples_to_ms((boundary.sample - onset.sample) as f64, sfreq);
            let eye_delta = eye_t1 - eye_t0;
            Ok(eeg_delta - eye_delta)
        })
        .collect()
}

/// Store each trial's offset on both eye tables
pub fn apply_offsets(offsets: &[f64], summary: &mut EyeTable, full: &mut EyeTable) {
    for ((&offset, row), big_row) in offsets
        .iter()
        .zip(summary.trials.iter_mut())
        .zip(full.trials.iter_mut())
    {
        row.eye_offset = Some(offset);
        big_row.eye_offset = Some(offset);
    }
}
