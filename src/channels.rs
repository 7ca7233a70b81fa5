//! Gaze position and pupil size as extra EEG channels.

use anyhow::Result;
use ndarray::{Array2, ArrayView1, s};

use crate::align::ms_to_samples;
use crate::eye::EyeTable;
use crate::raw::{ChannelType, RawEeg};
use crate::triggers::TriggerEvent;

/// Names of the synthesized channels, in buffer row order
pub const EYE_CHANNEL_NAMES: [&str; 3] = ["GazeX", "GazeY", "PupilSize"];

/// Project each trial's traces onto the EEG sample grid.
///
/// Trial `i` is written starting at its onset sample shifted by the trial
/// offset. Samples that would land outside the recording are dropped.
/// Positions no trial covers are filled with the row's median afterwards.
pub fn synthesize_channels(
    n_samples: usize,
    onsets: &[TriggerEvent],
    full: &EyeTable,
    offsets: &[f64],
    sfreq: f64,
) -> Array2<f64> {
    let mut data = Array2::from_elem((EYE_CHANNEL_NAMES.len(), n_samples), f64::NAN);

    for (trial, ((onset, row), &offset)) in onsets
        .iter()
        .zip(full.iter())
        .zip(offsets)
        .enumerate()
    {
        let Some(traces) = &row.traces else {
            tracing::warn!("Trial {} has no traces, leaving its samples empty", trial);
            continue;
        };
        let trace_len = traces.x.len().min(traces.y.len()).min(traces.pupil.len());
        let start = onset.sample + ms_to_samples(offset, sfreq).round() as i64;
        let end = start + trace_len as i64;

        // Clip to the recording
        let lo = start.clamp(0, n_samples as i64);
        let hi = end.clamp(0, n_samples as i64);
        if hi - lo < trace_len as i64 {
            tracing::warn!(
                "Trial {}: {} of {} eye samples fall outside the EEG recording",
                trial,
                trace_len as i64 - (hi - lo),
                trace_len
            );
        }
        if hi <= lo {
            continue;
        }

        let (lo, hi) = (lo as usize, hi as usize);
        let skip = (lo as i64 - start) as usize;
        let take = skip..skip + (hi - lo);
        for (channel, values) in [&traces.x, &traces.y, &traces.pupil].into_iter().enumerate() {
            data.slice_mut(s![channel, lo..hi])
                .assign(&ArrayView1::from(&values[take.clone()]));
        }
    }

    fill_missing_with_median(&mut data);
    data
}

/// Replace non-finite samples in each row by the median of the row's
/// finite samples. Rows without any finite sample are left untouched.
pub fn fill_missing_with_median(data: &mut Array2<f64>) {
    for (channel, mut row) in data.rows_mut().into_iter().enumerate() {
        let Some(median) = nan_median(row.view()) else {
            tracing::warn!("Channel {} has no valid samples to take a median from", channel);
            continue;
        };
        row.mapv_inplace(|v| if v.is_finite() { v } else { median });
    }
}

/// Median of the finite values, averaging the middle pair for even counts
pub fn nan_median(values: ArrayView1<'_, f64>) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(f64::total_cmp);
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        Some((finite[mid - 1] + finite[mid]) / 2.0)
    } else {
        Some(finite[mid])
    }
}

/// Append the synthesized buffer to the recording as auxiliary channels
pub fn add_eye_channels(raw: &mut RawEeg, data: Array2<f64>) -> Result<()> {
    raw.add_channels(
        EYE_CHANNEL_NAMES.iter().map(|n| n.to_string()).collect(),
        vec![ChannelType::Misc; EYE_CHANNEL_NAMES.len()],
        data,
    )
}
