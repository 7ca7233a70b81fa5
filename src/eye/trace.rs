//! Trace clean-up applied to full-resolution eye-tracking data before it is
//! merged into the EEG recording.

use serde::{Deserialize, Serialize};

use super::{Blinks, GazeTraces};

/// Cleans the traces of one trial.
///
/// The blink list of the same trial is passed along so processors can
/// reconstruct the signal across eyelid closures.
pub trait TraceProcessor: Send + Sync {
    fn process(&self, traces: GazeTraces, blinks: &Blinks) -> GazeTraces;
}

impl<F> TraceProcessor for F
where
    F: Fn(GazeTraces, &Blinks) -> GazeTraces + Send + Sync,
{
    fn process(&self, traces: GazeTraces, blinks: &Blinks) -> GazeTraces {
        self(traces, blinks)
    }
}

/// How aggressively blinks are removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconstructionMode {
    /// Leave traces untouched
    Off,
    /// Interpolate across reported blinks and signal loss
    Basic,
    /// Like `Basic`, with each gap widened by `margin_ms` on both sides to
    /// also drop the eyelid closing and reopening
    Advanced,
}

/// Default processor: linear blink reconstruction, optional downsampling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlinkReconstructor {
    pub mode: ReconstructionMode,
    pub margin_ms: f64,
    /// Average every `n` samples; `None` keeps the native rate
    pub downsample: Option<usize>,
}

impl Default for BlinkReconstructor {
    fn default() -> Self {
        Self {
            mode: ReconstructionMode::Advanced,
            margin_ms: 10.0,
            downsample: None,
        }
    }
}

impl TraceProcessor for BlinkReconstructor {
    fn process(&self, mut traces: GazeTraces, blinks: &Blinks) -> GazeTraces {
        if self.mode != ReconstructionMode::Off && !traces.is_empty() {
            let margin = match self.mode {
                ReconstructionMode::Advanced => self.margin_ms,
                _ => 0.0,
            };
            let gaps = self.gap_mask(&traces, blinks, margin);
            interpolate_gaps(&mut traces.x, &gaps);
            interpolate_gaps(&mut traces.y, &gaps);
            interpolate_gaps(&mut traces.pupil, &gaps);
        }

        match self.downsample {
            Some(factor) if factor > 1 => GazeTraces {
                x: block_mean(&traces.x, factor),
                y: block_mean(&traces.y, factor),
                pupil: block_mean(&traces.pupil, factor),
                time: block_mean(&traces.time, factor),
            },
            _ => traces,
        }
    }
}

impl BlinkReconstructor {
    /// Samples to reconstruct: inside a (widened) blink or where the pupil
    /// signal was lost
    fn gap_mask(&self, traces: &GazeTraces, blinks: &Blinks, margin: f64) -> Vec<bool> {
        let mut intervals: Vec<(f64, f64)> = blinks.valid().collect();

        // Runs of lost pupil signal count as blinks too. Pupil samples
        // without a timestamp cannot be placed and are skipped.
        let mut run_start: Option<f64> = None;
        let mut last_time: Option<f64> = None;
        for (&p, &t) in traces.pupil.iter().zip(&traces.time) {
            match (p.is_finite(), run_start, last_time) {
                (false, None, _) => run_start = Some(t),
                (true, Some(start), Some(end)) => {
                    intervals.push((start, end));
                    run_start = None;
                }
                _ => {}
            }
            last_time = Some(t);
        }
        if let (Some(start), Some(end)) = (run_start, last_time) {
            intervals.push((start, end));
        }

        traces
            .time
            .iter()
            .map(|&t| {
                intervals
                    .iter()
                    .any(|&(start, end)| t >= start - margin && t <= end + margin)
            })
            .collect()
    }
}

/// Linearly interpolate masked or non-finite samples from their nearest
/// valid neighbours. Gaps touching an edge take the single neighbour's value;
/// a trace with no valid sample is left as is.
fn interpolate_gaps(values: &mut [f64], gaps: &[bool]) {
    let is_gap = |i: usize| gaps.get(i).copied().unwrap_or(false) || !values[i].is_finite();
    let mask: Vec<bool> = (0..values.len()).map(is_gap).collect();

    let mut i = 0;
    while i < values.len() {
        if !mask[i] {
            i += 1;
            continue;
        }
        let run_start = i;
        while i < values.len() && mask[i] {
            i += 1;
        }
        let left = run_start.checked_sub(1).map(|j| values[j]);
        let right = (i < values.len()).then(|| values[i]);

        match (left, right) {
            (Some(l), Some(r)) => {
                let span = (i - run_start + 1) as f64;
                for (k, v) in values[run_start..i].iter_mut().enumerate() {
                    *v = l + (r - l) * (k + 1) as f64 / span;
                }
            }
            (Some(fill), None) | (None, Some(fill)) => {
                values[run_start..i].fill(fill);
            }
            (None, None) => {}
        }
    }
}

fn block_mean(values: &[f64], factor: usize) -> Vec<f64> {
    values
        .chunks(factor)
        .map(|chunk| {
            let finite: Vec<f64> = chunk.iter().copied().filter(|v| v.is_finite()).collect();
            if finite.is_empty() {
                f64::NAN
            } else {
                finite.iter().sum::<f64>() / finite.len() as f64
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traces(pupil: Vec<f64>) -> GazeTraces {
        let n = pupil.len();
        GazeTraces {
            x: vec![500.0; n],
            y: vec![400.0; n],
            pupil,
            time: (0..n).map(|i| 1000.0 + i as f64).collect(),
        }
    }

    #[test]
    fn signal_loss_is_interpolated() {
        let processor = BlinkReconstructor {
            mode: ReconstructionMode::Basic,
            ..Default::default()
        };
        let input = traces(vec![1000.0, f64::NAN, f64::NAN, 1300.0]);
        let out = processor.process(input, &Blinks::default());
        assert_eq!(out.pupil, vec![1000.0, 1100.0, 1200.0, 1300.0]);
    }

    #[test]
    fn advanced_mode_widens_blinks() {
        let processor = BlinkReconstructor {
            mode: ReconstructionMode::Advanced,
            margin_ms: 1.0,
            downsample: None,
        };
        let input = traces(vec![10.0, 20.0, 999.0, 999.0, 20.0, 40.0, 50.0]);
        let blinks = Blinks {
            start: vec![1003.0, f64::NAN],
            end: vec![1003.0, f64::NAN],
        };
        let out = processor.process(input, &blinks);
        // samples 2..=4 are replaced, interpolated between 20 and 40
        assert_eq!(out.pupil, vec![10.0, 20.0, 25.0, 30.0, 35.0, 40.0, 50.0]);
    }

    #[test]
    fn edge_gaps_take_nearest_value() {
        let processor = BlinkReconstructor {
            margin_ms: 1.0,
            ..Default::default()
        };
        let input = traces(vec![f64::NAN, 5.0, 6.0]);
        let out = processor.process(input, &Blinks::default());
        // margin widens the leading gap over sample 1 as well
        assert_eq!(out.pupil, vec![6.0, 6.0, 6.0]);
    }

    #[test]
    fn pupil_longer_than_time_is_tolerated() {
        let processor = BlinkReconstructor {
            mode: ReconstructionMode::Basic,
            ..Default::default()
        };
        let input = GazeTraces {
            x: vec![1.0; 4],
            y: vec![1.0; 4],
            pupil: vec![1.0, 2.0, f64::NAN, 4.0],
            time: vec![0.0, 1.0, 2.0],
        };
        let out = processor.process(input, &Blinks::default());
        assert_eq!(out.pupil, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out.time, vec![0.0, 1.0, 2.0]);

        let input = GazeTraces {
            x: vec![1.0; 4],
            y: vec![1.0; 4],
            pupil: vec![1.0, 2.0, f64::NAN, 4.0],
            time: vec![0.0, 1.0, 2.0],
        };
        let out = BlinkReconstructor::default().process(input, &Blinks::default());
        assert_eq!(out.pupil.len(), 4);
        assert!(out.pupil.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn off_mode_keeps_traces() {
        let processor = BlinkReconstructor {
            mode: ReconstructionMode::Off,
            ..Default::default()
        };
        let input = traces(vec![1.0, f64::NAN, 3.0]);
        let out = processor.process(input, &Blinks::default());
        assert!(out.pupil[1].is_nan());
    }

    #[test]
    fn downsampling_averages_blocks() {
        let processor = BlinkReconstructor {
            mode: ReconstructionMode::Off,
            margin_ms: 0.0,
            downsample: Some(2),
        };
        let out = processor.process(traces(vec![1.0, 3.0, 5.0]), &Blinks::default());
        assert_eq!(out.pupil, vec![2.0, 5.0]);
        assert_eq!(out.time, vec![1000.5, 1002.0]);
    }

    #[test]
    fn closures_are_trace_processors() {
        let processor = |mut traces: GazeTraces, _: &Blinks| {
            traces.pupil.iter_mut().for_each(|p| *p *= 2.0);
            traces
        };
        let out = processor.process(traces(vec![1.0]), &Blinks::default());
        assert_eq!(out.pupil, vec![2.0]);
    }
}
