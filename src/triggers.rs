//! Trigger decoding and validation.
//!
//! EEG recordings carry task events as text annotations. A [`TriggerDecoder`]
//! turns each label into an integer code; codes of 128 and above mark the
//! start of a trial, lower codes mark phases within a trial. The first phase
//! marker after a trial onset is the trial's second boundary and is what the
//! eye-tracking alignment is anchored on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ReadError, ReadResult};
use crate::raw::Annotations;

/// Codes at or above this value mark the onset of a trial
pub const TRIAL_ONSET_THRESHOLD: i32 = 128;

/// A decoded trigger: `(sample, previous, code)` in the usual events layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub sample: i64,
    pub previous: i64,
    pub code: i32,
}

impl TriggerEvent {
    pub fn new(sample: i64, code: i32) -> Self {
        Self {
            sample,
            previous: 0,
            code,
        }
    }

    pub fn is_trial_onset(&self) -> bool {
        self.code >= TRIAL_ONSET_THRESHOLD
    }
}

/// Ordered trigger table plus the label → code mapping it was decoded with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Events {
    pub events: Vec<TriggerEvent>,
    pub event_id: BTreeMap<String, i32>,
}

impl Events {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of trial-onset codes
    pub fn n_trials(&self) -> usize {
        trial_triggers(self).count()
    }

    pub fn last_sample(&self) -> Option<i64> {
        self.events.last().map(|e| e.sample)
    }
}

/// Converts an annotation label into a trigger code.
///
/// Returning `None` marks the label as something other than a trigger
/// (segment boundaries, comments) and drops it from the events.
pub trait TriggerDecoder: Send + Sync {
    fn decode(&self, label: &str) -> Option<i32>;
}

impl<F> TriggerDecoder for F
where
    F: Fn(&str) -> Option<i32> + Send + Sync,
{
    fn decode(&self, label: &str) -> Option<i32> {
        self(label)
    }
}

/// Default decoder for triggers written by OpenVibe through BrainVision.
///
/// Understands `Stimulus/OVTK_StimulationId_Label_XX` (hexadecimal byte),
/// BrainVision stimulus markers such as `Stimulus/S  1` or `S128`, and bare
/// integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenVibeDecoder;

const OPENVIBE_LABEL_PREFIX: &str = "OVTK_StimulationId_Label_";

impl TriggerDecoder for OpenVibeDecoder {
    fn decode(&self, label: &str) -> Option<i32> {
        let label = label.trim();
        let label = label.strip_prefix("Stimulus/").unwrap_or(label);

        if let Some(hex) = label.strip_prefix(OPENVIBE_LABEL_PREFIX) {
            return i32::from_str_radix(hex.trim(), 16).ok();
        }
        if let Some(digits) = label.strip_prefix('S') {
            return digits.trim().parse().ok();
        }
        label.parse().ok()
    }
}

/// Decode annotations into trigger events.
///
/// Onsets are converted to the nearest sample index. Each distinct label
/// that decodes successfully is recorded in `event_id`.
pub fn events_from_annotations(
    annotations: &Annotations,
    sfreq: f64,
    decoder: &dyn TriggerDecoder,
) -> Events {
    let mut events = Events::default();
    for annotation in annotations {
        let Some(code) = decoder.decode(&annotation.description) else {
            tracing::debug!("Skipping non-trigger annotation '{}'", annotation.description);
            continue;
        };
        let sample = (annotation.onset * sfreq).round() as i64;
        events.events.push(TriggerEvent::new(sample, code));
        events
            .event_id
            .entry(annotation.description.clone())
            .or_insert(code);
    }
    events
}

/// Check that the trigger sequence can be split into trials.
///
/// Events must be strictly time-ordered, codes must be positive, and every
/// trial onset must be immediately followed by a phase marker. Onset codes
/// have no upper bound, so decoders may number trials past one byte.
pub fn validate_events(events: &Events) -> ReadResult<()> {
    let malformed =
        |index: usize, reason: String| ReadError::MalformedTriggerSequence { index, reason };

    let mut seen_trial = false;
    for (index, event) in events.events.iter().enumerate() {
        if event.code < 1 {
            return Err(malformed(index, format!("code {} is not a valid trigger", event.code)));
        }

        if let Some(prev) = index.checked_sub(1).map(|i| events.events[i])
            && event.sample <= prev.sample
        {
            return Err(malformed(
                index,
                format!("sample {} does not follow sample {}", event.sample, prev.sample),
            ));
        }

        if event.is_trial_onset() {
            seen_trial = true;
            match events.events.get(index + 1) {
                Some(next) if !next.is_trial_onset() => {}
                Some(next) => {
                    return Err(malformed(
                        index,
                        format!("trial onset {} followed by trial onset {}", event.code, next.code),
                    ));
                }
                None => {
                    return Err(malformed(
                        index,
                        format!("trial onset {} is the last event", event.code),
                    ));
                }
            }
        } else if !seen_trial {
            return Err(malformed(
                index,
                format!("phase marker {} precedes the first trial onset", event.code),
            ));
        }
    }
    Ok(())
}

/// Iterate over trial-onset events in order
pub fn trial_triggers(events: &Events) -> impl Iterator<Item = &TriggerEvent> + '_ {
    events.events.iter().filter(|e| e.is_trial_onset())
}

/// Pair each trial onset with the marker that immediately follows it.
///
/// Assumes a sequence that passed [`validate_events`]; a trailing onset
/// without a successor is skipped.
pub fn trial_bounds(events: &Events) -> Vec<(TriggerEvent, TriggerEvent)> {
    events
        .events
        .windows(2)
        .filter(|pair| pair[0].is_trial_onset())
        .map(|pair| (pair[0], pair[1]))
        .collect()
}

/// One zero-duration annotation per event, labelled with its code
pub fn annotations_from_events(events: &Events, sfreq: f64) -> Annotations {
    events
        .events
        .iter()
        .map(|e| crate::raw::Annotation {
            onset: e.sample as f64 / sfreq,
            duration: 0.0,
            description: e.code.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn events(pairs: &[(i64, i32)]) -> Events {
        Events {
            events: pairs.iter().map(|&(s, c)| TriggerEvent::new(s, c)).collect(),
            event_id: BTreeMap::new(),
        }
    }

    #[test]
    fn openvibe_decoder_understands_known_labels() {
        let decoder = OpenVibeDecoder;
        assert_eq!(decoder.decode("Stimulus/OVTK_StimulationId_Label_80"), Some(128));
        assert_eq!(decoder.decode("OVTK_StimulationId_Label_01"), Some(1));
        assert_eq!(decoder.decode("Stimulus/S  1"), Some(1));
        assert_eq!(decoder.decode("S128"), Some(128));
        assert_eq!(decoder.decode("42"), Some(42));
        assert_eq!(decoder.decode("New Segment/"), None);
        assert_eq!(decoder.decode("Comment/no USB Connection to actiCAP"), None);
    }

    #[test]
    fn closures_are_decoders() {
        let decoder = |label: &str| label.strip_prefix("T").and_then(|c| c.parse::<i32>().ok());
        let mut annotations = Annotations::new();
        annotations.push(1.0, 0.0, "T128");
        annotations.push(1.05, 0.0, "T1");
        let events = events_from_annotations(&annotations, 1000.0, &decoder);
        assert_eq!(
            events.events,
            vec![TriggerEvent::new(1000, 128), TriggerEvent::new(1050, 1)]
        );
        assert_eq!(events.event_id.get("T128"), Some(&128));
    }

    #[test]
    fn non_trigger_labels_are_skipped() {
        let mut annotations = Annotations::new();
        annotations.push(0.0, 0.0, "New Segment/");
        annotations.push(0.5, 0.0, "S128");
        let events = events_from_annotations(&annotations, 500.0, &OpenVibeDecoder);
        assert_eq!(events.events, vec![TriggerEvent::new(250, 128)]);
    }

    #[test]
    fn valid_sequence_passes() {
        let events = events(&[(1000, 128), (1050, 1), (1500, 2), (5000, 129), (5050, 1)]);
        validate_events(&events).unwrap();
        assert_eq!(events.n_trials(), 2);
        let bounds = trial_bounds(&events);
        assert_eq!(bounds.len(), 2);
        assert_eq!(bounds[1].0.sample, 5000);
        assert_eq!(bounds[1].1.sample, 5050);
    }

    #[test]
    fn back_to_back_trial_onsets_are_rejected() {
        let events = events(&[(1000, 128), (1050, 129), (1100, 1)]);
        let err = validate_events(&events).unwrap_err();
        assert!(matches!(err, ReadError::MalformedTriggerSequence { index: 0, .. }));
    }

    #[test]
    fn trailing_trial_onset_is_rejected() {
        let events = events(&[(1000, 128), (1050, 1), (2000, 129)]);
        let err = validate_events(&events).unwrap_err();
        assert!(matches!(err, ReadError::MalformedTriggerSequence { index: 2, .. }));
    }

    #[test]
    fn leading_phase_marker_is_rejected() {
        let events = events(&[(10, 1), (1000, 128), (1050, 1)]);
        assert!(validate_events(&events).is_err());
    }

    #[test]
    fn unordered_samples_are_rejected() {
        let events = events(&[(1000, 128), (1000, 1)]);
        let err = validate_events(&events).unwrap_err();
        assert!(matches!(err, ReadError::MalformedTriggerSequence { index: 1, .. }));
    }

    #[test]
    fn non_positive_codes_are_rejected() {
        assert!(validate_events(&events(&[(1000, 128), (1050, 0)])).is_err());
        assert!(validate_events(&events(&[(1000, 128), (1050, -3)])).is_err());
    }

    #[test]
    fn onset_codes_past_one_byte_are_trials() {
        let events = events(&[(1000, 300), (1050, 1), (2000, 1128), (2050, 2)]);
        validate_events(&events).unwrap();
        assert_eq!(events.n_trials(), 2);
    }

    #[test]
    fn annotations_mirror_events() {
        let events = events(&[(1000, 128), (1050, 1)]);
        let annotations = annotations_from_events(&events, 500.0);
        let onsets: Vec<f64> = annotations.iter().map(|a| a.onset).collect();
        assert_eq!(onsets, vec![2.0, 2.1]);
        assert_eq!(annotations.count("128"), 1);
    }

    proptest! {
        #[test]
        fn decoding_never_drops_a_trigger(
            gaps in proptest::collection::vec((1u32..5000, 1u32..2000, 1i32..128), 1..40)
        ) {
            let mut annotations = Annotations::new();
            let mut t = 0u64;
            for (i, (gap, phase_gap, phase)) in gaps.iter().enumerate() {
                t += *gap as u64;
                let trial = TRIAL_ONSET_THRESHOLD + (i as i32 % 128);
                annotations.push(t as f64 / 1000.0, 0.0, format!("Stimulus/S{trial}"));
                t += *phase_gap as u64;
                annotations.push(t as f64 / 1000.0, 0.0, format!("Stimulus/S{phase:>3}"));
            }

            let events = events_from_annotations(&annotations, 1000.0, &OpenVibeDecoder);
            prop_assert_eq!(events.len(), annotations.len());
            prop_assert!(validate_events(&events).is_ok());
            prop_assert_eq!(events.n_trials(), gaps.len());
        }
    }
}
