//! EEG / Eye-Tracking Parser - read and merge the recordings of one participant
//!
//! This crate loads EEG signals, eye-tracking data, and behavioral logs that are organized
//! in a BIDS-style folder and returns them as aligned in-memory artifacts. Eye-tracking traces
//! are added to the EEG recording as extra channels, and blinks and saccades become `BAD_*`
//! annotations on the EEG timeline.
//!
//! # Overview
//!
//! Each participant lives in its own folder:
//!
//! ```text
//! data/
//! └── sub-01/
//!     ├── eeg/           exactly one EEG header file (e.g. *.vhdr)
//!     ├── eyetracking/   folder handed to the eye-tracking reader
//!     └── beh/           exactly one behavioral *.csv
//! ```
//!
//! Any of the three modality folders may be missing; the corresponding output is then `None`.
//!
//! # Key Features
//!
//! - **Trigger decoding** with pluggable decoders (OpenVibe labels by default)
//! - **Trigger validation** so that every trial onset (code >= 128) is followed by a phase marker
//! - **Per-trial alignment** of the eye-tracker clock to the EEG sample grid
//! - **Gaze and pupil channels** (`GazeX`, `GazeY`, `PupilSize`) merged into the EEG recording
//! - **Blink and saccade annotations** filtered by duration and size thresholds
//! - **Metadata** from the behavioral log, or from the eye-tracking data if there is none
//!
//! # Trigger Convention
//!
//! Codes of 128 and above mark the onset of a trial; lower codes mark phases within a trial.
//! The first phase marker after a trial onset is the trial's second boundary. The EEG time
//! between onset and second boundary is compared with the eye-tracker time between the first
//! trace sample and the same boundary (`t_onset_1` by default) to find the trial's offset:
//!
//! ```text
//! offset = (eeg_t1 - eeg_t0) - (t_onset_1 - first_trace_timestamp)     [ms]
//! ```
//!
//! # Library Usage
//!
//! File formats are supplied by the caller through [`reader::EegReader`] and
//! [`eye::EyeTrackingReader`]. A CSV behavioral reader is built in.
//!
//! ```ignore
//! use std::sync::Arc;
//! use eeg_eyetracking_parser::{ReadConfig, SubjectReader, logging};
//!
//! let config = ReadConfig::from_json_str(r#"{"subject": 2, "folder": "data/"}"#)?;
//! let data = SubjectReader::new(config, Arc::new(MyBrainVision), Arc::new(MyEyeLink))
//!     .with_dispatch(logging::dispatch(tracing::Level::INFO))
//!     .read_subject()?;
//! ```
//!
//! - [`triggers`] - Trigger decoding and validation
//! - [`align`] - Per-trial eye/EEG offsets
//! - [`channels`] - Gaze and pupil channel synthesis
//! - [`artifacts`] - Blink and saccade annotations
//! - [`merger`] - Eye-tracking to EEG merge
//! - [`reader`] - Subject-level orchestration
//!
//! # License
//!
//! This project is licensed under the GNU General Public License v3.0.

pub mod align;
pub mod artifacts;
pub mod channels;
pub mod config;
pub mod error;
pub mod eye;
pub mod layout;
pub mod logging;
pub mod merger;
pub mod metadata;
pub mod raw;
pub mod reader;
pub mod triggers;

pub use config::{EyeReaderOptions, ReadConfig, SubjectId};
pub use error::{ReadError, ReadResult};
pub use merger::{EyeEegMerger, MergeReport, MergerConfig};
pub use metadata::Metadata;
pub use raw::{Annotation, Annotations, ChannelType, RawEeg};
pub use reader::{EegReader, SubjectData, SubjectReader, read_subject};
pub use triggers::{Events, TriggerDecoder, TriggerEvent};
