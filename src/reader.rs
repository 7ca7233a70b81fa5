//! Reading one subject: EEG, behavioral log and eye tracking, merged.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::Dispatch;

use crate::config::{ReadConfig, SubjectId};
use crate::error::{ReadError, ReadResult};
use crate::eye::trace::{BlinkReconstructor, TraceProcessor};
use crate::eye::{EyeReadMode, EyeReadRequest, EyeTable, EyeTrackingReader};
use crate::layout::{SubjectLayout, find_single_file};
use crate::merger::{EyeEegMerger, MergeReport, MergerConfig};
use crate::metadata::{BehavioralReader, CsvBehavioralReader, Metadata};
use crate::raw::RawEeg;
use crate::triggers::{
    Events, OpenVibeDecoder, TriggerDecoder, annotations_from_events, events_from_annotations,
    validate_events,
};

/// Loads a continuous EEG recording from its header file
pub trait EegReader: Send + Sync {
    /// Extension (without the dot) of the file handed to [`EegReader::read`]
    fn extension(&self) -> &str;

    fn read(&self, path: &Path) -> anyhow::Result<RawEeg>;
}

/// Everything read for one subject. A modality whose directory is absent
/// leaves its field empty.
#[derive(Debug, Clone, Default)]
pub struct SubjectData {
    pub raw: Option<RawEeg>,
    pub events: Option<Events>,
    pub metadata: Option<Metadata>,
    /// Present when eye tracking was merged into the EEG
    pub merge: Option<MergeReport>,
}

/// Reads and merges the recordings of one subject.
///
/// ```ignore
/// let data = SubjectReader::new(config, Arc::new(BrainVision), Arc::new(EyeLink))
///     .with_dispatch(logging::dispatch(Level::INFO))
///     .read_subject()?;
/// ```
pub struct SubjectReader {
    config: ReadConfig,
    eeg_reader: Arc<dyn EegReader>,
    eye_reader: Arc<dyn EyeTrackingReader>,
    beh_reader: Arc<dyn BehavioralReader>,
    decoder: Arc<dyn TriggerDecoder>,
    trace_processor: Arc<dyn TraceProcessor>,
    dispatch: Option<Dispatch>,
}

impl SubjectReader {
    pub fn new(
        config: ReadConfig,
        eeg_reader: Arc<dyn EegReader>,
        eye_reader: Arc<dyn EyeTrackingReader>,
    ) -> Self {
        Self {
            config,
            eeg_reader,
            eye_reader,
            beh_reader: Arc::new(CsvBehavioralReader),
            decoder: Arc::new(OpenVibeDecoder),
            trace_processor: Arc::new(BlinkReconstructor::default()),
            dispatch: None,
        }
    }

    pub fn with_behavioral_reader(mut self, reader: Arc<dyn BehavioralReader>) -> Self {
        self.beh_reader = reader;
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn TriggerDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Processor applied to the full-resolution traces before merging
    pub fn with_trace_processor(mut self, processor: Arc<dyn TraceProcessor>) -> Self {
        self.trace_processor = processor;
        self
    }

    /// Send this reader's log output to `dispatch` instead of the caller's
    /// current default
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn config(&self) -> &ReadConfig {
        &self.config
    }

    pub fn layout(&self) -> SubjectLayout {
        SubjectLayout::new(&self.config.folder, &self.config.subject)
    }

    pub fn read_subject(&self) -> ReadResult<SubjectData> {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, || self.read()),
            None => self.read(),
        }
    }

    fn read(&self) -> ReadResult<SubjectData> {
        let span = tracing::info_span!("read_subject", subject = %self.config.subject);
        let _enter = span.enter();

        let layout = self.layout();
        tracing::info!("Reading subject data from {}", layout.root().display());

        let mut eeg = self.read_eeg(&layout.eeg_dir())?;
        let mut metadata = self.read_behavior(&layout.beh_dir())?;
        let mut summary = self.read_eye(&layout.eye_dir())?;

        let mut merge = None;
        if let (Some((raw, events)), Some(summary)) = (eeg.as_mut(), summary.as_mut()) {
            check_trial_counts(events, summary)?;
            merge = Some(self.merge(&layout.eye_dir(), raw, events, summary)?);
        }

        if metadata.is_none()
            && let Some(summary) = &summary
        {
            tracing::info!("Taking metadata from eye-tracking data");
            metadata = Some(Metadata::from_eye_table(summary));
        }

        if let (Some((_, events)), Some(summary)) = (&eeg, &summary) {
            check_trial_counts(events, summary)?;
            tracing::info!("EEG data and metadata have matching length");
        }

        let (raw, events) = eeg.unzip();
        Ok(SubjectData {
            raw,
            events,
            metadata,
            merge,
        })
    }

    fn read_eeg(&self, dir: &Path) -> ReadResult<Option<(RawEeg, Events)>> {
        if !dir.is_dir() {
            tracing::info!("No EEG data detected");
            return Ok(None);
        }
        let path = find_single_file(dir, self.eeg_reader.extension())?;
        tracing::info!("Loading EEG data from {}", path.display());
        let mut raw = self
            .eeg_reader
            .read(&path)
            .with_context(|| format!("Failed to read EEG data from {}", path.display()))?;

        tracing::info!("Creating events from annotations");
        let events = events_from_annotations(raw.annotations(), raw.sfreq(), self.decoder.as_ref());
        tracing::debug!("Decoded {} triggers, {} trial onsets", events.len(), events.n_trials());

        if let Some(margin) = self.config.eeg_margin
            && let Some(last) = events.last_sample()
        {
            let duration = raw.len().saturating_sub(1) as f64 / raw.sfreq();
            let end = duration.min(last as f64 / raw.sfreq() + margin);
            tracing::info!("Trimming EEG to 0 - {:.3} s", end);
            raw.crop(0.0, end)?;
        }

        tracing::info!("Validating events");
        validate_events(&events)?;

        tracing::info!("Creating annotations from events");
        raw.set_annotations(annotations_from_events(&events, raw.sfreq()));
        Ok(Some((raw, events)))
    }

    fn read_behavior(&self, dir: &Path) -> ReadResult<Option<Metadata>> {
        if !dir.is_dir() {
            tracing::info!("No behavioral data detected");
            return Ok(None);
        }
        let path = find_single_file(dir, self.beh_reader.extension())?;
        tracing::info!("Loading behavioral data from {}", path.display());
        let metadata = self
            .beh_reader
            .read(&path)
            .with_context(|| format!("Failed to read behavioral data from {}", path.display()))?;
        Ok(Some(metadata))
    }

    fn read_eye(&self, dir: &Path) -> ReadResult<Option<EyeTable>> {
        if !dir.is_dir() {
            tracing::info!("No eye data detected");
            return Ok(None);
        }
        tracing::info!("Loading eye data from {}", dir.display());
        let table = self.read_eye_table(dir, &EyeReadMode::Summary)?;
        tracing::debug!("Read {} eye-tracking trials", table.len());
        Ok(Some(table))
    }

    fn read_eye_table(&self, dir: &Path, mode: &EyeReadMode) -> ReadResult<EyeTable> {
        let request = EyeReadRequest {
            mode,
            options: &self.config.eye_options,
        };
        let table = self
            .eye_reader
            .read(dir, &request)
            .with_context(|| format!("Failed to read eye-tracking data from {}", dir.display()))?;
        Ok(table)
    }

    fn merge(
        &self,
        dir: &Path,
        raw: &mut RawEeg,
        events: &Events,
        summary: &mut EyeTable,
    ) -> ReadResult<MergeReport> {
        let mode = EyeReadMode::FullResolution {
            phase: self.config.trial_phase.clone(),
        };
        let mut full = self.read_eye_table(dir, &mode)?;

        let merger = EyeEegMerger::new(MergerConfig {
            thresholds: self.config.thresholds(),
            boundary_column: self.config.second_boundary_column.clone(),
        })
        .with_trace_processor(Arc::clone(&self.trace_processor));
        let report = merger.merge(raw, events, summary, &mut full)?;
        tracing::debug!("{}", report.summary());
        Ok(report)
    }
}

fn check_trial_counts(events: &Events, eye: &EyeTable) -> ReadResult<()> {
    let eeg = events.n_trials();
    if eeg != eye.len() {
        return Err(ReadError::TrialCountMismatch { eeg, eye: eye.len() });
    }
    Ok(())
}

/// Read a subject with the default configuration and collaborators
pub fn read_subject(
    subject: impl Into<SubjectId>,
    folder: impl AsRef<Path>,
    eeg_reader: Arc<dyn EegReader>,
    eye_reader: Arc<dyn EyeTrackingReader>,
) -> ReadResult<SubjectData> {
    let config = ReadConfig {
        subject: subject.into(),
        folder: folder.as_ref().to_path_buf(),
        ..Default::default()
    };
    SubjectReader::new(config, eeg_reader, eye_reader).read_subject()
}
