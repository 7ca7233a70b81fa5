use anyhow::Result;
use ndarray::{Array2, ArrayView1, Axis, s};
use serde::{Deserialize, Serialize};
use std::ops::Add;

/// Channel classification carried alongside every row of a [`RawEeg`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Eeg,
    Eog,
    Stim,
    /// Auxiliary, non-physiological channels (gaze position, pupil size)
    Misc,
}

/// A labelled time range on the recording timeline, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub onset: f64,
    pub duration: f64,
    pub description: String,
}

/// Ordered, append-only list of annotations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations(Vec<Annotation>);

impl Annotations {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, onset: f64, duration: f64, description: impl Into<String>) {
        self.0.push(Annotation {
            onset,
            duration,
            description: description.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.0.iter()
    }

    /// Number of annotations with the given description
    pub fn count(&self, description: &str) -> usize {
        self.0.iter().filter(|a| a.description == description).count()
    }
}

impl Add for Annotations {
    type Output = Annotations;

    /// Concatenate, keeping `self` first
    fn add(mut self, rhs: Annotations) -> Annotations {
        self.0.extend(rhs.0);
        self
    }
}

impl FromIterator<Annotation> for Annotations {
    fn from_iter<I: IntoIterator<Item = Annotation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Annotations {
    type Item = &'a Annotation;
    type IntoIter = std::slice::Iter<'a, Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Continuous multi-channel recording held in memory.
///
/// Data is stored as `[channels × samples]`, matching the layout the
/// recorders write.
#[derive(Debug, Clone)]
pub struct RawEeg {
    data: Array2<f64>,
    sfreq: f64,
    ch_names: Vec<String>,
    ch_types: Vec<ChannelType>,
    annotations: Annotations,
}

impl RawEeg {
    pub fn new(
        data: Array2<f64>,
        sfreq: f64,
        ch_names: Vec<String>,
        ch_types: Vec<ChannelType>,
    ) -> Result<Self> {
        if sfreq <= 0.0 || !sfreq.is_finite() {
            anyhow::bail!("Invalid sampling rate: {}", sfreq);
        }
        if ch_names.len() != data.nrows() || ch_types.len() != data.nrows() {
            anyhow::bail!(
                "Channel description mismatch: {} rows, {} names, {} types",
                data.nrows(),
                ch_names.len(),
                ch_types.len()
            );
        }
        Ok(Self {
            data,
            sfreq,
            ch_names,
            ch_types,
            annotations: Annotations::new(),
        })
    }

    /// Attach annotations at construction time (e.g. markers read from disk)
    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Number of samples per channel
    pub fn len(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.data.ncols() == 0
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn ch_names(&self) -> &[String] {
        &self.ch_names
    }

    pub fn ch_types(&self) -> &[ChannelType] {
        &self.ch_types
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Replace the whole annotation set
    pub fn set_annotations(&mut self, annotations: Annotations) {
        self.annotations = annotations;
    }

    /// Look up a channel row by name
    pub fn channel(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.ch_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.data.row(i))
    }

    /// Crop in place to `[tmin, tmax]` seconds, both ends inclusive.
    ///
    /// Annotations are shifted onto the new time origin; those entirely
    /// outside the window are dropped.
    pub fn crop(&mut self, tmin: f64, tmax: f64) -> Result<()> {
        if tmin < 0.0 || tmax < tmin {
            anyhow::bail!("Invalid crop window: {} - {} s", tmin, tmax);
        }
        if self.is_empty() {
            return Ok(());
        }
        let last = self.len() - 1;
        let start = ((tmin * self.sfreq).round() as usize).min(last);
        let end = ((tmax * self.sfreq).round() as usize).min(last);

        self.data = self.data.slice(s![.., start..=end]).to_owned();

        let t0 = start as f64 / self.sfreq;
        let t1 = end as f64 / self.sfreq;
        self.annotations = self
            .annotations
            .iter()
            .filter(|a| a.onset + a.duration >= t0 && a.onset <= t1)
            .map(|a| Annotation {
                onset: a.onset - t0,
                duration: a.duration,
                description: a.description.clone(),
            })
            .collect();
        Ok(())
    }

    /// Append channels recorded at this recording's sampling rate
    pub fn add_channels(
        &mut self,
        names: Vec<String>,
        types: Vec<ChannelType>,
        data: Array2<f64>,
    ) -> Result<()> {
        if data.ncols() != self.len() {
            anyhow::bail!(
                "Cannot add channels with {} samples to a recording with {} samples",
                data.ncols(),
                self.len()
            );
        }
        if names.len() != data.nrows() || types.len() != data.nrows() {
            anyhow::bail!(
                "Channel description mismatch: {} rows, {} names, {} types",
                data.nrows(),
                names.len(),
                types.len()
            );
        }
        if let Some(dup) = names.iter().find(|n| self.ch_names.contains(n)) {
            anyhow::bail!("Channel '{}' already exists", dup);
        }

        self.data = ndarray::concatenate(Axis(0), &[self.data.view(), data.view()])?;
        self.ch_names.extend(names);
        self.ch_types.extend(types);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(n_samples: usize) -> RawEeg {
        let data = Array2::from_shape_fn((2, n_samples), |(c, i)| (c * 1000 + i) as f64);
        RawEeg::new(
            data,
            1000.0,
            vec!["Fz".to_string(), "Cz".to_string()],
            vec![ChannelType::Eeg; 2],
        )
        .unwrap()
    }

    #[test]
    fn crop_is_inclusive_and_shifts_annotations() {
        let mut raw = raw(100);
        let mut annotations = Annotations::new();
        annotations.push(0.005, 0.0, "early");
        annotations.push(0.030, 0.0, "inside");
        raw.set_annotations(annotations);

        raw.crop(0.010, 0.050).unwrap();

        assert_eq!(raw.len(), 41);
        assert_eq!(raw.data()[[0, 0]], 10.0);
        assert_eq!(raw.annotations().len(), 1);
        let kept = raw.annotations().iter().next().unwrap();
        assert_eq!(kept.description, "inside");
        assert!((kept.onset - 0.020).abs() < 1e-12);
    }

    #[test]
    fn crop_beyond_end_clamps() {
        let mut raw = raw(100);
        raw.crop(0.0, 10.0).unwrap();
        assert_eq!(raw.len(), 100);
    }

    #[test]
    fn add_channels_appends_rows() {
        let mut raw = raw(10);
        raw.add_channels(
            vec!["GazeX".to_string()],
            vec![ChannelType::Misc],
            Array2::zeros((1, 10)),
        )
        .unwrap();
        assert_eq!(raw.n_channels(), 3);
        assert_eq!(raw.ch_types()[2], ChannelType::Misc);
        assert!(raw.channel("GazeX").is_some());
    }

    #[test]
    fn add_channels_rejects_length_mismatch() {
        let mut raw = raw(10);
        let err = raw
            .add_channels(vec!["GazeX".to_string()], vec![ChannelType::Misc], Array2::zeros((1, 9)))
            .unwrap_err();
        assert!(err.to_string().contains("9 samples"));
    }

    #[test]
    fn annotations_concatenate_in_order() {
        let mut a = Annotations::new();
        a.push(1.0, 0.0, "1");
        let mut b = Annotations::new();
        b.push(0.5, 0.1, "BAD_BLINK");
        let joined = a + b;
        let descriptions: Vec<_> = joined.iter().map(|a| a.description.as_str()).collect();
        assert_eq!(descriptions, vec!["1", "BAD_BLINK"]);
    }
}
