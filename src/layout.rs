//! BIDS-style directory layout of one subject.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SubjectId;
use crate::error::{ReadError, ReadResult};

/// Modality directories under `<folder>/sub-<id>/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectLayout {
    root: PathBuf,
}

impl SubjectLayout {
    pub fn new(folder: impl AsRef<Path>, subject: &SubjectId) -> Self {
        Self {
            root: folder.as_ref().join(subject.dir_name()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn eeg_dir(&self) -> PathBuf {
        self.root.join("eeg")
    }

    pub fn beh_dir(&self) -> PathBuf {
        self.root.join("beh")
    }

    pub fn eye_dir(&self) -> PathBuf {
        self.root.join("eyetracking")
    }
}

/// The single regular file in `dir` with the given extension.
///
/// Hidden files are ignored. Zero matches is `MissingDataFile`; more than
/// one is `AmbiguousFileSet` listing every candidate in sorted order.
pub fn find_single_file(dir: &Path, extension: &str) -> ReadResult<PathBuf> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with('.'));
        if hidden || !path.is_file() {
            continue;
        }
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        {
            candidates.push(path);
        }
    }
    candidates.sort();

    match candidates.len() {
        0 => Err(ReadError::MissingDataFile {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        }),
        1 => Ok(candidates.remove(0)),
        _ => Err(ReadError::AmbiguousFileSet {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
            candidates,
        }),
    }
}
