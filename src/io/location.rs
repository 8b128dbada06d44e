//! Where a packet log lives.

use crate::TrackingKeys;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// A packet log's origin: a local path or a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Path(PathBuf),
    Url(Url),
}

impl SourceLocation {
    /// Interpret user input as a URL when it has a scheme, otherwise as a path.
    ///
    /// Single-letter schemes are treated as Windows drive letters.
    pub fn parse(input: &str) -> Self {
        match Url::parse(input) {
            Ok(url) if url.scheme().len() > 1 => SourceLocation::Url(url),
            _ => SourceLocation::Path(PathBuf::from(input)),
        }
    }

    /// The final path component, used for tracking keys and sidecar lookup.
    pub fn basename(&self) -> Option<String> {
        match self {
            SourceLocation::Path(path) => {
                path.file_name().map(|name| name.to_string_lossy().into_owned())
            }
            SourceLocation::Url(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|segment| !segment.is_empty())
                .map(str::to_string),
        }
    }

    /// Tracking keys promised by this log's name.
    pub fn tracking_keys(&self) -> TrackingKeys {
        self.basename().map(|name| TrackingKeys::from_basename(&name)).unwrap_or_default()
    }

    /// Prefer a local copy of a remote log.
    ///
    /// A URL whose basename exists as a file under `storage_directory` is
    /// replaced by that file. Paths are returned unchanged.
    pub fn with_local_copy(self, storage_directory: Option<&Path>) -> Self {
        let (SourceLocation::Url(url), Some(directory)) = (&self, storage_directory) else {
            return self;
        };
        let Some(name) = self.basename() else {
            return self;
        };

        let candidate = directory.join(&name);
        if candidate.is_file() {
            debug!("Using local copy {} for {}", candidate.display(), url);
            SourceLocation::Path(candidate)
        } else {
            self
        }
    }
}

impl From<PathBuf> for SourceLocation {
    fn from(path: PathBuf) -> Self {
        SourceLocation::Path(path)
    }
}

impl From<&Path> for SourceLocation {
    fn from(path: &Path) -> Self {
        SourceLocation::Path(path.to_path_buf())
    }
}

impl From<Url> for SourceLocation {
    fn from(url: Url) -> Self {
        SourceLocation::Url(url)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Path(path) => write!(f, "{}", path.display()),
            SourceLocation::Url(url) => write!(f, "{}", url),
        }
    }
}
