//! The output directory of a synthesis run.
//!
//! Every file the pipeline produces is written through as soon as it
//! exists in memory, so an abort between phases leaves the directory
//! consistent with the last completed phase. Layout:
//!
//! ```text
//! <root>/
//!   ├── README.md
//!   ├── <generated files...>
//!   ├── STRUCTURE_REVIEW.json
//!   ├── SENIOR_REVIEW_HISTORY.json
//!   └── SENIOR_REVIEW_ISSUES_ATTEMPT_<n>.md
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::context::ServiceContext;
use crate::error::{SynthError, SynthResult};
use crate::synth::model::GeneratedFiles;

/// Final structure review artifact.
pub const STRUCTURE_REVIEW_FILE: &str = "STRUCTURE_REVIEW.json";
/// Senior review history artifact.
pub const REVIEW_HISTORY_FILE: &str = "SENIOR_REVIEW_HISTORY.json";

/// Name of the issue artifact for review attempt `attempt`.
#[must_use]
pub fn issues_artifact_name(attempt: u32) -> String {
    format!("SENIOR_REVIEW_ISSUES_ATTEMPT_{attempt}.md")
}

/// Output directory of one run. All I/O goes through `ctx.fs`.
pub struct ProjectWorkspace<'a> {
    ctx: &'a ServiceContext,
    root: PathBuf,
}

impl<'a> ProjectWorkspace<'a> {
    /// Creates a workspace rooted at `root`.
    #[must_use]
    pub fn new(ctx: &'a ServiceContext, root: &Path) -> Self {
        Self { ctx, root: root.to_path_buf() }
    }

    /// Output directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `content` to the relative path `rel`.
    ///
    /// # Errors
    ///
    /// Returns [`SynthError::Io`] if the write fails.
    pub fn write(&self, rel: &str, content: &str) -> SynthResult<()> {
        let path = self.root.join(rel);
        debug!(path = rel, bytes = content.len(), "writing project file");
        self.ctx.fs.write(&path, content).map_err(|e| SynthError::io(rel, e))
    }

    /// Serialises `value` as pretty JSON into `rel`.
    ///
    /// # Errors
    ///
    /// Returns [`SynthError::Io`] if serialisation or the write fails.
    pub fn write_json<T: Serialize>(&self, rel: &str, value: &T) -> SynthResult<()> {
        let mut json = serde_json::to_string_pretty(value).map_err(|e| SynthError::io(rel, e))?;
        json.push('\n');
        self.write(rel, &json)
    }

    /// Reads the relative path `rel`.
    ///
    /// # Errors
    ///
    /// Returns [`SynthError::Io`] if the file cannot be read.
    pub fn read(&self, rel: &str) -> SynthResult<String> {
        self.ctx.fs.read_to_string(&self.root.join(rel)).map_err(|e| SynthError::io(rel, e))
    }

    /// Loads every readable text file below the root. Unreadable files
    /// (binary, permissions) are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`SynthError::Io`] if the root cannot be listed.
    pub fn load_all(&self) -> SynthResult<GeneratedFiles> {
        let root_label = self.root.display().to_string();
        let paths = self.ctx.fs.list_files(&self.root).map_err(|e| SynthError::io(&root_label, e))?;
        let mut files = GeneratedFiles::new();
        for rel in paths {
            match self.read(&rel) {
                Ok(content) => {
                    files.insert(rel, content);
                }
                Err(e) => warn!(path = %rel, error = %e, "skipping unreadable file"),
            }
        }
        Ok(files)
    }
}
