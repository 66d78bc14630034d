//! Cassette configuration for composable per-port replay.

use std::path::{Path, PathBuf};

use super::format::Cassette;
use super::replayer::CassetteReplayer;

/// Per-port cassette file paths. Ports without a cassette fall back to
/// their live adapter when the context is built.
#[derive(Debug, Clone, Default)]
pub struct CassetteConfig {
    /// Path to the chat port cassette file.
    pub llm: Option<PathBuf>,
    /// Path to the filesystem port cassette file.
    pub fs: Option<PathBuf>,
    /// Path to the clock port cassette file.
    pub clock: Option<PathBuf>,
}

/// Per-port replayers, each with its own interaction stream.
pub struct PortReplayers {
    /// Replayer for the chat port.
    pub llm: Option<CassetteReplayer>,
    /// Replayer for the filesystem port.
    pub fs: Option<CassetteReplayer>,
    /// Replayer for the clock port.
    pub clock: Option<CassetteReplayer>,
}

impl CassetteConfig {
    /// Reads the per-port cassette files recorded by a `RecordingSession`
    /// in `dir` (`llm.cassette.yaml`, `fs.cassette.yaml`, `clock.cassette.yaml`),
    /// skipping any that are missing.
    #[must_use]
    pub fn from_session_dir(dir: &Path) -> Self {
        let pick = |port: &str| {
            let path = dir.join(format!("{port}.cassette.yaml"));
            path.exists().then_some(path)
        };
        Self { llm: pick("llm"), fs: pick("fs"), clock: pick("clock") }
    }

    /// Load a single cassette file and create a replayer.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_cassette(path: &Path) -> Result<CassetteReplayer, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read cassette file {}: {e}", path.display()))?;
        let cassette: Cassette = serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse cassette file {}: {e}", path.display()))?;
        Ok(CassetteReplayer::new(&cassette))
    }

    /// Load all configured per-port cassette files and create replayers.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured cassette file cannot be read or parsed.
    pub fn load_all(&self) -> Result<PortReplayers, String> {
        Ok(PortReplayers {
            llm: self.llm.as_deref().map(Self::load_cassette).transpose()?,
            fs: self.fs.as_deref().map(Self::load_cassette).transpose()?,
            clock: self.clock.as_deref().map(Self::load_cassette).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_dir_picks_only_existing_cassettes() {
        let dir = tempfile::tempdir().unwrap();
        let cassette = Cassette::scripted_chat("llm", &["hello"]);
        std::fs::write(
            dir.path().join("llm.cassette.yaml"),
            serde_yaml::to_string(&cassette).unwrap(),
        )
        .unwrap();

        let config = CassetteConfig::from_session_dir(dir.path());
        assert!(config.llm.is_some());
        assert!(config.fs.is_none());

        let mut replayers = config.load_all().unwrap();
        let llm = replayers.llm.as_mut().unwrap();
        assert_eq!(llm.next_interaction("llm", "chat").output["ok"]["text"], "hello");
        assert!(replayers.clock.is_none());
    }

    #[test]
    fn load_cassette_reports_missing_file() {
        let err = CassetteConfig::load_cassette(Path::new("/nonexistent/x.yaml")).err().unwrap();
        assert!(err.contains("Failed to read cassette file"));
    }
}
