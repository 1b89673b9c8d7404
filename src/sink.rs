use eyre::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Destination for finished documents, keyed by file stem.
///
/// Implementations are shared across export workers.
pub trait Sink: Sync {
    fn persist(&self, stem: &str, markdown: &str) -> Result<PathBuf>;
}

/// Writes `<target_dir>/<stem>.md`, replacing any existing file.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    target_dir: PathBuf,
}

impl DirectorySink {
    /// Create the target directory (and parents) if needed.
    pub fn create(target_dir: &Path) -> Result<Self> {
        fs::create_dir_all(target_dir).wrap_err_with(|| {
            format!("Failed to create target directory: {}", target_dir.display())
        })?;
        Ok(Self {
            target_dir: target_dir.to_path_buf(),
        })
    }
}

impl Sink for DirectorySink {
    fn persist(&self, stem: &str, markdown: &str) -> Result<PathBuf> {
        let path = self.target_dir.join(format!("{}.md", stem));
        let file = File::create(&path)
            .wrap_err_with(|| format!("Failed to create: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(markdown.as_bytes())
            .wrap_err_with(|| format!("Failed to write: {}", path.display()))?;
        writer
            .flush()
            .wrap_err_with(|| format!("Failed to flush: {}", path.display()))?;
        Ok(path)
    }
}
