use std::fs::{self, OpenOptions};
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::is_reference_line;
use crate::error::ModfetchError;

#[derive(Debug, Clone)]
pub struct ReferenceFile {
    path: Utf8PathBuf,
}

impl ReferenceFile {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn read(&self) -> Result<Vec<String>, ModfetchError> {
        let content = fs::read_to_string(self.path.as_std_path())
            .map_err(|err| ModfetchError::Filesystem(format!("read {}: {err}", self.path)))?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| is_reference_line(line))
            .map(str::to_string)
            .collect())
    }

    pub fn append(&self, url: &str) -> Result<(), ModfetchError> {
        let needs_newline = fs::read(self.path.as_std_path())
            .map(|bytes| bytes.last().is_some_and(|last| *last != b'\n'))
            .unwrap_or(false);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.as_std_path())
            .map_err(|err| ModfetchError::Filesystem(format!("open {}: {err}", self.path)))?;
        if needs_newline {
            file.write_all(b"\n")
                .map_err(|err| ModfetchError::Filesystem(err.to_string()))?;
        }
        writeln!(file, "{url}").map_err(|err| ModfetchError::Filesystem(err.to_string()))?;
        Ok(())
    }
}
