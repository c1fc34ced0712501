//! Call-site attribution
//!
//! Labels a dump with the source line it was made from. Lookups are best
//! effort: the dumper drops the label when they fail.

use std::collections::HashMap;
use std::fs;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Finds the source text of a call site
pub trait SourceLocator: Send + Sync {
    /// Source line at `site`, trimmed for display
    ///
    /// `accessor` names the method the value was dumped through; the line
    /// is cut just before `.accessor`.
    fn line_of(
        &self,
        site: &Location<'_>,
        accessor: Option<&str>,
        root: Option<&Path>,
    ) -> Result<String>;
}

/// Reads call-site lines from source files on disk
///
/// Relative paths are resolved against `root` when given, otherwise
/// against the working directory and its ancestors. Each file is read
/// once and its text kept for later lookups.
#[derive(Debug, Default)]
pub struct FileSourceLocator {
    files: Mutex<HashMap<(String, Option<PathBuf>), Arc<str>>>,
}

impl FileSourceLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text of `file`, read from disk on first use
    fn text_of(&self, file: &str, root: Option<&Path>) -> Result<Arc<str>> {
        let key = (file.to_string(), root.map(Path::to_path_buf));
        if let Some(text) = self.files.lock().get(&key) {
            return Ok(text.clone());
        }

        let path = Self::resolve(file, root)?;
        let text: Arc<str> = fs::read_to_string(&path)?.into();
        self.files.lock().insert(key, text.clone());
        Ok(text)
    }

    fn lookup(
        &self,
        file: &str,
        line: u32,
        accessor: Option<&str>,
        root: Option<&Path>,
    ) -> Result<String> {
        let text = self.text_of(file, root)?;
        let found = line_at(&text, line)
            .ok_or_else(|| Error::Custom(format!("{} has no line {}", file, line)))?;
        Ok(trim_line(found, accessor))
    }

    fn resolve(file: &str, root: Option<&Path>) -> Result<PathBuf> {
        let path = Path::new(file);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }

        if let Some(root) = root {
            return Ok(root.join(path));
        }

        let cwd = std::env::current_dir()?;
        cwd.ancestors()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| Error::Custom(format!("Source file not found: {}", file)))
    }
}

impl SourceLocator for FileSourceLocator {
    fn line_of(
        &self,
        site: &Location<'_>,
        accessor: Option<&str>,
        root: Option<&Path>,
    ) -> Result<String> {
        self.lookup(site.file(), site.line(), accessor, root)
    }
}

/// 1-based line lookup
fn line_at(text: &str, line: u32) -> Option<&str> {
    let index = usize::try_from(line).ok()?.checked_sub(1)?;
    text.lines().nth(index)
}

/// Clean a source line up for use as a label
pub fn trim_line(line: &str, accessor: Option<&str>) -> String {
    let mut line = line.trim();

    // `let total = value.dump_with(..)` labels as `value`
    if line.starts_with("let ") {
        if let Some(index) = line.find(" = ") {
            line = line[index + 3..].trim_start();
        }
    }

    if let Some(accessor) = accessor.filter(|a| !a.is_empty()) {
        if let Some(index) = line.find(&format!(".{}", accessor)) {
            line = &line[..index];
        }
    }

    // `dumper.dump(&x, None).await.unwrap()` labels as the call itself
    if let Some(index) = line.find(".await") {
        line = &line[..index];
    }

    line.trim().trim_end_matches(';').trim_end().to_string()
}
