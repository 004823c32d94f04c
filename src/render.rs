//! Markup-to-HTML conversion through an external converter process.

use crate::error::{Error, Result};
use crate::utils::MarkupSuffixes;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Look `name` up on `PATH`, returning the first executable match
pub fn find_program(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(name);
        return is_executable(&path).then_some(path);
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Runs the converter on markup files under a document root
#[derive(Debug, Clone)]
pub struct Renderer {
    converter: PathBuf,
    root: PathBuf,
    suffixes: MarkupSuffixes,
}

impl Renderer {
    pub fn new(converter: &Path, root: &Path, suffixes: &MarkupSuffixes) -> Self {
        Self {
            converter: converter.to_path_buf(),
            root: root.to_path_buf(),
            suffixes: suffixes.clone(),
        }
    }

    pub fn converter(&self) -> &Path {
        &self.converter
    }

    /// Convert the file at `rel_path` (relative to the root) and return
    /// the converter's standard output
    pub fn render(&self, rel_path: &str) -> Result<String> {
        let path = self.resolve(rel_path)?;

        log::debug!("rendering {} with {}", path.display(), self.converter.display());
        let output = Command::new(&self.converter)
            .arg(&path)
            .output()
            .map_err(|e| Error::Render {
                path: path.clone(),
                message: format!("cannot run {}: {}", self.converter.display(), e),
            })?;

        if !output.status.success() {
            return Err(Error::Render {
                path,
                message: format!(
                    "converter failed with {}: {} {}",
                    output.status,
                    String::from_utf8_lossy(&output.stdout).trim(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Absolute path of a markup file inside the root
    fn resolve(&self, rel_path: &str) -> Result<PathBuf> {
        let joined = self.root.join(rel_path.trim_start_matches('/'));
        let path = joined.canonicalize()?;

        if !path.starts_with(&self.root) {
            return Err(Error::Render {
                path,
                message: "outside the document root".to_string(),
            });
        }
        if !path.is_file() || !self.suffixes.matches(&path) {
            return Err(Error::Render {
                path,
                message: "not a markup file".to_string(),
            });
        }
        Ok(path)
    }
}
