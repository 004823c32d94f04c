//! Service configuration.
//!
//! Loaded from a JSON file. Only `document_root` is required; everything
//! else falls back to a default. Leaving `index_dir` unset selects the
//! fallback scanner for the whole process lifetime.

use crate::error::{Error, Result};
use crate::index::store::MIN_WRITER_HEAP_BYTES;
use crate::render::find_program;
use crate::utils::{MarkupSuffixes, expand_home};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// What reconciliation does when a file cannot be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadErrorPolicy {
    /// Fail the whole pass and commit nothing
    #[default]
    Abort,
    /// Log the file, leave its stored state alone and keep going
    Skip,
}

/// Which implementation answers searches when there is no index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScannerKind {
    #[default]
    Builtin,
    Grep,
}

/// Excerpt shaping for indexed search results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcerptOptions {
    pub max_excerpts: usize,
    pub max_chars: usize,
    pub highlight_open: String,
    pub highlight_close: String,
}

impl Default for ExcerptOptions {
    fn default() -> Self {
        Self {
            max_excerpts: default_max_excerpts(),
            max_chars: default_excerpt_chars(),
            highlight_open: default_highlight_open(),
            highlight_close: default_highlight_close(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the served document tree
    pub document_root: PathBuf,

    /// Suffixes treated as markup; a list or a comma-separated string
    #[serde(default, deserialize_with = "deserialize_suffixes")]
    pub markup_suffixes: MarkupSuffixes,

    /// Where the persistent index lives. None means no index.
    #[serde(default)]
    pub index_dir: Option<PathBuf>,

    /// External markup-to-HTML converter
    #[serde(default)]
    pub converter_binary: Option<PathBuf>,

    #[serde(default)]
    pub read_error_policy: ReadErrorPolicy,

    #[serde(default)]
    pub fallback_scanner: ScannerKind,

    #[serde(default = "default_max_excerpts")]
    pub max_excerpts: usize,

    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,

    #[serde(default = "default_highlight_open")]
    pub highlight_open: String,

    #[serde(default = "default_highlight_close")]
    pub highlight_close: String,

    /// Memory budget handed to the index writer
    #[serde(default = "default_writer_heap_bytes")]
    pub writer_heap_bytes: usize,
}

fn default_max_excerpts() -> usize {
    3
}

fn default_excerpt_chars() -> usize {
    150
}

fn default_highlight_open() -> String {
    "<b>".to_string()
}

fn default_highlight_close() -> String {
    "</b>".to_string()
}

fn default_writer_heap_bytes() -> usize {
    50_000_000
}

fn deserialize_suffixes<'de, D>(deserializer: D) -> std::result::Result<MarkupSuffixes, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SuffixSpec {
        List(Vec<String>),
        Comma(String),
    }

    Ok(match SuffixSpec::deserialize(deserializer)? {
        SuffixSpec::List(list) => MarkupSuffixes::new(list),
        SuffixSpec::Comma(list) => MarkupSuffixes::from_comma_list(&list),
    })
}

impl Config {
    /// Config with defaults for everything but the document root
    pub fn new(document_root: impl Into<PathBuf>) -> Self {
        Self {
            document_root: document_root.into(),
            markup_suffixes: MarkupSuffixes::default(),
            index_dir: None,
            converter_binary: None,
            read_error_policy: ReadErrorPolicy::default(),
            fallback_scanner: ScannerKind::default(),
            max_excerpts: default_max_excerpts(),
            excerpt_chars: default_excerpt_chars(),
            highlight_open: default_highlight_open(),
            highlight_close: default_highlight_close(),
            writer_heap_bytes: default_writer_heap_bytes(),
        }
    }

    pub fn with_index_dir(mut self, index_dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(index_dir.into());
        self
    }

    pub fn with_suffixes(mut self, suffixes: MarkupSuffixes) -> Self {
        self.markup_suffixes = suffixes;
        self
    }

    pub fn with_read_error_policy(mut self, policy: ReadErrorPolicy) -> Self {
        self.read_error_policy = policy;
        self
    }

    pub fn with_fallback_scanner(mut self, kind: ScannerKind) -> Self {
        self.fallback_scanner = kind;
        self
    }

    /// Read, parse and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        config.resolve()
    }

    /// Expand and check paths, resolve the converter through PATH
    pub fn resolve(mut self) -> Result<Self> {
        let root = expand_home(&self.document_root);
        if !root.is_dir() {
            return Err(Error::Config(format!(
                "document_root {} is not a directory",
                root.display()
            )));
        }
        self.document_root = root.canonicalize()?;

        if self.markup_suffixes.is_empty() {
            return Err(Error::Config("markup_suffixes must not be empty".to_string()));
        }

        if self.max_excerpts == 0 {
            return Err(Error::Config("max_excerpts must be at least 1".to_string()));
        }

        if self.writer_heap_bytes < MIN_WRITER_HEAP_BYTES {
            return Err(Error::Config(format!(
                "writer_heap_bytes must be at least {} (got {})",
                MIN_WRITER_HEAP_BYTES, self.writer_heap_bytes
            )));
        }

        self.index_dir = self.index_dir.as_deref().map(expand_home);

        if let Some(converter) = self.converter_binary.take() {
            let resolved = if converter.exists() {
                converter
            } else {
                let name = converter.to_string_lossy().into_owned();
                find_program(&name).ok_or_else(|| {
                    Error::Config(format!("can't find converter binary '{}'", name))
                })?
            };
            self.converter_binary = Some(resolved);
        }

        Ok(self)
    }

    pub fn excerpt_options(&self) -> ExcerptOptions {
        ExcerptOptions {
            max_excerpts: self.max_excerpts,
            max_chars: self.excerpt_chars,
            highlight_open: self.highlight_open.clone(),
            highlight_close: self.highlight_close.clone(),
        }
    }
}
