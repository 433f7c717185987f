//! Source providers
//!
//! A [`SourceProvider`] resolves a source name to script text. The session loop
//! uses it for command-line files; the `read` and `ghostify` built-ins use it for
//! names given by scripts.

use std::fs;
use std::io;
use std::path::PathBuf;

use rustc_hash::FxHashMap;
use thiserror::Error;

/// Failure to turn a source name into text
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("'{name}' not found")]
    NotFound { name: String },

    #[error("error reading '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("'{name}' is not valid UTF-8")]
    InvalidUtf8 { name: String },
}

pub trait SourceProvider {
    fn load_source(&self, name: &str) -> Result<String, LoadError>;
}

/// Reads sources from the file system, relative names resolved against `base`
#[derive(Debug, Clone, Default)]
pub struct FileSystemSources {
    base: Option<PathBuf>,
}

impl FileSystemSources {
    pub fn new() -> Self {
        FileSystemSources::default()
    }

    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        FileSystemSources {
            base: Some(base.into()),
        }
    }
}

impl SourceProvider for FileSystemSources {
    fn load_source(&self, name: &str) -> Result<String, LoadError> {
        let path = match &self.base {
            Some(base) => base.join(name),
            None => PathBuf::from(name),
        };

        let bytes = fs::read(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound {
                name: name.to_string(),
            },
            _ => LoadError::Io {
                name: name.to_string(),
                source: err,
            },
        })?;

        String::from_utf8(bytes).map_err(|_| LoadError::InvalidUtf8 {
            name: name.to_string(),
        })
    }
}

/// In-memory sources, keyed by name
#[derive(Debug, Clone, Default)]
pub struct MemorySources {
    files: FxHashMap<String, String>,
}

impl MemorySources {
    pub fn new() -> Self {
        MemorySources::default()
    }

    pub fn with(mut self, name: &str, text: &str) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: &str, text: &str) {
        self.files.insert(name.to_string(), text.to_string());
    }
}

impl SourceProvider for MemorySources {
    fn load_source(&self, name: &str) -> Result<String, LoadError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sources() {
        let sources = MemorySources::new().with("a.js", "1 + 1;");
        assert_eq!(sources.load_source("a.js").unwrap(), "1 + 1;");
        assert!(matches!(
            sources.load_source("b.js"),
            Err(LoadError::NotFound { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let sources = FileSystemSources::with_base(std::env::temp_dir());
        let err = sources
            .load_source("spectre-definitely-missing-file.js")
            .unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }
}
