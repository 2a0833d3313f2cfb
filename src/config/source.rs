//! Key/value configuration sources.
//!
//! The ETL client reads its settings by name and writes back exactly one
//! value of its own (the generated secret key), so a source only needs
//! lookup and durable append.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Environment-style key/value configuration.
pub trait ConfigSource: Send + Sync {
    /// Looks up a value by name. Empty values are treated as absent.
    fn get(&self, name: &str) -> Result<Option<String>>;

    /// Durably appends a value so later runs see it.
    fn append(&self, name: &str, value: &str) -> Result<()>;

    /// Looks up a value that must be present.
    fn require(&self, name: &str) -> Result<String> {
        self.get(name)?
            .ok_or_else(|| Error::Config(format!("Variable {} not found", name)))
    }
}

/// Process environment backed by a `.env` file.
///
/// Lookups check the process environment first and fall back to the file.
/// Appends go to the file only; the process environment is never mutated.
#[derive(Debug, Clone)]
pub struct EnvFileConfig {
    path: PathBuf,
}

impl EnvFileConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file_var(&self, name: &str) -> Result<Option<String>> {
        let iter = match dotenvy::from_path_iter(&self.path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => return Ok(None),
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let mut found = None;
        for item in iter {
            let (key, value) = item.map_err(|e| {
                Error::Config(format!("Failed to parse {}: {}", self.path.display(), e))
            })?;
            if key == name {
                found = Some(value);
            }
        }
        Ok(found.filter(|v| !v.is_empty()))
    }
}

impl ConfigSource for EnvFileConfig {
    fn get(&self, name: &str) -> Result<Option<String>> {
        if let Some(value) = std::env::var(name).ok().filter(|v| !v.is_empty()) {
            return Ok(Some(value));
        }
        self.read_file_var(name)
    }

    fn append(&self, name: &str, value: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                Error::Config(format!("Failed to open {}: {}", self.path.display(), e))
            })?;

        // Keep the new entry on its own line even if the file lacks a trailing newline
        let mut existing = String::new();
        file.read_to_string(&mut existing).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        let separator = if existing.is_empty() || existing.ends_with('\n') {
            ""
        } else {
            "\n"
        };

        writeln!(file, "{}{}=\"{}\"", separator, name, value)
            .and_then(|_| file.sync_all())
            .map_err(|e| {
                Error::Config(format!("Failed to write {}: {}", self.path.display(), e))
            })?;

        tracing::debug!(name = %name, path = %self.path.display(), "Appended configuration value");
        Ok(())
    }
}

/// In-memory configuration, for tests and embedding callers.
#[derive(Debug, Default)]
pub struct MemoryConfig {
    values: Mutex<HashMap<String, String>>,
    appended: Mutex<Vec<String>>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: &str, value: &str) -> Self {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Names written through `append`, in order.
    pub fn appended(&self) -> Vec<String> {
        self.appended
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ConfigSource for MemoryConfig {
    fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .filter(|v| !v.is_empty())
            .cloned())
    }

    fn append(&self, name: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), value.to_string());
        self.appended
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_config_lookup() {
        let config = MemoryConfig::new().with("CLIENT_ID", "abc").with("EMPTY", "");

        assert_eq!(config.get("CLIENT_ID").unwrap(), Some("abc".to_string()));
        assert_eq!(config.get("EMPTY").unwrap(), None);
        assert_eq!(config.get("MISSING").unwrap(), None);
    }

    #[test]
    fn test_require_missing_is_config_error() {
        let config = MemoryConfig::new();
        let err = config.require("CODE").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("CODE"));
    }

    #[test]
    fn test_memory_config_records_appends() {
        let config = MemoryConfig::new();
        config.append("SECRET_KEY", "k").unwrap();

        assert_eq!(config.get("SECRET_KEY").unwrap(), Some("k".to_string()));
        assert_eq!(config.appended(), vec!["SECRET_KEY".to_string()]);
    }

    #[test]
    fn test_env_file_missing_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let config = EnvFileConfig::new(dir.path().join(".env"));

        assert_eq!(config.get("MELI_ETL_TEST_NOT_SET_ANYWHERE").unwrap(), None);
    }

    #[test]
    fn test_env_file_reads_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "MELI_ETL_TEST_FILE_VALUE=\"from-file\"\n").unwrap();

        let config = EnvFileConfig::new(&path);
        assert_eq!(
            config.get("MELI_ETL_TEST_FILE_VALUE").unwrap(),
            Some("from-file".to_string())
        );
    }

    #[test]
    fn test_env_file_append_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        // No trailing newline: the appended entry must still land on its own line
        std::fs::write(&path, "MELI_ETL_TEST_EXISTING=one").unwrap();

        let config = EnvFileConfig::new(&path);
        config.append("MELI_ETL_TEST_APPENDED", "two").unwrap();

        assert_eq!(
            config.get("MELI_ETL_TEST_EXISTING").unwrap(),
            Some("one".to_string())
        );
        assert_eq!(
            config.get("MELI_ETL_TEST_APPENDED").unwrap(),
            Some("two".to_string())
        );

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "MELI_ETL_TEST_EXISTING=one\nMELI_ETL_TEST_APPENDED=\"two\"\n"
        );
    }

    #[test]
    fn test_env_file_append_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");

        let config = EnvFileConfig::new(&path);
        config.append("MELI_ETL_TEST_CREATED", "value").unwrap();

        assert!(path.exists());
        assert_eq!(
            config.get("MELI_ETL_TEST_CREATED").unwrap(),
            Some("value".to_string())
        );
    }
}
