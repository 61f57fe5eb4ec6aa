//! # Tenant configuration files.
//!
//! One INI-like `.conf` file per tenant, discovered in a configured
//! directory. Each section yields one tenant:
//!
//! ```text
//! [shop]
//! python = /srv/shop/venv/bin/python
//! script = /srv/shop/manage.py
//! settings = shop.settings.production
//! workers = 2
//! worker-type = thread
//! redis_host = localhost
//! redis_port = 6379
//! redis_prefix = shop
//! ```
//!
//! `python` and `script` are required; everything else has a default
//! (`redis_prefix` falls back to the section name). A section that fails to
//! parse is skipped by the loader, not fatal.
//!
//! The format is fixed by the tenant-side framework, so the scanner lives
//! here with its own tests rather than behind a general-purpose parser.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Fallback configuration directory checked when the primary is absent.
pub const FALLBACK_CONF_DIR: &str = "/etc/queuevisor.conf";

/// File name of the schedule descriptor a tenant's bootstrap command
/// produces, next to the entry script.
pub(crate) const SCHEDULE_FILE: &str = "schedule.info";

/// Execution model of a tenant's workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerType {
    #[default]
    Thread,
    Process,
    Greenlet,
}

impl WorkerType {
    /// Parses the config value; unknown values fall back to `Thread`.
    pub fn parse(value: &str) -> Self {
        match value {
            "process" => WorkerType::Process,
            "greenlet" => WorkerType::Greenlet,
            _ => WorkerType::Thread,
        }
    }

    /// Wire form passed to the worker command's `-k` flag.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerType::Thread => "thread",
            WorkerType::Process => "process",
            WorkerType::Greenlet => "greenlet",
        }
    }
}

/// Immutable settings of one tenant, loaded once at startup.
#[derive(Debug, Clone)]
pub struct TenantConfig {
    /// Tenant identity; also the default queue key prefix.
    pub name: String,
    /// Interpreter or executable that runs the tenant's entry script.
    pub executable: PathBuf,
    /// Entry script handed to the executable as its first argument.
    pub entry_script: PathBuf,
    /// Optional settings reference appended as `--settings <value>`.
    pub settings: Option<String>,
    /// Worker count passed to the worker command's `-w` flag.
    pub workers: u32,
    /// Worker execution model.
    pub worker_type: WorkerType,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_prefix: String,
}

impl TenantConfig {
    /// Builds a config from one parsed section.
    pub fn from_section(
        section: &str,
        keys: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let required = |key: &str| {
            keys.get(key).cloned().ok_or_else(|| ConfigError::MissingKey {
                section: section.to_string(),
                key: key.to_string(),
            })
        };
        let workers_raw = keys.get("workers").cloned().unwrap_or_else(|| "1".to_string());
        let workers = workers_raw
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidValue {
                section: section.to_string(),
                key: "workers".to_string(),
                value: workers_raw.clone(),
            })?;
        let port_raw = keys
            .get("redis_port")
            .cloned()
            .unwrap_or_else(|| "6379".to_string());
        let redis_port = port_raw
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue {
                section: section.to_string(),
                key: "redis_port".to_string(),
                value: port_raw.clone(),
            })?;

        Ok(Self {
            name: section.to_string(),
            executable: PathBuf::from(required("python")?),
            entry_script: PathBuf::from(required("script")?),
            settings: keys.get("settings").cloned(),
            workers,
            worker_type: WorkerType::parse(
                keys.get("worker-type").map(String::as_str).unwrap_or("thread"),
            ),
            redis_host: keys
                .get("redis_host")
                .cloned()
                .unwrap_or_else(|| "localhost".to_string()),
            redis_port,
            redis_prefix: keys
                .get("redis_prefix")
                .cloned()
                .unwrap_or_else(|| section.to_string()),
        })
    }

    /// Path of the schedule descriptor produced by the bootstrap command.
    pub fn schedule_file(&self) -> PathBuf {
        self.entry_script
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SCHEDULE_FILE)
    }
}

/// Resolves the effective configuration directory.
///
/// Falls back to [`FALLBACK_CONF_DIR`] when the primary is missing; errors
/// only when neither exists.
pub(crate) fn resolve_conf_dir(primary: &Path) -> Result<PathBuf, ConfigError> {
    if primary.is_dir() {
        return Ok(primary.to_path_buf());
    }
    tracing::error!(dir = %primary.display(), "applications not configured here, trying fallback");
    let fallback = Path::new(FALLBACK_CONF_DIR);
    if fallback.is_dir() {
        return Ok(fallback.to_path_buf());
    }
    Err(ConfigError::ConfDirMissing {
        searched: vec![primary.to_path_buf(), fallback.to_path_buf()],
    })
}

/// Lists `.conf` files in the directory, sorted for determinism.
pub(crate) fn discover_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "conf"))
        .collect();
    files.sort();
    Ok(files)
}

/// Parses every section of one config file into tenant configs.
///
/// Section-level failures are returned as errors in place so the caller can
/// log and skip them individually.
pub(crate) fn parse_file(text: &str) -> Vec<Result<TenantConfig, ConfigError>> {
    parse_sections(text)
        .into_iter()
        .map(|(section, keys)| TenantConfig::from_section(&section, &keys))
        .collect()
}

/// Minimal INI scanner: `[section]` headers, `key = value` (or `key: value`)
/// pairs, `;`/`#` comments. Keys are lowercased; keys before the first
/// section header are ignored.
fn parse_sections(text: &str) -> Vec<(String, HashMap<String, String>)> {
    let mut sections: Vec<(String, HashMap<String, String>)> = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            sections.push((name.trim().to_string(), HashMap::new()));
            continue;
        }
        let Some((key, value)) = line.split_once('=').or_else(|| line.split_once(':')) else {
            continue;
        };
        if let Some((_, keys)) = sections.last_mut() {
            keys.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
; deployment notes live here
[shop]
python = /usr/bin/python3
script = /srv/shop/manage.py
settings = shop.settings
workers = 2
worker-type = process

[blog]
python: /usr/bin/python3
script: /srv/blog/manage.py
redis_prefix: blog-queue
";

    #[test]
    fn test_parse_two_sections() {
        let parsed = parse_file(SAMPLE);
        assert_eq!(parsed.len(), 2);

        let shop = parsed[0].as_ref().unwrap();
        assert_eq!(shop.name, "shop");
        assert_eq!(shop.workers, 2);
        assert_eq!(shop.worker_type, WorkerType::Process);
        assert_eq!(shop.settings.as_deref(), Some("shop.settings"));
        assert_eq!(shop.redis_prefix, "shop");
        assert_eq!(shop.redis_host, "localhost");
        assert_eq!(shop.redis_port, 6379);

        let blog = parsed[1].as_ref().unwrap();
        assert_eq!(blog.workers, 1, "workers defaults to 1");
        assert_eq!(blog.worker_type, WorkerType::Thread);
        assert_eq!(blog.redis_prefix, "blog-queue");
        assert!(blog.settings.is_none());
    }

    #[test]
    fn test_missing_script_is_an_error() {
        let text = "[broken]\npython = /usr/bin/python3\n";
        let parsed = parse_file(text);
        assert!(matches!(
            parsed[0],
            Err(ConfigError::MissingKey { ref key, .. }) if key == "script"
        ));
    }

    #[test]
    fn test_invalid_workers_is_an_error() {
        let text = "[broken]\npython = p\nscript = s\nworkers = many\n";
        let parsed = parse_file(text);
        assert!(matches!(
            parsed[0],
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "workers"
        ));
    }

    #[test]
    fn test_unknown_worker_type_falls_back_to_thread() {
        assert_eq!(WorkerType::parse("fibers"), WorkerType::Thread);
        assert_eq!(WorkerType::parse("greenlet"), WorkerType::Greenlet);
    }

    #[test]
    fn test_one_bad_section_does_not_poison_others() {
        let text = "[bad]\npython = p\n\n[good]\npython = p\nscript = s\n";
        let parsed = parse_file(text);
        assert!(parsed[0].is_err());
        assert!(parsed[1].is_ok());
    }

    #[test]
    fn test_schedule_file_sits_next_to_entry_script() {
        let mut keys = HashMap::new();
        keys.insert("python".to_string(), "/usr/bin/python3".to_string());
        keys.insert("script".to_string(), "/srv/shop/manage.py".to_string());
        let cfg = TenantConfig::from_section("shop", &keys).unwrap();
        assert_eq!(cfg.schedule_file(), PathBuf::from("/srv/shop/schedule.info"));
    }

    #[test]
    fn test_discover_only_conf_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.conf"), "").unwrap();
        std::fs::write(dir.path().join("b.conf"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        let files = discover_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.conf", "b.conf"]);
    }

    #[test]
    fn test_resolve_missing_dirs_errors() {
        let err = resolve_conf_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, ConfigError::ConfDirMissing { .. }));
    }
}
