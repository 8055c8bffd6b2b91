//! Module resolution for `require`
//!
//! Identifiers starting with `./`, `../` or `/` are paths relative to the
//! requiring unit's location. Bare identifiers name a module registered by the
//! host, and fall back to a path relative to the unit. Files are loaded once
//! per resolved path and shared by every unit:
//! - `.json` parses as JSON
//! - `.yaml` / `.yml` parse as YAML
//! - anything else is kept as text

use dashmap::DashMap;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{ModuleError, ModuleResult};

/// Extensions tried when an identifier does not name a file as-is
const EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// A loaded module
#[derive(Debug, Clone, PartialEq)]
pub enum Module {
    /// Structured data from a JSON or YAML file, or registered by the host
    Data(Value),
    /// Any other file, verbatim
    Text(String),
}

impl Module {
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Module::Data(value) => Some(value),
            Module::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Module::Text(text) => Some(text),
            Module::Data(_) => None,
        }
    }
}

/// Process-wide module cache
#[derive(Debug, Default)]
pub struct ModuleCache {
    named: DashMap<String, Arc<Module>>,
    files: DashMap<PathBuf, Arc<Module>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under a bare name
    pub fn register(&self, name: impl Into<String>, module: Module) {
        let name = name.into();
        debug!(module = %name, "Registering named module");
        self.named.insert(name, Arc::new(module));
    }

    /// Number of files loaded so far
    pub fn loaded_files(&self) -> usize {
        self.files.len()
    }

    /// Resolve `id` for a unit located at `location`
    ///
    /// `location` is the unit's file; relative identifiers resolve against its
    /// directory.
    pub fn require(&self, id: &str, location: Option<&Path>) -> ModuleResult<Arc<Module>> {
        let relative = is_relative(id);
        if !relative {
            if let Some(module) = self.named.get(id) {
                return Ok(module.clone());
            }
        }

        let Some(base) = location.map(base_dir) else {
            return Err(ModuleError::NoLocation { id: id.to_string() });
        };
        let path = resolve_file(&base.join(id)).ok_or_else(|| ModuleError::NotFound {
            id: id.to_string(),
            base: base.clone(),
        })?;
        let key = fs::canonicalize(&path).unwrap_or(path);

        if let Some(module) = self.files.get(&key) {
            trace!(path = %key.display(), "Module cache hit");
            return Ok(module.clone());
        }

        let module = Arc::new(load_file(&key)?);
        debug!(path = %key.display(), "Loaded module");
        Ok(self.files.entry(key).or_insert(module).clone())
    }
}

fn is_relative(id: &str) -> bool {
    id.starts_with("./") || id.starts_with("../") || id.starts_with('/')
}

fn base_dir(location: &Path) -> PathBuf {
    if location.is_dir() {
        location.to_path_buf()
    } else {
        location
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

fn resolve_file(candidate: &Path) -> Option<PathBuf> {
    if candidate.is_file() {
        return Some(candidate.to_path_buf());
    }
    EXTENSIONS.iter().find_map(|ext| {
        let mut name = candidate.as_os_str().to_owned();
        name.push(".");
        name.push(ext);
        let path = PathBuf::from(name);
        path.is_file().then_some(path)
    })
}

fn load_file(path: &Path) -> ModuleResult<Module> {
    let content = fs::read_to_string(path).map_err(|e| ModuleError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .map(Module::Data)
            .map_err(|e| ModuleError::ParseJson {
                path: path.to_path_buf(),
                source: e,
            }),
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .map(Module::Data)
            .map_err(|e| ModuleError::ParseYaml {
                path: path.to_path_buf(),
                source: e,
            }),
        _ => Ok(Module::Text(content)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn unit_dir() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/rooms.json"), r#"{"kitchen": 2}"#).unwrap();
        fs::write(dir.path().join("lib/limits.yaml"), "max: 21\nmin: 17\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let unit = dir.path().join("unit.rs");
        (dir, unit)
    }

    #[test]
    fn test_relative_json_and_yaml() {
        let (_dir, unit) = unit_dir();
        let cache = ModuleCache::new();

        let rooms = cache.require("./lib/rooms.json", Some(&unit)).unwrap();
        assert_eq!(rooms.as_data(), Some(&json!({"kitchen": 2})));

        let limits = cache.require("./lib/limits", Some(&unit)).unwrap();
        assert_eq!(limits.as_data(), Some(&json!({"max": 21, "min": 17})));

        let notes = cache.require("./notes.txt", Some(&unit)).unwrap();
        assert_eq!(notes.as_text(), Some("hello"));
    }

    #[test]
    fn test_cache_is_shared_across_locations() {
        let (dir, unit) = unit_dir();
        let other = dir.path().join("lib/other.rs");
        let cache = ModuleCache::new();

        let a = cache.require("./lib/rooms.json", Some(&unit)).unwrap();
        let b = cache.require("./rooms.json", Some(&other)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.loaded_files(), 1);

        // Cached content survives changes on disk
        fs::write(dir.path().join("lib/rooms.json"), "{}").unwrap();
        let c = cache.require("./lib/rooms.json", Some(&unit)).unwrap();
        assert_eq!(c.as_data(), Some(&json!({"kitchen": 2})));
    }

    #[test]
    fn test_named_modules_win_for_bare_ids() {
        let (_dir, unit) = unit_dir();
        let cache = ModuleCache::new();
        cache.register("notes.txt", Module::Text("registered".into()));

        let named = cache.require("notes.txt", Some(&unit)).unwrap();
        assert_eq!(named.as_text(), Some("registered"));

        let file = cache.require("./notes.txt", Some(&unit)).unwrap();
        assert_eq!(file.as_text(), Some("hello"));

        let named = cache.require("notes.txt", None).unwrap();
        assert_eq!(named.as_text(), Some("registered"));
    }

    #[test]
    fn test_errors() {
        let (_dir, unit) = unit_dir();
        let cache = ModuleCache::new();

        assert!(matches!(
            cache.require("./missing", Some(&unit)),
            Err(ModuleError::NotFound { .. })
        ));
        assert!(matches!(
            cache.require("./lib/rooms.json", None),
            Err(ModuleError::NoLocation { .. })
        ));
    }

    #[test]
    fn test_parse_error() {
        let (dir, unit) = unit_dir();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let cache = ModuleCache::new();
        assert!(matches!(
            cache.require("./broken.json", Some(&unit)),
            Err(ModuleError::ParseJson { .. })
        ));
    }
}
