//! # cdsconfig - configuration du serveur de contenu
//!
//! Ce module gère la configuration du ContentDirectory :
//! - chargement depuis un fichier YAML
//! - fusion avec la configuration par défaut intégrée
//! - surcharge par variables d'environnement
//! - accesseurs typés avec valeurs par défaut
//! - singleton partagé par tout le processus
//!
//! ## Usage
//!
//! ```no_run
//! use cdsconfig::get_config;
//!
//! let config = get_config();
//! let urlbase = config.get_urlbase()?;
//! let timeout = config.get_lazy_fetch_timeout_secs()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Result, anyhow};
use dirs::home_dir;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, warn};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("cdsmediaserver.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> = Arc::new(Config::load_or_default());
}

const ENV_CONFIG_DIR: &str = "CDS_CONFIG";
const ENV_PREFIX: &str = "CDS_CONFIG__";
const CONFIG_DIR_NAME: &str = ".cdsmediaserver";

const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;
const DEFAULT_URLBASE: &str = "http://localhost:8080/cds/";
const DEFAULT_ROOT_TITLE: &str = "root";
const DEFAULT_SORT_METHOD: &str = "name";
const DEFAULT_SEARCH_CAPABILITIES: &str = "dc:title,upnp:class";
const DEFAULT_SORT_CAPABILITIES: &str = "dc:title";
const DEFAULT_REMAP_ALL_CLIENTS: bool = false;
const DEFAULT_LAZY_REFRESH_SECS: usize = 0;
const DEFAULT_LAZY_FETCH_TIMEOUT_SECS: usize = 30;
const DEFAULT_LAZY_MAX_PAGES: usize = 100;

/// Macro to generate getter/setter for usize values with default
macro_rules! impl_usize_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<usize> {
            match self.get_value($path) {
                Ok(Value::Number(n)) => Ok(n.as_u64().map(|v| v as usize).unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: usize) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Macro to generate getter/setter for string values with default
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<String> {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.is_empty() => Ok(s),
                _ => Ok($default.to_string()),
            }
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// Configuration manager
///
/// Une configuration est soit adossée à un fichier `config.yaml` (chaque
/// `set_value` est alors persisté), soit purement en mémoire.
#[derive(Debug)]
pub struct Config {
    config_dir: Option<PathBuf>,
    path: Option<PathBuf>,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(self.data.lock().clone()),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> PathBuf {
        // 1. Try provided directory
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return PathBuf::from(env_path);
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).exists() {
            return PathBuf::from(CONFIG_DIR_NAME);
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config;
            }
        }

        PathBuf::from(CONFIG_DIR_NAME)
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `CDS_CONFIG` environment variable
    /// 3. `.cdsmediaserver` in the current directory
    /// 4. `.cdsmediaserver` in the user's home directory
    ///
    /// The directory is created if it doesn't exist.
    pub fn config_dir(directory: &str) -> Result<PathBuf> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(&dir_path)?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir = %config_dir.display(), "Using config directory");

        let path = config_dir.join("config.yaml");

        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path.display(), "Loaded config file");
                let external_value: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut config_value, &Self::lower_keys_value(external_value));
            }
            Err(_) => {
                info!(config_file = %path.display(), "Config file not found, using default embedded config");
            }
        }
        let mut config_value = Self::lower_keys_value(config_value);

        Self::apply_env_overrides(&mut config_value, env::vars());

        let config = Config {
            config_dir: Some(config_dir),
            path: Some(path),
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Builds an in-memory configuration: `yaml` merged over the defaults.
    ///
    /// Nothing is read from or written to disk, and the environment is not
    /// consulted.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        if !yaml.trim().is_empty() {
            let external_value: Value = serde_yaml::from_str(yaml)?;
            merge_yaml(&mut config_value, &Self::lower_keys_value(external_value));
        }

        Ok(Config {
            config_dir: None,
            path: None,
            data: Mutex::new(Self::lower_keys_value(config_value)),
        })
    }

    /// Embedded defaults only
    pub fn defaults() -> Result<Self> {
        Self::from_yaml_str("")
    }

    fn load_or_default() -> Self {
        match Self::load_config("") {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "Cannot load configuration, using embedded defaults");
                Self::defaults().unwrap_or_else(|_| Config {
                    config_dir: None,
                    path: None,
                    data: Mutex::new(Value::Mapping(Mapping::new())),
                })
            }
        }
    }

    /// Directory holding `config.yaml`, if file-backed
    pub fn directory(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    /// Saves the current configuration to the config.yaml file
    ///
    /// In-memory configurations are not persisted.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let yaml = serde_yaml::to_string(&*self.data.lock())?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// `path` is an array of keys, e.g. `&["lazy_container", "max_pages"]`.
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.data.lock();
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                match map.get(&Value::String(key.to_lowercase())) {
                    Some(next) => current = next,
                    None => {
                        return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                    }
                }
            } else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    /// `CDS_CONFIG__SECTION__KEY=value` sets `section.key`
    fn apply_env_overrides<I>(config: &mut Value, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(err) = Self::set_value_internal(config, &key_path, yaml_value) {
                    warn!(variable = %key, error = %err, "Ignoring environment override");
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let new_key = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(new_key, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["host", "logger", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    impl_string_config!(
        get_urlbase,
        set_urlbase,
        &["mediaserver", "urlbase"],
        DEFAULT_URLBASE
    );

    impl_string_config!(
        get_root_title,
        set_root_title,
        &["mediaserver", "root_title"],
        DEFAULT_ROOT_TITLE
    );

    impl_string_config!(
        get_sort_method,
        set_sort_method,
        &["content_directory", "sort_method"],
        DEFAULT_SORT_METHOD
    );

    impl_string_config!(
        get_search_capabilities,
        set_search_capabilities,
        &["content_directory", "search_capabilities"],
        DEFAULT_SEARCH_CAPABILITIES
    );

    impl_string_config!(
        get_sort_capabilities,
        set_sort_capabilities,
        &["content_directory", "sort_capabilities"],
        DEFAULT_SORT_CAPABILITIES
    );

    impl_bool_config!(
        get_remap_all_clients,
        set_remap_all_clients,
        &["content_directory", "remap_all_clients"],
        DEFAULT_REMAP_ALL_CLIENTS
    );

    impl_usize_config!(
        get_lazy_refresh_secs,
        set_lazy_refresh_secs,
        &["lazy_container", "refresh_secs"],
        DEFAULT_LAZY_REFRESH_SECS
    );

    impl_usize_config!(
        get_lazy_fetch_timeout_secs,
        set_lazy_fetch_timeout_secs,
        &["lazy_container", "fetch_timeout_secs"],
        DEFAULT_LAZY_FETCH_TIMEOUT_SECS
    );

    impl_usize_config!(
        get_lazy_max_pages,
        set_lazy_max_pages,
        &["lazy_container", "max_pages"],
        DEFAULT_LAZY_MAX_PAGES
    );
}

/// Returns the global configuration instance
///
/// Lazily loaded on first access. When the configuration directory cannot
/// be used, the embedded defaults are served from memory.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default ones.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults() {
        let config = Config::defaults().unwrap();
        assert_eq!(config.get_log_min_level().unwrap(), "INFO");
        assert!(config.get_log_enable_console().unwrap());
        assert_eq!(config.get_urlbase().unwrap(), "http://localhost:8080/cds/");
        assert_eq!(config.get_root_title().unwrap(), "root");
        assert_eq!(config.get_sort_method().unwrap(), "name");
        assert_eq!(
            config.get_search_capabilities().unwrap(),
            "dc:title,upnp:class"
        );
        assert_eq!(config.get_sort_capabilities().unwrap(), "dc:title");
        assert!(!config.get_remap_all_clients().unwrap());
        assert_eq!(config.get_lazy_refresh_secs().unwrap(), 0);
        assert_eq!(config.get_lazy_fetch_timeout_secs().unwrap(), 30);
        assert_eq!(config.get_lazy_max_pages().unwrap(), 100);
    }

    #[test]
    fn test_yaml_merged_over_defaults() {
        let config = Config::from_yaml_str(
            "Lazy_Container:\n  Refresh_Secs: 60\ncontent_directory:\n  remap_all_clients: true\n",
        )
        .unwrap();
        assert_eq!(config.get_lazy_refresh_secs().unwrap(), 60);
        assert!(config.get_remap_all_clients().unwrap());
        // Les autres clés gardent leur valeur par défaut
        assert_eq!(config.get_lazy_max_pages().unwrap(), 100);
    }

    #[test]
    fn test_missing_path_falls_back_to_default() {
        let config = Config::from_yaml_str("lazy_container: {}\n").unwrap();
        assert!(config.get_value(&["nowhere", "at_all"]).is_err());
        assert_eq!(config.get_lazy_max_pages().unwrap(), 100);

        let config = Config::from_yaml_str("lazy_container:\n  max_pages: lots\n").unwrap();
        assert_eq!(config.get_lazy_max_pages().unwrap(), 100);
    }

    #[test]
    fn test_set_value_in_memory() {
        let config = Config::defaults().unwrap();
        config.set_lazy_max_pages(3).unwrap();
        config.set_urlbase("http://10.0.0.2:9000/".to_string()).unwrap();
        assert_eq!(config.get_lazy_max_pages().unwrap(), 3);
        assert_eq!(config.get_urlbase().unwrap(), "http://10.0.0.2:9000/");

        // Le clone est indépendant
        let copy = config.clone();
        copy.set_lazy_max_pages(7).unwrap();
        assert_eq!(config.get_lazy_max_pages().unwrap(), 3);
    }

    #[test]
    fn test_env_overrides() {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
        let vars = vec![
            ("CDS_CONFIG__LAZY_CONTAINER__MAX_PAGES".to_string(), "5".to_string()),
            ("CDS_CONFIG__HOST__LOGGER__MIN_LEVEL".to_string(), "DEBUG".to_string()),
            ("UNRELATED".to_string(), "1".to_string()),
        ];
        Config::apply_env_overrides(&mut value, vars);

        assert_eq!(
            Config::get_value_internal(&value, &["lazy_container", "max_pages"]).unwrap(),
            Value::Number(Number::from(5))
        );
        assert_eq!(
            Config::get_value_internal(&value, &["host", "logger", "min_level"]).unwrap(),
            Value::String("DEBUG".to_string())
        );
    }

    #[test]
    fn test_load_config_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "mediaserver:\n  urlbase: http://192.168.1.10:8200/\n",
        )
        .unwrap();

        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config.get_urlbase().unwrap(), "http://192.168.1.10:8200/");
        assert_eq!(config.get_lazy_fetch_timeout_secs().unwrap(), 30);
        assert_eq!(config.directory(), Some(dir.path()));

        // Les modifications sont persistées
        config.set_lazy_refresh_secs(120).unwrap();
        let reloaded = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(reloaded.get_lazy_refresh_secs().unwrap(), 120);
        assert_eq!(reloaded.get_urlbase().unwrap(), "http://192.168.1.10:8200/");
    }

    #[test]
    fn test_load_config_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("conf");
        let config = Config::load_config(nested.to_str().unwrap()).unwrap();
        assert!(nested.join("config.yaml").exists());
        assert_eq!(config.get_root_title().unwrap(), "root");
    }
}
