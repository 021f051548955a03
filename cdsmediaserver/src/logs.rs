//! Initialisation du logging (`tracing` + `tracing-subscriber`)
//!
//! Le niveau minimum vient de `host.logger.min_level` et peut être modifié
//! à chaud grâce à un filtre rechargeable.

use std::sync::Arc;

use cdsconfig::Config;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::Level;
use tracing_subscriber::{
    Registry, filter::LevelFilter, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

static LOG_STATE: OnceCell<LogState> = OnceCell::new();

/// État partagé du logging : niveau courant et poignée de rechargement
#[derive(Clone)]
pub struct LogState {
    max_level: Arc<RwLock<Level>>,
    reload_handle: Arc<reload::Handle<LevelFilter, Registry>>,
}

impl LogState {
    fn new(level: Level, reload_handle: reload::Handle<LevelFilter, Registry>) -> Self {
        Self {
            max_level: Arc::new(RwLock::new(level)),
            reload_handle: Arc::new(reload_handle),
        }
    }

    pub fn set_max_level(&self, level: Level) {
        *self.max_level.write() = level;

        // Recharger le filtre dynamiquement
        let level_filter = level_to_levelfilter(level);
        if let Err(e) = self.reload_handle.reload(level_filter) {
            eprintln!("❌ Failed to reload log level filter: {}", e);
        } else {
            tracing::info!(level = %level_to_string(level), "✅ Log level changed");
        }
    }

    pub fn get_max_level(&self) -> Level {
        *self.max_level.read()
    }
}

impl std::fmt::Debug for LogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogState")
            .field("max_level", &self.get_max_level())
            .finish()
    }
}

/// Initialise le système de logging à partir de la configuration
///
/// Un seul subscriber global est installé ; les appels suivants renvoient
/// le même `LogState`.
///
/// # Exemple
/// ```rust,no_run
/// use cdsconfig::get_config;
/// use cdsmediaserver::logs::init_logging;
///
/// let log_state = init_logging(&get_config());
/// ```
pub fn init_logging(config: &Config) -> LogState {
    LOG_STATE
        .get_or_init(|| {
            let level = config
                .get_log_min_level()
                .ok()
                .and_then(|l| string_to_level(&l))
                .unwrap_or(Level::INFO);

            let (filter, reload_handle) = reload::Layer::new(level_to_levelfilter(level));
            let log_state = LogState::new(level, reload_handle);

            let enable_console = config.get_log_enable_console().unwrap_or(true);
            let subscriber = Registry::default().with(filter);
            let installed = if enable_console {
                subscriber
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_target(true)
                            .with_level(true)
                            .with_ansi(true),
                    )
                    .try_init()
            } else {
                subscriber.try_init()
            };
            if let Err(e) = installed {
                eprintln!("⚠️ A global tracing subscriber is already installed: {}", e);
            }

            log_state
        })
        .clone()
}

pub fn string_to_level(s: &str) -> Option<Level> {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}

pub fn level_to_string(level: Level) -> String {
    match level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARN",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
    .to_string()
}

fn level_to_levelfilter(level: Level) -> LevelFilter {
    match level {
        Level::ERROR => LevelFilter::ERROR,
        Level::WARN => LevelFilter::WARN,
        Level::INFO => LevelFilter::INFO,
        Level::DEBUG => LevelFilter::DEBUG,
        Level::TRACE => LevelFilter::TRACE,
    }
}
