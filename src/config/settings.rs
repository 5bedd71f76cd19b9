use serde::Deserialize;

use crate::persistence::Durability;

/// Top-level configuration settings for the application.
///
/// Includes settings for the document store, the exchange and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub store: StoreSettings,
    pub exchange: ExchangeSettings,
    pub logging: LoggingSettings,
}

/// Where and how the document store is opened.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub path: String,
    /// Remove the database when the last handle is dropped.
    pub temporary: bool,
    pub flush_every_ms: Option<u64>,
}

/// Which exchange the drivers publish to and consume from.
#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeSettings {
    pub namespace: String,
    pub name: String,
    pub durability: Durability,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Settings with every field optional. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub store: Option<PartialStoreSettings>,
    pub exchange: Option<PartialExchangeSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialStoreSettings {
    pub path: Option<String>,
    pub temporary: Option<bool>,
    pub flush_every_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialExchangeSettings {
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub durability: Option<Durability>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store: StoreSettings {
                path: "upsub_db".to_string(),
                temporary: false,
                flush_every_ms: Some(500),
            },
            exchange: ExchangeSettings {
                namespace: "MQ".to_string(),
                name: "messages".to_string(),
                durability: Durability::Soft,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Settings {
    /// Fill every missing value of `partial` from `Settings::default()`.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Self::default();
        let store = partial.store;
        let exchange = partial.exchange;
        let logging = partial.logging;

        Self {
            store: StoreSettings {
                path: store
                    .as_ref()
                    .and_then(|s| s.path.clone())
                    .unwrap_or(default.store.path),
                temporary: store
                    .as_ref()
                    .and_then(|s| s.temporary)
                    .unwrap_or(default.store.temporary),
                flush_every_ms: store
                    .as_ref()
                    .and_then(|s| s.flush_every_ms)
                    .or(default.store.flush_every_ms),
            },
            exchange: ExchangeSettings {
                namespace: exchange
                    .as_ref()
                    .and_then(|e| e.namespace.clone())
                    .unwrap_or(default.exchange.namespace),
                name: exchange
                    .as_ref()
                    .and_then(|e| e.name.clone())
                    .unwrap_or(default.exchange.name),
                durability: exchange
                    .as_ref()
                    .and_then(|e| e.durability)
                    .unwrap_or(default.exchange.durability),
            },
            logging: LoggingSettings {
                level: logging
                    .as_ref()
                    .and_then(|l| l.level.clone())
                    .unwrap_or(default.logging.level),
            },
        }
    }
}
