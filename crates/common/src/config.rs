use crate::error::VecRouteError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that forces a backend tier
pub const BACKEND_OVERRIDE_ENV: &str = "VECROUTE_BACKEND";

/// VecRoute configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the environment variable consulted for a backend override
    pub backend_override_var: String,

    /// Preferred backend tier (checked after the override)
    pub preferred_backend: Option<String>,

    /// Fallback chain walked in order when the preferred tier is unavailable
    pub fallback_chain: Vec<String>,

    /// Embedding dimension
    pub dimension: usize,

    /// Distance metric name
    pub metric: String,

    /// Key namespace for the persistent log tier
    pub namespace: String,

    /// Directory backing the file record store
    pub store_path: Option<PathBuf>,

    /// Connection URL of the SQL engine
    pub database_url: Option<String>,

    /// Table holding the vector column
    pub sql_table: String,

    /// Column identifying rows
    pub sql_id_column: String,

    /// Vector-typed column
    pub sql_vector_column: String,

    /// JSON/JSONB metadata column
    pub sql_metadata_column: String,

    /// Log directory
    pub log_dir: PathBuf,

    /// Log level
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_override_var: BACKEND_OVERRIDE_ENV.to_string(),
            preferred_backend: None,
            fallback_chain: Vec::new(),
            dimension: 768,
            metric: "cosine".to_string(),
            namespace: "vectors".to_string(),
            store_path: None,
            database_url: None,
            sql_table: "documents".to_string(),
            sql_id_column: "id".to_string(),
            sql_vector_column: "embedding".to_string(),
            sql_metadata_column: "metadata".to_string(),
            log_dir: PathBuf::from("./db/log"),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self, VecRouteError> {
        // Load .env file (ignore if not exists)
        let _ = dotenv::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, VecRouteError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let dimension = match non_empty("VECROUTE_DIMENSION") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                VecRouteError::config(format!("VECROUTE_DIMENSION is not a number: {}", raw))
            })?,
            None => defaults.dimension,
        };

        let config = Self {
            backend_override_var: defaults.backend_override_var,
            preferred_backend: non_empty("VECROUTE_PREFERRED_BACKEND"),
            fallback_chain: non_empty("VECROUTE_FALLBACK_CHAIN")
                .map(|chain| parse_list(&chain))
                .unwrap_or_default(),
            dimension,
            metric: non_empty("VECROUTE_METRIC").unwrap_or(defaults.metric),
            namespace: non_empty("VECROUTE_NAMESPACE").unwrap_or(defaults.namespace),
            store_path: non_empty("VECROUTE_STORE_PATH").map(PathBuf::from),
            database_url: non_empty("DATABASE_URL"),
            sql_table: non_empty("VECROUTE_SQL_TABLE").unwrap_or(defaults.sql_table),
            sql_id_column: non_empty("VECROUTE_SQL_ID_COLUMN").unwrap_or(defaults.sql_id_column),
            sql_vector_column: non_empty("VECROUTE_SQL_VECTOR_COLUMN")
                .unwrap_or(defaults.sql_vector_column),
            sql_metadata_column: non_empty("VECROUTE_SQL_METADATA_COLUMN")
                .unwrap_or(defaults.sql_metadata_column),
            log_dir: non_empty("LOG_DIR").map(PathBuf::from).unwrap_or(defaults.log_dir),
            log_level: non_empty("LOG_LEVEL").unwrap_or(defaults.log_level),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), VecRouteError> {
        if self.dimension == 0 {
            return Err(VecRouteError::config("Embedding dimension must be positive"));
        }

        if self.namespace.is_empty() || self.namespace.contains(':') {
            return Err(VecRouteError::config(
                "Namespace must be non-empty and must not contain ':'",
            ));
        }

        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(VecRouteError::config(
                    "DATABASE_URL must start with postgres:// or postgresql://",
                ));
            }
        }

        Ok(())
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.dimension, 768);
        assert_eq!(config.metric, "cosine");
        assert_eq!(config.backend_override_var, "VECROUTE_BACKEND");
        assert!(config.fallback_chain.is_empty());
    }

    #[test]
    fn test_from_lookup() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("VECROUTE_DIMENSION", "8"),
            ("VECROUTE_METRIC", "euclidean"),
            ("VECROUTE_FALLBACK_CHAIN", "sql, persistent ,,memory"),
            ("VECROUTE_STORE_PATH", "/tmp/vectors"),
            ("DATABASE_URL", "postgres://localhost/app"),
        ]))
        .unwrap();

        assert_eq!(config.dimension, 8);
        assert_eq!(config.metric, "euclidean");
        assert_eq!(config.fallback_chain, vec!["sql", "persistent", "memory"]);
        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/vectors")));
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/app"));
        assert_eq!(config.sql_table, "documents");
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config =
            AppConfig::from_lookup(lookup_from(&[("VECROUTE_NAMESPACE", "  "), ("DATABASE_URL", "")]))
                .unwrap();
        assert_eq!(config.namespace, "vectors");
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_invalid_dimension() {
        assert!(AppConfig::from_lookup(lookup_from(&[("VECROUTE_DIMENSION", "abc")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("VECROUTE_DIMENSION", "0")])).is_err());
    }

    #[test]
    fn test_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid = AppConfig::default();
        invalid.database_url = Some("mysql://localhost".to_string());
        assert!(invalid.validate().is_err());

        let mut invalid = AppConfig::default();
        invalid.namespace = "a:b".to_string();
        assert!(invalid.validate().is_err());
    }
}
