//! MySQL connection configuration.
//!
//! Connection parameters for establishing MySQL/MariaDB connections,
//! including authentication, optional mutual TLS, and pool sizing.

use std::path::PathBuf;
use std::time::Duration;

use moneta_core::config::{DbConfig, MySqlFlavor};
use moneta_core::error::{Error, Result};

/// Hard lower bound of the connection pool.
pub const POOL_MIN_BOUND: usize = 1;
/// Hard upper bound of the connection pool.
pub const POOL_MAX_BOUND: usize = 50;
/// Connections older than this are recycled on their next checkout.
pub const POOL_RECYCLE: Duration = Duration::from_secs(3600);

/// TLS client-certificate configuration.
///
/// Both paths are required together; a lone certificate or key is a
/// configuration error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to the client certificate file (PEM format).
    pub cert_path: Option<PathBuf>,
    /// Path to the client private key file (PEM format).
    pub key_path: Option<PathBuf>,
}

impl TlsConfig {
    /// Empty TLS configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client certificate path.
    pub fn cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.cert_path = Some(path.into());
        self
    }

    /// Set the client key path.
    pub fn key(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Whether a client certificate pair is fully configured.
    pub fn has_client_cert(&self) -> bool {
        self.cert_path.is_some() && self.key_path.is_some()
    }

    fn validate(&self) -> Result<()> {
        if self.cert_path.is_some() != self.key_path.is_some() {
            return Err(Error::configuration(
                "TLS requires both certificate and key paths",
            ));
        }
        Ok(())
    }
}

/// MySQL/MariaDB connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlConfig {
    /// Hostname or IP address.
    pub host: String,
    /// Port number (default: 3306).
    pub port: u16,
    /// Database (schema) name.
    pub db: String,
    /// Username for authentication.
    pub user: String,
    /// Password for authentication.
    pub password: Option<String>,
    /// Expected server flavor, asserted against the version banner on
    /// first connection.
    pub flavor: MySqlFlavor,
    /// TLS configuration.
    pub tls: TlsConfig,
    /// Minimum pool size.
    pub pool_min: usize,
    /// Maximum pool size.
    pub pool_max: usize,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            db: String::new(),
            user: String::new(),
            password: None,
            flavor: MySqlFlavor::default(),
            tls: TlsConfig::default(),
            pool_min: POOL_MIN_BOUND,
            pool_max: 10,
        }
    }
}

impl MySqlConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hostname.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database name.
    pub fn db(mut self, db: impl Into<String>) -> Self {
        self.db = db.into();
        self
    }

    /// Set the username.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the expected server flavor.
    pub fn flavor(mut self, flavor: MySqlFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Set the TLS configuration.
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Set the pool bounds. Values are clamped into the driver's hard
    /// bounds at validation time.
    pub fn pool_size(mut self, min: usize, max: usize) -> Self {
        self.pool_min = min;
        self.pool_max = max;
        self
    }

    /// Build from the shared backend configuration mapping.
    pub fn from_db_config(config: &DbConfig) -> Result<Self> {
        match config {
            DbConfig::Mysql {
                host,
                db,
                user,
                password,
                flavor,
                tls_cert,
                tls_key,
            } => {
                let mut tls = TlsConfig::new();
                if let Some(cert) = tls_cert {
                    tls = tls.cert(cert);
                }
                if let Some(key) = tls_key {
                    tls = tls.key(key);
                }
                let built = Self::new()
                    .host(host.clone())
                    .db(db.clone())
                    .user(user.clone())
                    .password(password.clone())
                    .flavor(*flavor)
                    .tls(tls);
                built.validate()?;
                Ok(built)
            }
            other => Err(Error::configuration(format!(
                "expected a mysql configuration, got '{}'",
                other.backend_name()
            ))),
        }
    }

    /// Pool bounds clamped into the driver's hard limits.
    pub fn effective_pool_bounds(&self) -> (usize, usize) {
        let min = self.pool_min.clamp(POOL_MIN_BOUND, POOL_MAX_BOUND);
        let max = self.pool_max.clamp(min, POOL_MAX_BOUND);
        (min, max)
    }

    /// Reject malformed or contradictory settings.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() || self.db.is_empty() || self.user.is_empty() {
            return Err(Error::configuration(
                "mysql backend requires host, db, and user",
            ));
        }
        if self.pool_min > self.pool_max {
            return Err(Error::configuration(
                "pool minimum cannot exceed pool maximum",
            ));
        }
        self.tls.validate()
    }

    /// The socket address string for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = MySqlConfig::new()
            .host("db.example.com")
            .port(3307)
            .db("moneta")
            .user("moneta")
            .password("secret")
            .flavor(MySqlFlavor::MariaDb);

        assert_eq!(config.host, "db.example.com");
        assert_eq!(config.port, 3307);
        assert_eq!(config.db, "moneta");
        assert_eq!(config.password, Some("secret".to_string()));
        assert_eq!(config.flavor, MySqlFlavor::MariaDb);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let config = MySqlConfig::new().host("db.example.com").port(3307);
        assert_eq!(config.socket_addr(), "db.example.com:3307");
    }

    #[test]
    fn test_lone_tls_cert_is_rejected() {
        let config = MySqlConfig::new()
            .host("h")
            .db("d")
            .user("u")
            .tls(TlsConfig::new().cert("/etc/ssl/client.pem"));
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_tls_pair_is_accepted() {
        let tls = TlsConfig::new()
            .cert("/etc/ssl/client.pem")
            .key("/etc/ssl/client-key.pem");
        assert!(tls.has_client_cert());
        let config = MySqlConfig::new().host("h").db("d").user("u").tls(tls);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_bounds_are_clamped() {
        let config = MySqlConfig::new().pool_size(0, 500);
        assert_eq!(config.effective_pool_bounds(), (1, 50));

        let config = MySqlConfig::new().pool_size(5, 8);
        assert_eq!(config.effective_pool_bounds(), (5, 8));
    }

    #[test]
    fn test_inverted_pool_bounds_rejected() {
        let config = MySqlConfig::new().host("h").db("d").user("u").pool_size(9, 2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_db_config() {
        let shared = DbConfig::Mysql {
            host: "db.local".into(),
            db: "moneta".into(),
            user: "svc".into(),
            password: "pw".into(),
            flavor: MySqlFlavor::MariaDb,
            tls_cert: None,
            tls_key: None,
        };
        let config = MySqlConfig::from_db_config(&shared).unwrap();
        assert_eq!(config.host, "db.local");
        assert_eq!(config.flavor, MySqlFlavor::MariaDb);

        let sqlite = DbConfig::Sqlite {
            file: "/tmp/x.db".into(),
        };
        assert!(MySqlConfig::from_db_config(&sqlite).is_err());
    }
}
