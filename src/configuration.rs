use crate::auth::{MAX_HASH_COST, MIN_HASH_COST};
use crate::error::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub password: PasswordSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT signing settings
///
/// Access and refresh tokens are signed with different keys so a refresh
/// token can never pass as an access token and vice versa.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_token_expiry: i64,   // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64,  // seconds (e.g., 864000 for 10 days)
    pub issuer: String,
}

impl JwtSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.access_secret".to_string()));
        }
        if self.refresh_secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.refresh_secret".to_string()));
        }
        if self.access_secret == self.refresh_secret {
            return Err(ConfigError::InvalidValue(
                "jwt.access_secret and jwt.refresh_secret must differ".to_string(),
            ));
        }
        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt token expiry must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Session policy
#[derive(serde::Deserialize, Clone, Debug)]
pub struct SessionSettings {
    /// Concurrent refresh sessions kept per identity; 1 keeps a single active session
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Drop every session of an identity when its password changes
    #[serde(default = "default_revoke_on_password_change")]
    pub revoke_on_password_change: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            revoke_on_password_change: default_revoke_on_password_change(),
        }
    }
}

impl SessionSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sessions == 0 {
            return Err(ConfigError::InvalidValue(
                "session.max_sessions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_max_sessions() -> usize {
    1
}

fn default_revoke_on_password_change() -> bool {
    true
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct PasswordSettings {
    #[serde(default = "default_hash_cost")]
    pub hash_cost: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            hash_cost: default_hash_cost(),
        }
    }
}

impl PasswordSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.hash_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "password.hash_cost must be between {} and {}",
                MIN_HASH_COST, MAX_HASH_COST
            )));
        }
        Ok(())
    }
}

fn default_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

/// Load settings from `configuration.yaml` (optional) overlaid by `APP_*` environment variables,
/// e.g. `APP_JWT__ACCESS_SECRET`.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;
    settings.try_deserialize::<Settings>()
}
