use axum_extra::extract::cookie::Key;
use url::Url;

use crate::error::Error;

/// Shared vault settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct VaultSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) session_ttl_minutes: i64,
    pub(crate) secure_cookies: bool,
    pub(crate) base_path: String,
}

impl VaultSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__vault_session".into(),
            session_ttl_minutes: 30,
            secure_cookies: true,
            base_path: "/consent".into(),
        }
    }
}

/// Consent-route configuration.
///
/// The required field (`return_url`, where results are redirected back
/// to the relying party) is a constructor parameter — no runtime
/// "missing field" errors.
///
/// Use [`from_env()`](VaultConfig::from_env) for convention-based
/// setup, or [`new()`](VaultConfig::new) with `with_*` methods for full
/// control.
pub struct VaultConfig {
    pub(super) return_url: Url,
    pub(super) settings: VaultSettings,
}

impl VaultConfig {
    /// Create config with the required relying-party return URL.
    ///
    /// All optional fields use sensible defaults. Override with `with_*`
    /// methods.
    #[must_use]
    pub fn new(return_url: Url) -> Self {
        Self {
            return_url,
            settings: VaultSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `VAULT_RETURN_URL`: relying-party return URL (must be a valid URL)
    ///
    /// # Optional env vars
    /// - `VAULT_BASE_PATH`: route prefix (default `/consent`)
    /// - `DEV_VAULT`: set to `"1"` or `"true"` to disable secure cookies
    /// - `COOKIE_KEY`: cookie encryption key bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or
    /// invalid.
    pub fn from_env() -> Result<Self, Error> {
        let return_url_str = std::env::var("VAULT_RETURN_URL")
            .map_err(|_| Error::Config("VAULT_RETURN_URL is required".into()))?;
        let return_url: Url = return_url_str
            .parse()
            .map_err(|e| Error::Config(format!("VAULT_RETURN_URL: {e}")))?;

        let mut config = Self::new(return_url);

        if let Ok(base_path) = std::env::var("VAULT_BASE_PATH") {
            config = config.with_base_path(base_path);
        }

        let dev_vault = matches!(
            std::env::var("DEV_VAULT").as_deref(),
            Ok("1") | Ok("true"),
        );

        let cookie_key = match std::env::var("COOKIE_KEY") {
            Ok(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                Error::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            Err(_) => Key::generate(),
        };

        Ok(config
            .with_cookie_key(cookie_key)
            .with_secure_cookies(!dev_vault))
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    /// How long an abandoned session stays resumable (default 30).
    #[must_use]
    pub fn with_session_ttl_minutes(mut self, minutes: i64) -> Self {
        self.settings.session_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<String>) -> Self {
        self.settings.base_path = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_secure() {
        let config = VaultConfig::new("https://bank.example.com/return".parse().unwrap());
        assert!(config.settings.secure_cookies);
        assert_eq!(config.settings.base_path, "/consent");
        assert_eq!(config.settings.session_cookie_name, "__vault_session");
        assert_eq!(config.settings.session_ttl_minutes, 30);
    }

    #[test]
    fn builder_overrides() {
        let config = VaultConfig::new("https://bank.example.com/return".parse().unwrap())
            .with_base_path("/pod")
            .with_session_cookie_name("__pod_flow")
            .with_session_ttl_minutes(5)
            .with_secure_cookies(false);

        assert_eq!(config.settings.base_path, "/pod");
        assert_eq!(config.settings.session_cookie_name, "__pod_flow");
        assert_eq!(config.settings.session_ttl_minutes, 5);
        assert!(!config.settings.secure_cookies);
    }
}
