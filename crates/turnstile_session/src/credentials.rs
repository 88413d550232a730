//! Credentials and certificate checks.

use crate::AuthMode;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use turnstile_error::{ConfigError, TurnstileResult};

/// The only permission bits accepted on a private key file.
pub const REQUIRED_KEY_MODE: u32 = 0o600;

/// Paths to a client certificate and its private key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, derive_getters::Getters)]
pub struct CertificatePair {
    cert_file: PathBuf,
    key_file: PathBuf,
}

impl CertificatePair {
    /// Create a certificate pair.
    pub fn new(cert_file: impl Into<PathBuf>, key_file: impl Into<PathBuf>) -> Self {
        Self {
            cert_file: cert_file.into(),
            key_file: key_file.into(),
        }
    }
}

/// Account credentials for the exchange.
///
/// The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Deserialize, derive_getters::Getters)]
pub struct Credentials {
    username: String,
    password: String,
    app_key: String,
    #[serde(default)]
    certificate: Option<CertificatePair>,
}

impl Credentials {
    /// Create password credentials.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        app_key: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            app_key: app_key.into(),
            certificate: None,
        }
    }

    /// Attach a certificate pair for non-interactive login.
    pub fn with_certificate(mut self, certificate: CertificatePair) -> Self {
        self.certificate = Some(certificate);
        self
    }

    /// Create credentials from environment variables.
    ///
    /// Reads:
    /// - `TURNSTILE_USERNAME` (required)
    /// - `TURNSTILE_PASSWORD` (required)
    /// - `TURNSTILE_APP_KEY` (required)
    /// - `TURNSTILE_CERT_FILE` (optional)
    /// - `TURNSTILE_KEY_FILE` (optional)
    ///
    /// A certificate pair is only attached when both optional paths are set.
    pub fn from_env() -> TurnstileResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TurnstileResult<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let (Some(username), Some(password), Some(app_key)) = (
            var("TURNSTILE_USERNAME"),
            var("TURNSTILE_PASSWORD"),
            var("TURNSTILE_APP_KEY"),
        ) else {
            return Err(ConfigError::new(
                "Missing required environment variables: \
                 TURNSTILE_USERNAME, TURNSTILE_PASSWORD, TURNSTILE_APP_KEY",
            )
            .into());
        };

        let mut credentials = Self::new(username, password, app_key);
        match (var("TURNSTILE_CERT_FILE"), var("TURNSTILE_KEY_FILE")) {
            (Some(cert), Some(key)) => {
                credentials = credentials.with_certificate(CertificatePair::new(cert, key));
            }
            (None, None) => {}
            (cert, key) => warn!(
                cert_file_set = cert.is_some(),
                key_file_set = key.is_some(),
                "TURNSTILE_CERT_FILE and TURNSTILE_KEY_FILE must be set together, \
                 using password login"
            ),
        }

        Ok(credentials)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("app_key", &self.app_key)
            .field("certificate", &self.certificate)
            .finish()
    }
}

/// Decide how to authenticate, checking certificate files on disk.
///
/// Blocking: touches the filesystem. Missing certificate files fall back to
/// password login with a warning; a key file readable by anyone but its owner is
/// a fatal configuration error.
///
/// # Errors
///
/// Returns a configuration error when the key file permissions are not `0600`.
#[instrument(skip(credentials), fields(username = %credentials.username))]
pub fn resolve_auth_mode(credentials: &Credentials) -> TurnstileResult<AuthMode> {
    let Some(certificate) = &credentials.certificate else {
        return Ok(AuthMode::Password);
    };

    if !certificate.cert_file.exists() || !certificate.key_file.exists() {
        warn!(
            cert_file = %certificate.cert_file.display(),
            key_file = %certificate.key_file.display(),
            "Certificate files not found, falling back to password authentication"
        );
        return Ok(AuthMode::Password);
    }

    check_key_permissions(&certificate.key_file)?;

    info!(cert_file = %certificate.cert_file.display(), "Certificate authentication enabled");
    Ok(AuthMode::Certificate {
        cert_file: certificate.cert_file.clone(),
        key_file: certificate.key_file.clone(),
    })
}

/// Verify that a private key file is readable and writable by its owner only.
///
/// # Errors
///
/// Returns a configuration error naming the path, the observed mode and the
/// `chmod` needed to fix it.
#[cfg(unix)]
pub fn check_key_permissions(key_file: &Path) -> TurnstileResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(key_file).map_err(|e| {
        ConfigError::new(format!(
            "Cannot read private key file {}: {}",
            key_file.display(),
            e
        ))
    })?;

    let mode = metadata.permissions().mode() & 0o7777;
    if mode != REQUIRED_KEY_MODE {
        return Err(ConfigError::new(format!(
            "SECURITY ERROR: Private key file {} has incorrect permissions {:o} (should be 600). \
             Fix with: chmod 600 {}",
            key_file.display(),
            mode,
            key_file.display()
        ))
        .into());
    }

    info!(key_file = %key_file.display(), "Private key permissions verified: 600");
    Ok(())
}

/// Verify that a private key file is readable and writable by its owner only.
///
/// POSIX permission bits do not exist on this platform; only existence is checked.
#[cfg(not(unix))]
pub fn check_key_permissions(key_file: &Path) -> TurnstileResult<()> {
    if !key_file.exists() {
        return Err(ConfigError::new(format!(
            "Private key file {} does not exist",
            key_file.display()
        ))
        .into());
    }
    warn!(
        key_file = %key_file.display(),
        "Key file permission bits cannot be verified on this platform"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("TURNSTILE_USERNAME", "punter"),
        ("TURNSTILE_PASSWORD", "hunter2"),
        ("TURNSTILE_APP_KEY", "app-key"),
    ];

    #[test]
    fn test_from_env_reads_password_credentials() {
        let credentials = Credentials::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(credentials.username(), "punter");
        assert_eq!(credentials.password(), "hunter2");
        assert_eq!(credentials.app_key(), "app-key");
        assert!(credentials.certificate().is_none());
    }

    #[test]
    fn test_from_env_names_missing_variables() {
        let err = Credentials::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();

        assert!(err.is_config());
        let message = err.to_string();
        for name in ["TURNSTILE_USERNAME", "TURNSTILE_PASSWORD", "TURNSTILE_APP_KEY"] {
            assert!(message.contains(name), "{message}");
        }
    }

    #[test]
    fn test_from_env_treats_empty_as_missing() {
        let mut vars = REQUIRED.to_vec();
        vars[1] = ("TURNSTILE_PASSWORD", "");

        assert!(Credentials::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_from_env_attaches_certificate_pair() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("TURNSTILE_CERT_FILE", "/etc/turnstile/client.crt"));
        vars.push(("TURNSTILE_KEY_FILE", "/etc/turnstile/client.key"));

        let credentials = Credentials::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(
            credentials.certificate().as_ref(),
            Some(&CertificatePair::new(
                "/etc/turnstile/client.crt",
                "/etc/turnstile/client.key"
            ))
        );
    }

    #[test]
    fn test_from_env_needs_both_certificate_paths() {
        let mut cert_only = REQUIRED.to_vec();
        cert_only.push(("TURNSTILE_CERT_FILE", "/etc/turnstile/client.crt"));
        let mut key_only = REQUIRED.to_vec();
        key_only.push(("TURNSTILE_KEY_FILE", "/etc/turnstile/client.key"));

        assert!(Credentials::from_lookup(lookup(&cert_only)).unwrap().certificate().is_none());
        assert!(Credentials::from_lookup(lookup(&key_only)).unwrap().certificate().is_none());
    }
}
