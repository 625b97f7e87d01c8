//! Shared helpers for the provider adapter: HTTP error mapping and API key
//! resolution.

use tc_domain::config::AuthConfig;
use tc_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the API key from an [`AuthConfig`].
///
/// Precedence:
/// 1. `key` field (plaintext, warns)
/// 2. `service` + `account` in the OS keychain
/// 3. `env` field (reads the environment variable)
/// 4. `{SERVICE}_{ACCOUNT}` uppercased, for hosts without a keychain daemon
///
/// Returns [`Error::Auth`] when none of them yields a non-empty key. The
/// interactive front-end treats that as "ask the user".
pub fn resolve_api_key(auth: &AuthConfig) -> Result<String> {
    if let Some(ref key) = auth.key {
        if !key.is_empty() {
            tracing::warn!(
                "API key loaded from plaintext config field 'key'; \
                 prefer 'env' or the keychain instead"
            );
            return Ok(key.clone());
        }
    }

    if let (Some(ref service), Some(ref account)) = (&auth.service, &auth.account) {
        match resolve_from_keychain(service, account) {
            Ok(secret) => return Ok(secret),
            Err(e) => {
                tracing::debug!(
                    service = %service,
                    account = %account,
                    error = %e,
                    "keychain lookup failed, falling through to env"
                );
            }
        }
    }

    if let Some(ref env_var) = auth.env {
        match std::env::var(env_var) {
            Ok(val) if !val.trim().is_empty() => return Ok(val.trim().to_string()),
            _ => tracing::debug!(env_var = %env_var, "API key env var not set"),
        }
    }

    if let (Some(ref service), Some(ref account)) = (&auth.service, &auth.account) {
        let fallback_var = keychain_fallback_env_name(service, account);
        if let Ok(val) = std::env::var(&fallback_var) {
            if !val.trim().is_empty() {
                tracing::info!(
                    env_var = %fallback_var,
                    "API key resolved from keychain fallback env var"
                );
                return Ok(val.trim().to_string());
            }
        }
    }

    let hint = match auth.env {
        Some(ref env_var) => format!("environment variable '{env_var}' not set"),
        None => "no 'key', 'env', or keychain 'service'+'account' configured".into(),
    };
    Err(Error::Auth(format!("no API key available: {hint}")))
}

/// Read a secret from the OS keychain.
///
/// Fails on headless systems where no keychain daemon is available.
pub fn resolve_from_keychain(service: &str, account: &str) -> Result<String> {
    let entry = keyring::Entry::new(service, account)
        .map_err(|e| Error::Auth(format!("keyring entry creation failed: {e}")))?;
    entry
        .get_password()
        .map_err(|e| Error::Auth(format!("keyring get_password failed: {e}")))
}

/// Store a secret in the OS keychain, replacing any previous value.
pub fn store_in_keychain(service: &str, account: &str, secret: &str) -> Result<()> {
    let entry = keyring::Entry::new(service, account)
        .map_err(|e| Error::Auth(format!("keyring entry creation failed: {e}")))?;
    entry
        .set_password(secret)
        .map_err(|e| Error::Auth(format!("keyring set_password failed: {e}")))
}

/// Build the headless fallback env var name for a keychain service/account.
///
/// Example: `("toolchat", "anthropic-api-key")` → `"TOOLCHAT_ANTHROPIC_API_KEY"`.
pub fn keychain_fallback_env_name(service: &str, account: &str) -> String {
    format!(
        "{}_{}",
        service.to_uppercase().replace('-', "_"),
        account.to_uppercase().replace('-', "_"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> AuthConfig {
        AuthConfig {
            env: None,
            ..Default::default()
        }
    }

    #[test]
    fn fallback_env_name_basic() {
        assert_eq!(
            keychain_fallback_env_name("toolchat", "anthropic-api-key"),
            "TOOLCHAT_ANTHROPIC_API_KEY"
        );
    }

    #[test]
    fn fallback_env_name_already_upper() {
        assert_eq!(keychain_fallback_env_name("MY_SVC", "KEY"), "MY_SVC_KEY");
    }

    #[test]
    fn plaintext_key_wins() {
        let auth = AuthConfig {
            key: Some("plaintext-wins".into()),
            env: Some("TC_TEST_SHOULD_NOT_BE_READ".into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "plaintext-wins");
    }

    #[test]
    fn empty_plaintext_key_is_ignored() {
        let auth = AuthConfig {
            key: Some(String::new()),
            ..no_env()
        };
        assert!(resolve_api_key(&auth).is_err());
    }

    #[test]
    fn env_var_is_read_and_trimmed() {
        let var_name = "TC_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "  env-secret-value\n");
        let auth = AuthConfig {
            env: Some(var_name.into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn missing_env_var_is_named_in_error() {
        let auth = AuthConfig {
            env: Some("TC_TEST_NONEXISTENT_VAR_8888".into()),
            ..Default::default()
        };
        let err = resolve_api_key(&auth).unwrap_err();
        assert!(err.is_credential_error());
        assert!(err.to_string().contains("TC_TEST_NONEXISTENT_VAR_8888"));
    }

    #[test]
    fn nothing_configured() {
        let err = resolve_api_key(&no_env()).unwrap_err();
        assert!(err.to_string().contains("no API key available"));
    }

    #[test]
    fn keychain_fallback_env_used_without_daemon() {
        let fallback_var = "TOOLCHATTEST_MY_PROVIDER";
        std::env::set_var(fallback_var, "fallback-secret");
        let auth = AuthConfig {
            service: Some("toolchattest".into()),
            account: Some("my-provider".into()),
            ..no_env()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "fallback-secret");
        std::env::remove_var(fallback_var);
    }

    #[test]
    fn env_takes_precedence_over_keychain_fallback() {
        let env_var = "TC_TEST_ENV_PREC_KEY_7777";
        let fallback_var = "TOOLCHATTEST_PREC_PROVIDER";
        std::env::set_var(env_var, "env-wins");
        std::env::set_var(fallback_var, "fallback-loses");
        let auth = AuthConfig {
            env: Some(env_var.into()),
            service: Some("toolchattest".into()),
            account: Some("prec-provider".into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "env-wins");
        std::env::remove_var(env_var);
        std::env::remove_var(fallback_var);
    }

    #[test]
    #[ignore] // Requires a running keychain daemon
    fn keychain_round_trip() {
        let service = "toolchat-test";
        let account = "integration-test-key";
        store_in_keychain(service, account, "secret-12345").unwrap();
        assert_eq!(resolve_from_keychain(service, account).unwrap(), "secret-12345");
        keyring::Entry::new(service, account)
            .unwrap()
            .delete_credential()
            .unwrap();
    }
}
