//! Username and password resolution for new sessions.

use rand::RngCore;
use rand::seq::SliceRandom;
use workshop_core::{DEFAULT_USERNAME, Environment};

use crate::entropy::Entropy;

/// Characters a generated password is drawn from.
pub const PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of a generated password.
pub const PASSWORD_LENGTH: usize = 12;

/// Credentials a session is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Derives session credentials from environment defaults.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    default_username: String,
}

impl CredentialResolver {
    pub fn new(default_username: impl Into<String>) -> Self {
        Self {
            default_username: default_username.into(),
        }
    }

    /// Resolve credentials for a session of `environment`.
    ///
    /// A password set on the environment is used verbatim; otherwise a fresh
    /// one is generated from `entropy`.
    pub fn resolve(&self, environment: &Environment, entropy: &Entropy) -> Credentials {
        let defaults = environment.session_defaults();

        let username = defaults
            .and_then(|s| s.username.clone())
            .unwrap_or_else(|| self.default_username.clone());

        let password = defaults
            .and_then(|s| s.password.clone())
            .unwrap_or_else(|| entropy.with_rng(generate_password));

        Credentials { username, password }
    }
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME)
    }
}

/// Generate a password of distinct letters and digits.
///
/// Characters are sampled without replacement, so none repeats.
pub fn generate_password(rng: &mut dyn RngCore) -> String {
    PASSWORD_ALPHABET
        .choose_multiple(rng, PASSWORD_LENGTH)
        .map(|&b| char::from(b))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use proptest::prelude::*;
    use workshop_core::SessionDefaults;

    #[test]
    fn test_defaults_when_environment_is_bare() {
        let creds = CredentialResolver::default()
            .resolve(&Environment::new("training-env"), &Entropy::seeded(1));

        assert_eq!(creds.username, "eduk8s");
        assert_eq!(creds.password.len(), PASSWORD_LENGTH);
    }

    #[test]
    fn test_environment_overrides_are_verbatim() {
        let env = Environment::new("training-env").with_session_defaults(SessionDefaults {
            username: Some("student".to_string()),
            password: Some("fixed-pass".to_string()),
            ..SessionDefaults::default()
        });

        let creds = CredentialResolver::default().resolve(&env, &Entropy::seeded(1));
        assert_eq!(creds.username, "student");
        assert_eq!(creds.password, "fixed-pass");
    }

    #[test]
    fn test_generation_is_reproducible_for_a_seed() {
        let a = Entropy::seeded(99).with_rng(generate_password);
        let b = Entropy::seeded(99).with_rng(generate_password);
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn prop_generated_password_shape(seed in any::<u64>()) {
            let password = Entropy::seeded(seed).with_rng(generate_password);

            prop_assert_eq!(password.chars().count(), PASSWORD_LENGTH);
            prop_assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));

            let distinct: HashSet<char> = password.chars().collect();
            prop_assert_eq!(distinct.len(), PASSWORD_LENGTH);
        }
    }
}
