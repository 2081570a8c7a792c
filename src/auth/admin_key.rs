// Shared-secret admin gate

use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;
use tracing::warn;

/// Gate in front of every admin-facing operation.
///
/// Holds the single server-side secret (from `ADMIN_KEY`). Validation is
/// a trimmed, case-sensitive, constant-time comparison. Fail-closed: with
/// no secret configured, every credential is rejected. There is no
/// lockout or rate limiting; callers answer a failed gate exactly like a
/// missing resource so the admin surface stays undiscoverable.
pub struct AdminGate {
    key: Option<Secret<String>>,
}

impl AdminGate {
    /// Build the gate from the configured secret. `None` or an empty
    /// value leaves the gate permanently closed.
    pub fn new(admin_key: Option<String>) -> Self {
        let key = admin_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(Secret::new);
        Self { key }
    }

    /// Validate a supplied credential.
    ///
    /// Pure and side-effect-free besides logging; failures log only a
    /// hash prefix of the supplied value, never the value itself.
    pub fn validate(&self, supplied: Option<&str>) -> bool {
        let Some(key) = &self.key else {
            warn!("ADMIN_KEY not configured; rejecting admin credential");
            return false;
        };
        let Some(supplied) = supplied else {
            return false;
        };

        let supplied = supplied.trim();
        let secret = key.expose_secret().as_str();

        let valid = bool::from(supplied.as_bytes().ct_eq(secret.as_bytes()));
        if !valid {
            warn!(
                key_fingerprint = %key_fingerprint(supplied),
                "Admin credential rejected"
            );
        }
        valid
    }

    /// Whether a secret is configured at all (startup diagnostics).
    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }
}

impl fmt::Debug for AdminGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminGate")
            .field("key", &self.key.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Short SHA-256 fingerprint of a credential for audit logs.
pub fn key_fingerprint(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..12].to_string()
}
