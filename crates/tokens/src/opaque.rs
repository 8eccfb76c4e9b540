//! Opaque token values.
//!
//! The bearer value is random and means nothing by itself. Stores and the
//! revocation list key on its SHA-256 digest, so a leaked store never hands
//! out usable bearer values.

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};

use warden_core::TokenId;

/// Length of a generated opaque value.
pub const OPAQUE_TOKEN_LEN: usize = 64;

pub fn generate_value() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(OPAQUE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Identifier derived from an opaque value.
pub fn token_id(value: &str) -> TokenId {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    TokenId::new(format!("{:x}", hasher.finalize()))
}

/// Cheap structural check done before any store lookup.
pub fn is_well_formed(value: &str) -> bool {
    value.len() == OPAQUE_TOKEN_LEN && value.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_values_are_well_formed_and_distinct() {
        let a = generate_value();
        let b = generate_value();
        assert!(is_well_formed(&a));
        assert!(is_well_formed(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn id_is_stable_hex_digest() {
        let value = "a".repeat(OPAQUE_TOKEN_LEN);
        let id = token_id(&value);
        assert_eq!(id, token_id(&value));
        assert_eq!(id.as_str().len(), 64);
        assert!(id.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn rejects_wrong_shape() {
        assert!(!is_well_formed("short"));
        assert!(!is_well_formed(&"-".repeat(OPAQUE_TOKEN_LEN)));
        assert!(!is_well_formed("a.b.c"));
    }
}
