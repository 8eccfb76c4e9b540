//! Signed token codec (compact JWS over HMAC).

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use warden_core::{Claims, TokenId};

use crate::config::{SigningAlgorithm, TokenConfig};
use crate::error::TokenError;
use crate::token::{TokenDetails, TokenKind, VerificationFailure};

/// On-the-wire payload: caller claims next to the encoding's own fields.
#[derive(Debug, Serialize, Deserialize)]
struct Payload {
    jti: String,
    iat: i64,
    exp: i64,
    iss: String,
    aud: String,
    token_kind: TokenKind,
    #[serde(flatten)]
    claims: Claims,
}

/// A decoded, signature-checked token. Expiry and revocation are not checked.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    pub claims: Claims,
    pub details: TokenDetails,
}

pub struct SignedCodec {
    algorithm: SigningAlgorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
}

impl core::fmt::Debug for SignedCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SignedCodec")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl SignedCodec {
    pub fn new(config: &TokenConfig) -> Result<Self, TokenError> {
        if config.secret.is_empty() {
            return Err(TokenError::Config("signing secret is not configured".to_string()));
        }

        let secret = config.secret.as_bytes();
        let mut validation = Validation::new(config.algorithm.into());
        // Expiry is checked by the manager against its own clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        Ok(Self {
            algorithm: config.algorithm,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        })
    }

    pub fn encode(
        &self,
        claims: &Claims,
        id: &TokenId,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let payload = Payload {
            jti: id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            token_kind: kind,
            claims: claims.clone(),
        };

        encode(&Header::new(self.algorithm.into()), &payload, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    pub fn decode(&self, value: &str) -> Result<DecodedToken, VerificationFailure> {
        let data = decode::<Payload>(value, &self.decoding, &self.validation)
            .map_err(|e| classify(e.kind()))?;
        let payload = data.claims;

        let issued_at =
            DateTime::from_timestamp(payload.iat, 0).ok_or(VerificationFailure::Malformed)?;
        let expires_at =
            DateTime::from_timestamp(payload.exp, 0).ok_or(VerificationFailure::Malformed)?;
        if payload.jti.trim().is_empty() {
            return Err(VerificationFailure::Malformed);
        }

        Ok(DecodedToken {
            claims: payload.claims,
            details: TokenDetails {
                token_id: TokenId::new(payload.jti),
                kind: payload.token_kind,
                issued_at,
                expires_at,
            },
        })
    }
}

fn classify(kind: &ErrorKind) -> VerificationFailure {
    match kind {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience => VerificationFailure::InvalidSignature,
        ErrorKind::ExpiredSignature => VerificationFailure::Expired,
        _ => VerificationFailure::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use proptest::prelude::*;

    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn codec() -> SignedCodec {
        SignedCodec::new(&TokenConfig::signed(SECRET)).unwrap()
    }

    fn issue(codec: &SignedCodec, claims: &Claims) -> String {
        let now = DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap();
        codec
            .encode(
                claims,
                &TokenId::new("jti-1"),
                TokenKind::Access,
                now,
                now + Duration::minutes(15),
            )
            .unwrap()
    }

    #[test]
    fn decode_restores_claims_and_details() {
        let codec = codec();
        let claims = Claims::for_subject("alice", "acme", "portal").with("roles", vec!["editor"]);
        let decoded = codec.decode(&issue(&codec, &claims)).unwrap();

        assert_eq!(decoded.claims, claims);
        assert_eq!(decoded.details.token_id, TokenId::new("jti-1"));
        assert_eq!(decoded.details.kind, TokenKind::Access);
        assert_eq!(
            decoded.details.expires_at - decoded.details.issued_at,
            Duration::minutes(15)
        );
    }

    #[test]
    fn foreign_secret_is_invalid_signature() {
        let claims = Claims::for_subject("alice", "acme", "portal");
        let other = SignedCodec::new(&TokenConfig::signed("another-secret-another-secret-xx")).unwrap();
        let value = issue(&other, &claims);

        assert_eq!(codec().decode(&value), Err(VerificationFailure::InvalidSignature));
    }

    #[test]
    fn swapped_payload_is_invalid_signature() {
        let codec = codec();
        let alice = issue(&codec, &Claims::for_subject("alice", "acme", "portal"));
        let mallory = issue(&codec, &Claims::for_subject("mallory", "acme", "portal"));

        let a: Vec<&str> = alice.split('.').collect();
        let m: Vec<&str> = mallory.split('.').collect();
        let forged = format!("{}.{}.{}", a[0], m[1], a[2]);

        assert_eq!(codec.decode(&forged), Err(VerificationFailure::InvalidSignature));
    }

    #[test]
    fn wrong_issuer_is_invalid_signature() {
        let claims = Claims::for_subject("alice", "acme", "portal");
        let other =
            SignedCodec::new(&TokenConfig::signed(SECRET).with_issuer("someone-else")).unwrap();
        let value = issue(&other, &claims);

        assert_eq!(codec().decode(&value), Err(VerificationFailure::InvalidSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = codec();
        assert_eq!(codec.decode("not-a-token"), Err(VerificationFailure::Malformed));
        assert_eq!(codec.decode("a.b.c"), Err(VerificationFailure::Malformed));
        assert_eq!(codec.decode(""), Err(VerificationFailure::Malformed));
    }

    proptest! {
        #[test]
        fn string_claims_survive_encoding(
            subject in "[a-z][a-z0-9]{0,15}",
            extra in proptest::collection::btree_map("[a-z]{1,8}_x", "[ -~]{0,24}", 0..6),
        ) {
            let codec = codec();
            let mut claims = Claims::for_subject(subject, "acme", "portal");
            for (k, v) in extra {
                claims.insert(k, v);
            }

            let decoded = codec.decode(&issue(&codec, &claims)).unwrap();
            prop_assert_eq!(decoded.claims, claims);
        }
    }
}
