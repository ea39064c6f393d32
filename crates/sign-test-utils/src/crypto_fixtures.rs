//! Deterministic signing keys for testing
//!
//! Each [`TestSigningKey`] pairs a private key (for minting tokens) with the
//! public JWK the identity provider would publish for it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::{json, Value};
use thiserror::Error;

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

/// 2048-bit RSA key, PKCS#8 PEM. Test use only.
const RSA_TEST_KEY_PEM: &[u8] = include_bytes!("fixtures/rsa_test_key.pem");

/// Modulus of [`RSA_TEST_KEY_PEM`], base64url without padding.
const RSA_TEST_KEY_N: &str = "y4fJMYjZtMzuelF0zzcUQHTXB_Gk1BM1tBGbOxNMYnM_cy59eR-ft0Alzsjk3mMpEgJlEJ8-R2CSjZ7StRf6EU4gFKROHh2dqoK8gD9N8TTZDbQEh1rlJwkoi9b_lwQoHz_s7pIYpA07CCeKGR-ZXoLrlgkFCUXG4s5SsXbNPbabDh9fZabD7x2JvepqX-TkX6lzFtNyqgTYFSZX7fIzu25Zp1RNRIMoFNIFdWIuhQ_sd6YCi7aPzY9s2jVsk6xrLFI85rvqBa-Xl1oKSuj0_ypM6DWxrjvVv51vsLEWQnnoYdh1X2hXeZDMXReSaYOuUnxwmnc2nb7o7f2sxounRQ";

/// Public exponent 65537.
const RSA_TEST_KEY_E: &str = "AQAB";

/// A signing key and the JWK that verifies it.
#[derive(Clone)]
pub struct TestSigningKey {
    kid: String,
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    jwk: Value,
}

impl TestSigningKey {
    /// The RSA fixture key, published as an RS256 JWK.
    pub fn rsa(kid: &str) -> Result<Self, FixtureError> {
        let encoding_key = EncodingKey::from_rsa_pem(RSA_TEST_KEY_PEM)
            .map_err(|e| FixtureError::Crypto(format!("Failed to load RSA test key: {}", e)))?;

        Ok(Self {
            kid: kid.to_string(),
            algorithm: Algorithm::RS256,
            encoding_key,
            jwk: json!({
                "kty": "RSA",
                "kid": kid,
                "alg": "RS256",
                "use": "sig",
                "n": RSA_TEST_KEY_N,
                "e": RSA_TEST_KEY_E,
            }),
        })
    }

    /// A deterministic Ed25519 key, published as an EdDSA JWK.
    ///
    /// The same seed always produces the same keypair.
    pub fn ed25519(kid: &str, seed: u8) -> Result<Self, FixtureError> {
        let mut seed_bytes = [0u8; 32];
        for (i, byte) in seed_bytes.iter_mut().enumerate() {
            *byte = seed.wrapping_mul(i as u8 + 1).wrapping_add(i as u8);
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .map_err(|e| FixtureError::Crypto(format!("Failed to generate test keypair: {:?}", e)))?;
        let public_key = URL_SAFE_NO_PAD.encode(key_pair.public_key().as_ref());

        Ok(Self {
            kid: kid.to_string(),
            algorithm: Algorithm::EdDSA,
            encoding_key: EncodingKey::from_ed_der(&pkcs8_from_seed(&seed_bytes)),
            jwk: json!({
                "kty": "OKP",
                "crv": "Ed25519",
                "kid": kid,
                "alg": "EdDSA",
                "use": "sig",
                "x": public_key,
            }),
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// Public JWK as it appears in a key-set document.
    pub fn jwk(&self) -> Value {
        self.jwk.clone()
    }

    /// The same public key announced under a different algorithm.
    pub fn jwk_with_alg(&self, alg: &str) -> Value {
        let mut jwk = self.jwk.clone();
        jwk["alg"] = json!(alg);
        jwk
    }
}

/// Key-set document containing the given keys' JWKs.
pub fn jwks_document(keys: &[&TestSigningKey]) -> Value {
    json!({ "keys": keys.iter().map(|k| k.jwk()).collect::<Vec<_>>() })
}

/// PKCS#8 v1 document wrapping a raw Ed25519 seed (RFC 8410).
fn pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = Vec::with_capacity(48);
    // SEQUENCE, version 0, AlgorithmIdentifier { 1.3.101.112 }
    pkcs8.extend_from_slice(&[
        0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70,
    ]);
    // OCTET STRING { OCTET STRING { seed } }
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);
    pkcs8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ed25519_key_is_deterministic() {
        let a = TestSigningKey::ed25519("k1", 7).unwrap();
        let b = TestSigningKey::ed25519("k1", 7).unwrap();
        assert_eq!(a.jwk(), b.jwk());

        let c = TestSigningKey::ed25519("k1", 8).unwrap();
        assert_ne!(a.jwk()["x"], c.jwk()["x"]);
    }

    #[test]
    fn test_pkcs8_is_accepted_by_ring() {
        let seed = [3u8; 32];
        let pkcs8 = pkcs8_from_seed(&seed);
        assert_eq!(pkcs8.len(), 48);
        assert!(Ed25519KeyPair::from_pkcs8_maybe_unchecked(&pkcs8).is_ok());
    }

    #[test]
    fn test_rsa_jwk_shape() {
        let key = TestSigningKey::rsa("rsa-1").unwrap();
        let jwk = key.jwk();
        assert_eq!(jwk["kty"], "RSA");
        assert_eq!(jwk["alg"], "RS256");
        assert_eq!(jwk["kid"], "rsa-1");
        assert_eq!(key.algorithm(), Algorithm::RS256);
    }

    #[test]
    fn test_jwks_document_lists_keys() {
        let rsa = TestSigningKey::rsa("a").unwrap();
        let ed = TestSigningKey::ed25519("b", 1).unwrap();
        let doc = jwks_document(&[&rsa, &ed]);
        assert_eq!(doc["keys"].as_array().unwrap().len(), 2);
        assert_eq!(doc["keys"][1]["kid"], "b");
    }
}
