//! Account signing keys.
//!
//! An [`AccountKey`] signs every JWS this library sends. ACME servers MUST
//! support ES256 and usually accept the other JOSE ECDSA variants as well as
//! RS256; this library supports all four so existing account keys can be
//! loaded regardless of how they were provisioned.

use std::fmt;

use pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use signature::{SignatureEncoding as _, Signer as _};
use zeroize::Zeroizing;

use crate::{error::CryptoError, util::base64url};

/// JWS signature algorithm identifiers accepted for account keys.
///
/// See [RFC 7518 §3.1](https://datatracker.ietf.org/doc/html/rfc7518#section-3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    #[serde(rename = "RS256")]
    Rs256,
    #[serde(rename = "ES256")]
    Es256,
    #[serde(rename = "ES384")]
    Es384,
    #[serde(rename = "ES512")]
    Es512,
}

impl SigningAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            SigningAlgorithm::Rs256 => "RS256",
            SigningAlgorithm::Es256 => "ES256",
            SigningAlgorithm::Es384 => "ES384",
            SigningAlgorithm::Es512 => "ES512",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CryptoError> {
        match s {
            "RS256" => Ok(SigningAlgorithm::Rs256),
            "ES256" => Ok(SigningAlgorithm::Es256),
            "ES384" => Ok(SigningAlgorithm::Es384),
            "ES512" => Ok(SigningAlgorithm::Es512),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_owned())),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical public JWK as used in protected headers and for thumbprinting.
///
/// Only the REQUIRED members of each key type are present, and the fields are
/// declared in lexicographic order so serialization yields the canonical
/// member order of [RFC 7638 §3.2]. LEXICAL ORDER OF FIELDS MATTERS!
///
/// [RFC 7638 §3.2]: https://datatracker.ietf.org/doc/html/rfc7638#section-3.2
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Jwk {
    Ec {
        crv: String,
        kty: String,
        x: String,
        y: String,
    },
    Rsa {
        e: String,
        kty: String,
        n: String,
    },
}

impl Jwk {
    /// SHA-256 over the canonical JWK serialization, base64url unpadded.
    ///
    /// See [RFC 7638](https://datatracker.ietf.org/doc/html/rfc7638).
    pub fn thumbprint(&self) -> Result<String, serde_json::Error> {
        let canonical = serde_json::to_vec(self)?;
        Ok(base64url(&Sha256::digest(canonical)))
    }
}

/// The asymmetric key an ACME account signs its requests with.
///
/// Wraps one of the supported key types together with its JWS algorithm.
/// The key itself is never sent over the wire; only its public JWK is.
#[derive(Clone)]
pub enum AccountKey {
    Rs256(rsa::RsaPrivateKey),
    Es256(p256::ecdsa::SigningKey),
    Es384(p384::ecdsa::SigningKey),
    Es512(p521::ecdsa::SigningKey),
}

impl AccountKey {
    /// Generate a fresh key for `algorithm` using the system CSPRNG.
    ///
    /// RS256 keys are 2048 bit, the floor Let's Encrypt accepts.
    pub fn generate(algorithm: SigningAlgorithm) -> Result<AccountKey, CryptoError> {
        let mut rng = rand::thread_rng();
        Ok(match algorithm {
            SigningAlgorithm::Rs256 => AccountKey::Rs256(
                rsa::RsaPrivateKey::new(&mut rng, 2048)
                    .map_err(|err| CryptoError::InvalidKey(err.to_string()))?,
            ),
            SigningAlgorithm::Es256 => {
                AccountKey::Es256(p256::ecdsa::SigningKey::random(&mut rng))
            }
            SigningAlgorithm::Es384 => {
                AccountKey::Es384(p384::ecdsa::SigningKey::random(&mut rng))
            }
            SigningAlgorithm::Es512 => {
                AccountKey::Es512(p521::ecdsa::SigningKey::random(&mut rng))
            }
        })
    }

    /// Load a key from an unencrypted PKCS#8 PEM document.
    ///
    /// The algorithm is inferred from the key type and curve.
    pub fn from_pkcs8_pem(pem: &str) -> Result<AccountKey, CryptoError> {
        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            return Ok(AccountKey::Es256(key));
        }
        if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            return Ok(AccountKey::Es384(key));
        }
        if let Ok(key) = ecdsa::SigningKey::<p521::NistP521>::from_pkcs8_pem(pem) {
            return Ok(AccountKey::Es512(key));
        }
        if let Ok(key) = rsa::RsaPrivateKey::from_pkcs8_pem(pem) {
            return Ok(AccountKey::Rs256(key));
        }
        Err(CryptoError::InvalidKey(
            "not an RSA or NIST-curve ECDSA PKCS#8 key".to_owned(),
        ))
    }

    /// Serialize the key as unencrypted PKCS#8 PEM.
    pub fn to_pkcs8_pem(&self) -> Result<Zeroizing<String>, CryptoError> {
        match self {
            AccountKey::Rs256(key) => key.to_pkcs8_pem(pkcs8::LineEnding::LF),
            AccountKey::Es256(key) => key.to_pkcs8_pem(pkcs8::LineEnding::LF),
            AccountKey::Es384(key) => key.to_pkcs8_pem(pkcs8::LineEnding::LF),
            AccountKey::Es512(key) => key.to_pkcs8_pem(pkcs8::LineEnding::LF),
        }
        .map_err(|err| CryptoError::InvalidKey(err.to_string()))
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        match self {
            AccountKey::Rs256(_) => SigningAlgorithm::Rs256,
            AccountKey::Es256(_) => SigningAlgorithm::Es256,
            AccountKey::Es384(_) => SigningAlgorithm::Es384,
            AccountKey::Es512(_) => SigningAlgorithm::Es512,
        }
    }

    /// The canonical public JWK for this key.
    pub fn public_jwk(&self) -> Jwk {
        match self {
            AccountKey::Rs256(key) => {
                use rsa::traits::PublicKeyParts as _;
                let public = key.to_public_key();
                Jwk::Rsa {
                    e: base64url(&public.e().to_bytes_be()),
                    kty: "RSA".to_owned(),
                    n: base64url(&public.n().to_bytes_be()),
                }
            }
            AccountKey::Es256(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                ec_jwk("P-256", point.x().unwrap(), point.y().unwrap())
            }
            AccountKey::Es384(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                ec_jwk("P-384", point.x().unwrap(), point.y().unwrap())
            }
            AccountKey::Es512(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                ec_jwk("P-521", point.x().unwrap(), point.y().unwrap())
            }
        }
    }

    /// JWK thumbprint of the public key, base64url unpadded.
    pub fn thumbprint(&self) -> Result<String, serde_json::Error> {
        self.public_jwk().thumbprint()
    }

    /// Sign `message` with this key.
    ///
    /// RSA keys produce a PKCS#1 v1.5 signature over SHA-256. ECDSA keys
    /// produce the fixed-width `r || s` concatenation (NOT DER) with the
    /// curve-matched hash, as JWS requires.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self {
            AccountKey::Rs256(key) => {
                let signer = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone());
                let signature = signer.try_sign(message).map_err(|_| CryptoError::Signing)?;
                Ok(signature.to_vec())
            }
            AccountKey::Es256(key) => {
                let signature: p256::ecdsa::Signature =
                    key.try_sign(message).map_err(|_| CryptoError::Signing)?;
                Ok(signature.to_vec())
            }
            AccountKey::Es384(key) => {
                let signature: p384::ecdsa::Signature =
                    key.try_sign(message).map_err(|_| CryptoError::Signing)?;
                Ok(signature.to_vec())
            }
            AccountKey::Es512(key) => {
                let signature: p521::ecdsa::Signature =
                    key.try_sign(message).map_err(|_| CryptoError::Signing)?;
                Ok(signature.to_vec())
            }
        }
    }
}

fn ec_jwk(crv: &str, x: &[u8], y: &[u8]) -> Jwk {
    Jwk::Ec {
        crv: crv.to_owned(),
        kty: "EC".to_owned(),
        x: base64url(x),
        y: base64url(y),
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKey")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}
