//! Challenge response materialization.
//!
//! Pure, synchronous derivation of the data a verifier must publish to
//! satisfy a challenge. *Publishing* it — writing the file, creating the TXT
//! record, serving the certificate — is the caller's job; see [RFC 8555 §8].
//!
//! Everything here derives from the key authorization
//! `token || "." || thumbprint(accountKey)`.
//!
//! [RFC 8555 §8]: https://datatracker.ietf.org/doc/html/rfc8555#section-8

use sha2::{Digest as _, Sha256};

use crate::{
    api,
    error::{CryptoError, Error, Result},
    key::AccountKey,
    util::base64url,
};

/// What to publish for one challenge, ready for the caller's provisioner.
#[derive(Debug, Clone)]
pub enum ChallengeAnswer {
    /// Serve `key_authorization` as the body of
    /// `http://{identifier}/.well-known/acme-challenge/{token}`
    /// with content type `application/octet-stream`.
    Http01 {
        token: String,
        key_authorization: String,
    },

    /// Create a TXT record `record_name` with value `txt_value`.
    Dns01 {
        record_name: String,
        txt_value: String,
    },

    /// Serve this self-signed certificate for the identifier on a TLS
    /// listener negotiating ALPN protocol `acme-tls/1`.
    TlsAlpn01 {
        certificate_der: Vec<u8>,
        private_key_der: Vec<u8>,
    },
}

/// The key authorization for `token`: `token || "." || thumbprint`.
///
/// See [RFC 8555 §8.1](https://datatracker.ietf.org/doc/html/rfc8555#section-8.1).
pub fn key_authorization(token: &str, key: &AccountKey) -> Result<String> {
    Ok(format!("{token}.{}", key.thumbprint()?))
}

/// Body of the `http-01` well-known response. Identical to the key
/// authorization.
///
/// See [RFC 8555 §8.3](https://datatracker.ietf.org/doc/html/rfc8555#section-8.3).
pub fn http01_body(token: &str, key: &AccountKey) -> Result<String> {
    key_authorization(token, key)
}

/// Value of the `_acme-challenge` TXT record:
/// base64url(SHA-256(key authorization)), always 43 characters.
///
/// See [RFC 8555 §8.4](https://datatracker.ietf.org/doc/html/rfc8555#section-8.4).
pub fn dns01_txt_value(token: &str, key: &AccountKey) -> Result<String> {
    let key_auth = key_authorization(token, key)?;
    Ok(base64url(&Sha256::digest(key_auth)))
}

/// Name of the TXT record to create for `identifier`.
///
/// A wildcard identifier is validated at the name beneath the `*.` label.
pub fn dns01_record_name(identifier: &str) -> String {
    let name = identifier.strip_prefix("*.").unwrap_or(identifier);
    format!("_acme-challenge.{name}")
}

/// Self-signed `tls-alpn-01` validation certificate for `identifier`.
///
/// The certificate carries the identifier as its single dNSName SAN and the
/// critical `id-pe-acmeIdentifier` (1.3.6.1.5.5.7.1.31) extension wrapping
/// SHA-256(key authorization) as a DER OCTET STRING, per [RFC 8737 §3].
/// Returns the certificate and its private key, both DER (key is PKCS#8).
///
/// [RFC 8737 §3]: https://datatracker.ietf.org/doc/html/rfc8737#section-3
pub fn tls_alpn01_certificate(
    identifier: &str,
    token: &str,
    key: &AccountKey,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let digest: [u8; 32] = Sha256::digest(key_authorization(token, key)?).into();

    let mut params = rcgen::CertificateParams::new(vec![identifier.to_owned()])
        .map_err(|err| CryptoError::Certificate(err.to_string()))?;
    params.custom_extensions = vec![rcgen::CustomExtension::new_acme_identifier(&digest)];

    let key_pair =
        rcgen::KeyPair::generate().map_err(|err| CryptoError::Certificate(err.to_string()))?;
    let cert = params
        .self_signed(&key_pair)
        .map_err(|err| CryptoError::Certificate(err.to_string()))?;

    Ok((cert.der().to_vec(), key_pair.serialize_der()))
}

/// Derive the response for `challenge` in one call.
///
/// Deterministic for http-01 and dns-01; tls-alpn-01 generates a fresh
/// certificate key on every call.
pub fn materialize(
    challenge: &api::Challenge,
    identifier: &str,
    key: &AccountKey,
) -> Result<ChallengeAnswer> {
    match &challenge._type {
        api::ChallengeType::Http01 => Ok(ChallengeAnswer::Http01 {
            token: challenge.token.clone(),
            key_authorization: key_authorization(&challenge.token, key)?,
        }),
        api::ChallengeType::Dns01 => Ok(ChallengeAnswer::Dns01 {
            record_name: dns01_record_name(identifier),
            txt_value: dns01_txt_value(&challenge.token, key)?,
        }),
        api::ChallengeType::TlsAlpn01 => {
            let (certificate_der, private_key_der) =
                tls_alpn01_certificate(identifier, &challenge.token, key)?;
            Ok(ChallengeAnswer::TlsAlpn01 {
                certificate_der,
                private_key_der,
            })
        }
        api::ChallengeType::Unknown(other) => Err(Error::UnsupportedChallenge(other.clone())),
    }
}
