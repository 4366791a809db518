//! Flattened JWS JSON serialization per [RFC 7515 §7.2.2], profiled for ACME
//! by [RFC 8555 §6.2].
//!
//! [RFC 7515 §7.2.2]: https://datatracker.ietf.org/doc/html/rfc7515#section-7.2.2
//! [RFC 8555 §6.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.2

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    key::{AccountKey, Jwk, SigningAlgorithm},
};

/// JWS Protected Header as defined in [RFC 8555 §6.2].
///
/// > For newAccount requests, and for revokeCert requests authenticated by a
/// > certificate key, there MUST be a "jwk" field. This field MUST contain
/// > the public key corresponding to the private key used to sign the JWS.
/// >
/// > For all other requests, the request is signed using an existing account,
/// > and there MUST be a "kid" field. This field MUST contain the account URL
/// > received by POSTing to the newAccount resource.
///
/// The nonce is optional only for the inner JWS of a key rollover, which
/// [RFC 8555 §7.3.5] requires to omit it.
///
/// [RFC 8555 §6.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.2
/// [RFC 8555 §7.3.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.3.5
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ProtectedHeader {
    alg: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,

    url: String,

    /// Mutually exclusive with the `kid` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    jwk: Option<Jwk>,

    /// Mutually exclusive with the `jwk` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
}

impl ProtectedHeader {
    pub(crate) fn new_jwk(
        alg: SigningAlgorithm,
        jwk: Jwk,
        url: &str,
        nonce: Option<String>,
    ) -> Self {
        ProtectedHeader {
            alg: alg.as_str().to_owned(),
            nonce,
            url: url.to_owned(),
            jwk: Some(jwk),
            kid: None,
        }
    }

    pub(crate) fn new_kid(alg: SigningAlgorithm, kid: &str, url: &str, nonce: String) -> Self {
        ProtectedHeader {
            alg: alg.as_str().to_owned(),
            nonce: Some(nonce),
            url: url.to_owned(),
            jwk: None,
            kid: Some(kid.to_owned()),
        }
    }
}

/// A signed request body in the flattened JSON serialization.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct FlattenedJws {
    pub(crate) protected: String,
    pub(crate) payload: String,
    pub(crate) signature: String,
}

impl FlattenedJws {
    pub(crate) fn to_body(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Sign `payload` under `protected`, producing the flattened JWS.
///
/// A `None` payload is the POST-as-GET form: the payload member is the empty
/// string and the signing input ends with the bare `.` separator.
pub(crate) fn sign<T: Serialize + ?Sized>(
    key: &AccountKey,
    protected: ProtectedHeader,
    payload: Option<&T>,
) -> Result<FlattenedJws> {
    let protected = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(&protected)?);

    let payload = match payload {
        Some(data) => BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(data)?),
        None => String::new(),
    };

    let signing_input = format!("{protected}.{payload}");
    let signature = BASE64_URL_SAFE_NO_PAD.encode(key.sign(signing_input.as_bytes())?);

    Ok(FlattenedJws {
        protected,
        payload,
        signature,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use signature::Verifier as _;

    use super::*;
    use crate::test::EC_PEM;

    fn decode_json(b64: &str) -> serde_json::Value {
        let bytes = BASE64_URL_SAFE_NO_PAD.decode(b64).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn flattened_jws_round_trips() {
        let key = AccountKey::from_pkcs8_pem(EC_PEM).unwrap();
        let protected = ProtectedHeader::new_kid(
            key.algorithm(),
            "https://example.com/acme/acct/1",
            "https://example.com/acme/new-order",
            "nonce-1".to_owned(),
        );
        let jws = sign(&key, protected, Some(&json!({ "hello": "world" }))).unwrap();

        let body = jws.to_body().unwrap();
        let parsed: FlattenedJws = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed, jws);
    }

    #[test]
    fn kid_header_excludes_jwk() {
        let key = AccountKey::from_pkcs8_pem(EC_PEM).unwrap();
        let protected = ProtectedHeader::new_kid(
            key.algorithm(),
            "https://example.com/acme/acct/1",
            "https://example.com/acme/chall/xyz",
            "nonce-2".to_owned(),
        );
        let jws = sign(&key, protected, Some(&json!({}))).unwrap();

        let header = decode_json(&jws.protected);
        assert_eq!(header["alg"], "ES256");
        assert_eq!(header["nonce"], "nonce-2");
        assert_eq!(header["url"], "https://example.com/acme/chall/xyz");
        assert_eq!(header["kid"], "https://example.com/acme/acct/1");
        assert!(header.get("jwk").is_none());
    }

    #[test]
    fn jwk_header_excludes_kid() {
        let key = AccountKey::from_pkcs8_pem(EC_PEM).unwrap();
        let protected = ProtectedHeader::new_jwk(
            key.algorithm(),
            key.public_jwk(),
            "https://example.com/acme/new-acct",
            Some("nonce-3".to_owned()),
        );
        let jws = sign(&key, protected, Some(&json!({}))).unwrap();

        let header = decode_json(&jws.protected);
        assert_eq!(header["jwk"]["kty"], "EC");
        assert_eq!(header["jwk"]["crv"], "P-256");
        assert!(header.get("kid").is_none());
    }

    #[test]
    fn post_as_get_payload_is_empty_string() {
        let key = AccountKey::from_pkcs8_pem(EC_PEM).unwrap();
        let protected = ProtectedHeader::new_kid(
            key.algorithm(),
            "https://example.com/acme/acct/1",
            "https://example.com/acme/order/7",
            "nonce-4".to_owned(),
        );
        let jws = sign::<()>(&key, protected, None).unwrap();
        assert_eq!(jws.payload, "");
    }

    #[test]
    fn signature_covers_protected_dot_payload() {
        let key = AccountKey::from_pkcs8_pem(EC_PEM).unwrap();
        let protected = ProtectedHeader::new_kid(
            key.algorithm(),
            "https://example.com/acme/acct/1",
            "https://example.com/acme/new-order",
            "nonce-5".to_owned(),
        );
        let jws = sign(&key, protected, Some(&json!({ "csr": "zzz" }))).unwrap();

        let signing_input = format!("{}.{}", jws.protected, jws.payload);
        let raw = BASE64_URL_SAFE_NO_PAD.decode(&jws.signature).unwrap();

        let AccountKey::Es256(signing_key) = &key else {
            panic!("expected ES256");
        };
        let signature = p256::ecdsa::Signature::try_from(raw.as_slice()).unwrap();
        signing_key
            .verifying_key()
            .verify(signing_input.as_bytes(), &signature)
            .unwrap();
    }
}
