use serde::{Deserialize, Serialize};

use crate::key::Jwk;

/// Inner payload of a key rollover request.
///
/// This object is signed by the *new* key (producing the inner JWS), which is
/// in turn signed by the old key and POSTed to the `keyChange` endpoint.
///
/// See [RFC 8555 §7.3.5].
///
/// [RFC 8555 §7.3.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.3.5
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyChange {
    /// The account URL (kid) whose key is being replaced.
    pub account: String,

    /// The JWK of the key being replaced, proving the signer knows which key
    /// it is rolling away from.
    pub old_key: Jwk,
}
