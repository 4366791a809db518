use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`api::Challenge`].
///
/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Processing,
    Valid,
    Invalid,
}

/// The validation method a challenge offers.
///
/// Servers may advertise challenge types this library does not know; those
/// are preserved verbatim in the `Unknown` variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeType {
    #[serde(rename = "http-01")]
    Http01,
    #[serde(rename = "dns-01")]
    Dns01,
    #[serde(rename = "tls-alpn-01")]
    TlsAlpn01,
    #[serde(untagged)]
    Unknown(String),
}

/// An ACME challenge object.
///
/// Represents a server's offer to validate a client's possession of an
/// identifier in a specific way.
///
/// See [RFC 8555 §7.1.5].
///
/// # Example JSON
///
/// ```json
/// {
///   "type": "http-01",
///   "status": "pending",
///   "url": "https://acme-staging-v02.api.letsencrypt.org/acme/challenge/YTqpYUthlVfwBncUufE8IRA2TkzZkN4eYWWLMSRqcSs/216789597",
///   "token": "MUi-gqeOJdRkSb_YR2eaMxQBqf6al8dgt_dOttSWb0w"
/// }
/// ```
///
/// [RFC 8555 §7.1.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.5
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Type of challenge encoded in the object.
    #[serde(rename = "type")]
    pub _type: ChallengeType,

    /// URL to which a response can be posted.
    pub url: String,

    /// Status of this challenge.
    pub status: ChallengeStatus,

    /// Time at which the server validated this challenge.
    ///
    /// Uses RFC 3339 format.
    pub validated: Option<String>,

    /// Error that occurred while the server was validating the challenge, if
    /// any.
    pub error: Option<api::Problem>,

    /// A random value that uniquely identifies the challenge.
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_challenge_types_parse() {
        let json = r#"{
            "type": "dns-01",
            "status": "pending",
            "url": "https://example.com/acme/chall/1",
            "validated": null,
            "error": null,
            "token": "RRo2ZcXAEqxKvMH8RGcATjSK1KknLEUmauwfQ5i3gG8"
        }"#;
        let challenge: Challenge = serde_json::from_str(json).unwrap();
        assert_eq!(challenge._type, ChallengeType::Dns01);

        let json = json.replace("dns-01", "device-attest-01");
        let challenge: Challenge = serde_json::from_str(&json).unwrap();
        assert_eq!(
            challenge._type,
            ChallengeType::Unknown("device-attest-01".to_owned())
        );
    }
}
