use crate::api;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while talking to an ACME provider.
///
/// `badNonce` rejections are recovered locally (one retry with the
/// server-issued nonce); every other failure is surfaced unchanged so
/// callers can compose their own retry policy.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Network, TLS or I/O failure below the protocol layer.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A structured `application/problem+json` error returned by the server.
    #[error(transparent)]
    Api(#[from] api::Problem),

    /// The server rejected both the original nonce and the retry nonce.
    #[error("badNonce retry budget exhausted")]
    BadNonceExhausted,

    /// A non-2xx response that did not carry a problem document.
    #[error("unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// An operation was attempted against an order in the wrong state,
    /// e.g. finalizing an order that is not `ready`.
    #[error("order is {actual:?} but operation requires {expected:?}")]
    StateViolation {
        expected: api::OrderStatus,
        actual: api::OrderStatus,
    },

    /// The challenge type is not one this library can materialize.
    #[error("unsupported challenge type: {0}")]
    UnsupportedChallenge(String),

    /// The cancellation signal attached to the poller fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The deadline attached to the poller elapsed.
    #[error("deadline elapsed while polling")]
    Timeout,

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("JSON (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A mandatory response header (e.g. `Location`, `Replay-Nonce`) was absent.
    #[error("missing response header: {0}")]
    MissingHeader(&'static str),
}

/// Failures in the signing-key layer.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CryptoError {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signing failed")]
    Signing,

    #[error("certificate generation failed: {0}")]
    Certificate(String),
}
