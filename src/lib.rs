//! Client core for provisioning certificates from ACME (Automatic
//! Certificate Management Environment) providers such as
//! [Let's Encrypt](https://letsencrypt.org/).
//!
//! Implements the ACME v2 protocol of
//! [RFC 8555](https://datatracker.ietf.org/doc/html/rfc8555): account
//! management (including key rollover), order creation, authorization via
//! challenge response, CSR finalization and certificate download. This crate
//! drives the protocol; *publishing* challenge responses (writing well-known
//! files, creating TXT records, serving validation certificates) is left to
//! the caller, fed by the [`challenge`] materializer.
//!
//! # Flow
//!
//! 1. [`Directory::fetch`] the provider's service URLs.
//! 2. Register or load an [`Account`] (any of RS256/ES256/ES384/ES512
//!    account keys).
//! 3. [`Account::new_order`] for the domains, then satisfy each
//!    authorization by publishing one challenge's proof and answering it.
//! 4. Once the order is `ready`, finalize with a DER CSR and download the
//!    certificate chain (alternate chains included).
//!
//! A complete run against a live endpoint is in `demos/http-01.rs`.
//!
//! # Domain Ownership
//!
//! Most website TLS certificates tries to prove ownership/control over the
//! domain they are issued for. For ACME, this means proving you control
//! either:
//!
//! - a server answering TLS or HTTP requests for that domain;
//! - the DNS server answering name lookups against the domain.
//!
//! To use this library, there are points in the flow where you would need to
//! modify either the web server or DNS server before progressing to get the
//! certificate. See [`order::Auth`].
//!
//! # Rate Limits
//!
//! The ACME API provider Let's Encrypt uses [rate limits] to ensure the API
//! is not being abused. It might be tempting to put the poll interval really
//! low in some of this library's polling calls, but balance this against the
//! real risk of having access cut off.
//!
//! ## Use Staging For Development!
//!
//! Especially take care to use the Let's Encrypt staging environment for
//! development where the rate limits are more relaxed. See
//! [`DirectoryUrl::LetsEncryptStaging`].
//!
//! [rate limits]: https://letsencrypt.org/docs/rate-limits

#![deny(rust_2018_idioms, nonstandard_style, future_incompatible)]

mod acc;
mod cert;
mod dir;
mod error;
mod jws;
mod key;
mod req;
mod trans;
mod util;

pub mod api;
pub mod challenge;
pub mod order;

#[cfg(test)]
mod test;

pub use crate::{
    acc::{Account, AccountBuilder, RevocationReason},
    cert::{create_csr, create_p256_key, Certificate},
    dir::{Directory, DirectoryUrl},
    error::{CryptoError, Error, Result},
    key::{AccountKey, Jwk, SigningAlgorithm},
    order::{Order, OrderBuilder, Poller},
};
