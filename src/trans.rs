use std::{collections::VecDeque, sync::Arc};

use parking_lot::{Mutex, RwLock};
use reqwest::header::HeaderMap;
use serde::Serialize;

use crate::{
    error::{Error, Result},
    jws::{self, ProtectedHeader},
    key::AccountKey,
    req::{req_expect_header, req_handle_error, req_head, req_post},
};

#[derive(Clone, Copy)]
enum HeaderKind {
    /// Embed the full public JWK; used for newAccount and key-signed revocation.
    Jwk,
    /// Reference the account URL; used for everything after account setup.
    Kid,
}

/// JWS payload and nonce handling for requests to the API.
///
/// Setup is:
///
/// 1. `Transport::new()`
/// 2. `call_jwk()` against the newAccount url
/// 3. `set_key_id()` from the returned `Location` header
/// 4. `call_kid()`/`post_as_get()` for all calls after that
///
/// The account key sits behind a lock so a key rollover becomes visible to
/// every handle cloned from the same account. The lock is never held across
/// an await.
#[derive(Clone)]
pub(crate) struct Transport {
    http: reqwest::Client,
    key: Arc<RwLock<AccountKey>>,
    key_id: Option<String>,
    nonce_pool: Arc<NoncePool>,
}

impl Transport {
    pub fn new(http: reqwest::Client, nonce_pool: Arc<NoncePool>, key: AccountKey) -> Self {
        Transport {
            http,
            key: Arc::new(RwLock::new(key)),
            key_id: None,
            nonce_pool,
        }
    }

    /// Update the key ID once it is known (part of setting up the transport).
    pub fn set_key_id(&mut self, kid: String) {
        self.key_id = Some(kid);
    }

    /// The account URL. Only present once `set_key_id` has been called.
    pub fn key_id(&self) -> &str {
        self.key_id.as_deref().unwrap_or_default()
    }

    /// A snapshot of the key currently used for signing.
    pub fn key(&self) -> AccountKey {
        self.key.read().clone()
    }

    /// Swap the signing key in place after a successful rollover.
    pub fn replace_key(&self, new_key: AccountKey) {
        *self.key.write() = new_key;
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Make a call using the full JWK.
    ///
    /// Only needed for newAccount and certificate-key revocation.
    pub async fn call_jwk<T>(&self, url: &str, body: &T) -> Result<reqwest::Response>
    where
        T: Serialize + ?Sized,
    {
        self.do_call(url, Some(body), HeaderKind::Jwk).await
    }

    /// Make a call using the key ID.
    pub async fn call_kid<T>(&self, url: &str, body: &T) -> Result<reqwest::Response>
    where
        T: Serialize + ?Sized,
    {
        self.do_call(url, Some(body), HeaderKind::Kid).await
    }

    /// POST-as-GET: a kid-signed request with an empty payload.
    ///
    /// See [RFC 8555 §6.3](https://datatracker.ietf.org/doc/html/rfc8555#section-6.3).
    pub async fn post_as_get(&self, url: &str) -> Result<reqwest::Response> {
        self.do_call::<()>(url, None, HeaderKind::Kid).await
    }

    async fn do_call<T>(
        &self,
        url: &str,
        payload: Option<&T>,
        kind: HeaderKind,
    ) -> Result<reqwest::Response>
    where
        T: Serialize + ?Sized,
    {
        // A badNonce rejection gets exactly one local retry, signed with the
        // nonce the rejection itself carried. A second rejection is surfaced.
        let mut retried = false;

        loop {
            // Either reuse a pooled nonce or fetch a fresh one.
            let nonce = self.nonce_pool.get_nonce(&self.http).await?;

            let body = {
                let key = self.key.read().clone();
                let protected = match kind {
                    HeaderKind::Jwk => {
                        ProtectedHeader::new_jwk(key.algorithm(), key.public_jwk(), url, Some(nonce))
                    }
                    HeaderKind::Kid => {
                        ProtectedHeader::new_kid(key.algorithm(), self.key_id(), url, nonce)
                    }
                };
                jws::sign(&key, protected, payload)?.to_body()?
            };

            log::debug!("call endpoint: {url}");
            let response = req_post(&self.http, url, body).await?;

            // Regardless of the request being a success or not, there might be
            // a nonce in the response.
            self.nonce_pool.extract_nonce(response.headers());

            match req_handle_error(response).await {
                Err(Error::Api(problem)) if problem.is_bad_nonce() => {
                    if retried {
                        return Err(Error::BadNonceExhausted);
                    }
                    log::debug!("retrying once on bad nonce");
                    // Everything issued before the rejection may be stale too.
                    self.nonce_pool.keep_latest();
                    retried = true;
                }
                other => return other,
            }
        }
    }
}

/// Shared pool of single-use `Replay-Nonce` values.
#[derive(Debug)]
pub(crate) struct NoncePool {
    nonce_url: String,
    pool: Mutex<VecDeque<String>>,
}

impl NoncePool {
    pub fn new(nonce_url: &str) -> Self {
        NoncePool {
            nonce_url: nonce_url.to_owned(),
            pool: Mutex::new(VecDeque::new()),
        }
    }

    pub fn extract_nonce(&self, headers: &HeaderMap) {
        if let Some(nonce) = headers
            .get("replay-nonce")
            .and_then(|value| value.to_str().ok())
        {
            log::trace!("stashing replay nonce");

            let mut pool = self.pool.lock();
            pool.push_back(nonce.to_owned());

            if pool.len() > 10 {
                pool.pop_front();
            }
        }
    }

    /// Drop all but the most recently stashed nonce.
    pub fn keep_latest(&self) {
        let mut pool = self.pool.lock();
        if pool.len() > 1 {
            let latest = pool.pop_back();
            pool.clear();
            pool.extend(latest);
        }
    }

    /// Take a nonce, issuing a HEAD against newNonce only when the pool is
    /// empty. This is the only request the library makes on its own accord.
    pub async fn get_nonce(&self, http: &reqwest::Client) -> Result<String> {
        {
            let mut pool = self.pool.lock();
            if let Some(nonce) = pool.pop_front() {
                log::trace!("using pooled nonce");
                return Ok(nonce);
            }
        }

        log::debug!("requesting fresh nonce");
        let res = req_head(http, &self.nonce_url).await?;
        req_expect_header(&res, "replay-nonce")
    }
}
