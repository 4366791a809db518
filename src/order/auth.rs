use std::{marker::PhantomData, sync::Arc, time::Duration};

use serde_json::json;

use crate::{
    acc::AccountInner,
    api, challenge,
    error::Result,
    order::Poller,
    req::req_retry_after,
    util::read_json,
};

/// An authorization (ownership proof) for one identifier of an order.
///
/// Every authorization must be progressed to `valid` before the order
/// becomes `ready`. Authorizations the account satisfied recently may
/// already be valid on arrival; the server decides.
///
/// The proof is provided through one of the challenges: a token served over
/// [HTTP], a `TXT` [DNS] record, or a special certificate on a [TLS]
/// listener.
///
/// [HTTP]: Auth::http_challenge()
/// [DNS]: Auth::dns_challenge()
/// [TLS]: Auth::tls_alpn_challenge()
pub struct Auth {
    inner: Arc<AccountInner>,
    api_auth: api::Authorization,
    url: String,
    retry_after: Option<Duration>,
}

impl Auth {
    pub(crate) fn new(inner: &Arc<AccountInner>, api_auth: api::Authorization, url: &str) -> Self {
        Auth {
            inner: Arc::clone(inner),
            api_auth,
            url: url.to_owned(),
            retry_after: None,
        }
    }

    /// Domain name this authorization covers.
    ///
    /// For a wildcard authorization this is the name beneath the `*.` label;
    /// check [`is_wildcard`](Auth::is_wildcard).
    pub fn domain_name(&self) -> &str {
        &self.api_auth.identifier.value
    }

    /// Whether this authorization resulted from a wildcard identifier.
    ///
    /// Wildcard authorizations offer only the dns-01 challenge.
    pub fn is_wildcard(&self) -> bool {
        self.api_auth.is_wildcard()
    }

    /// Whether a challenge still needs to be completed. False when the
    /// account proved ownership of the identifier recently.
    pub fn need_challenge(&self) -> bool {
        !matches!(self.api_auth.status, api::AuthorizationStatus::Valid)
    }

    /// Get the `http-01` challenge, if offered.
    ///
    /// The proof must be served under:
    ///
    /// ```text
    /// http://<domain-to-be-proven>/.well-known/acme-challenge/<token>
    /// ```
    ///
    /// The challenge will be accessed over HTTP (not HTTPS), for obvious
    /// reasons.
    pub fn http_challenge(&self) -> Option<Challenge<Http>> {
        self.wrap_challenge(self.api_auth.http_challenge())
    }

    /// Get the `dns-01` challenge, if offered.
    ///
    /// The proof is a `TXT` record:
    ///
    /// ```text
    /// _acme-challenge.<domain-to-be-proven>.  TXT  <proof>
    /// ```
    ///
    /// The dns proof is not the same as the http proof.
    pub fn dns_challenge(&self) -> Option<Challenge<Dns>> {
        self.wrap_challenge(self.api_auth.dns_challenge())
    }

    /// Get the `tls-alpn-01` challenge, if offered.
    ///
    /// The proof is a self-signed certificate served on a TLS listener that
    /// negotiates the ALPN protocol `acme-tls/1`; see
    /// [`challenge::tls_alpn01_certificate`].
    pub fn tls_alpn_challenge(&self) -> Option<Challenge<TlsAlpn>> {
        self.wrap_challenge(self.api_auth.tls_alpn_challenge())
    }

    fn wrap_challenge<A>(&self, api_challenge: Option<&api::Challenge>) -> Option<Challenge<A>> {
        api_challenge.map(|api_challenge| Challenge {
            inner: Arc::clone(&self.inner),
            api_challenge: api_challenge.clone(),
            identifier: self.domain_name().to_owned(),
            retry_after: None,
            _ph: PhantomData,
        })
    }

    /// Update the client's view of the authorization (POST-as-GET).
    pub async fn refresh(&mut self) -> Result<()> {
        let res = self.inner.transport.post_as_get(&self.url).await?;
        self.retry_after = req_retry_after(res.headers());
        self.api_auth = read_json(res).await?;
        Ok(())
    }

    /// Poll until the authorization leaves `pending`.
    pub async fn poll_done(mut self, mut poller: Poller) -> Result<Auth> {
        while matches!(self.api_auth.status, api::AuthorizationStatus::Pending) {
            poller.wait(self.retry_after.take()).await?;
            self.refresh().await?;
        }
        Ok(self)
    }

    /// Relinquish this authorization so it can no longer be used, e.g. after
    /// losing control of the name.
    ///
    /// See [RFC 8555 §7.5.2](https://datatracker.ietf.org/doc/html/rfc8555#section-7.5.2).
    pub async fn deactivate(self) -> Result<api::Authorization> {
        let res = self
            .inner
            .transport
            .call_kid(&self.url, &json!({ "status": "deactivated" }))
            .await?;
        read_json(res).await
    }

    /// Returns a reference to the authorization's API object.
    ///
    /// Useful for debugging.
    pub fn api_auth(&self) -> &api::Authorization {
        &self.api_auth
    }
}

/// Marker type for HTTP challenges.
#[doc(hidden)]
pub struct Http;

/// Marker type for DNS challenges.
#[doc(hidden)]
pub struct Dns;

/// Marker type for TLS-ALPN challenges.
#[doc(hidden)]
pub struct TlsAlpn;

/// A DNS, HTTP, or TLS-ALPN challenge as obtained from the [`Auth`].
pub struct Challenge<A> {
    inner: Arc<AccountInner>,
    api_challenge: api::Challenge,
    identifier: String,
    retry_after: Option<Duration>,
    _ph: PhantomData<A>,
}

/// See [RFC 8555 §8.3](https://datatracker.ietf.org/doc/html/rfc8555#section-8.3).
impl Challenge<Http> {
    /// The token, used as the file name of the well-known resource.
    pub fn http_token(&self) -> &str {
        &self.api_challenge.token
    }

    /// Body of the well-known resource: the key authorization.
    pub fn http_proof(&self) -> Result<String> {
        challenge::http01_body(&self.api_challenge.token, &self.inner.transport.key())
    }
}

/// See [RFC 8555 §8.4](https://datatracker.ietf.org/doc/html/rfc8555#section-8.4).
impl Challenge<Dns> {
    /// Name of the TXT record to create.
    pub fn dns_record_name(&self) -> String {
        challenge::dns01_record_name(&self.identifier)
    }

    /// Value of the TXT record: the hashed key authorization.
    pub fn dns_proof(&self) -> Result<String> {
        challenge::dns01_txt_value(&self.api_challenge.token, &self.inner.transport.key())
    }
}

/// See [RFC 8737 §3](https://datatracker.ietf.org/doc/html/rfc8737#section-3).
impl Challenge<TlsAlpn> {
    /// SHA-256 of the key authorization, the payload of the certificate's
    /// acmeIdentifier extension.
    pub fn tls_alpn_proof(&self) -> Result<[u8; 32]> {
        use sha2::{Digest as _, Sha256};

        let key_auth = challenge::key_authorization(
            &self.api_challenge.token,
            &self.inner.transport.key(),
        )?;
        Ok(Sha256::digest(key_auth).into())
    }

    /// A ready-to-serve validation certificate with the proof embedded,
    /// returned as (certificate DER, PKCS#8 key DER).
    pub fn tls_alpn_certificate(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        challenge::tls_alpn01_certificate(
            &self.identifier,
            &self.api_challenge.token,
            &self.inner.transport.key(),
        )
    }
}

impl<A> Challenge<A> {
    /// Returns true if this challenge needs validation.
    ///
    /// It might already have been done in a previous order for the same
    /// account.
    pub fn need_validate(&self) -> bool {
        matches!(self.api_challenge.status, api::ChallengeStatus::Pending)
    }

    /// Tell the server the proof is in place (POST `{}`).
    ///
    /// The server transitions the challenge to `processing` and starts
    /// validating; follow up with [`poll_done`](Challenge::poll_done) or by
    /// polling the parent authorization.
    pub async fn answer(&self) -> Result<api::Challenge> {
        let res = self
            .inner
            .transport
            .call_kid(&self.api_challenge.url, &api::EmptyObject)
            .await?;
        read_json(res).await
    }

    /// Update the client's view of the challenge (POST-as-GET).
    pub async fn refresh(&mut self) -> Result<()> {
        let res = self
            .inner
            .transport
            .post_as_get(&self.api_challenge.url)
            .await?;
        self.retry_after = req_retry_after(res.headers());
        self.api_challenge = read_json(res).await?;
        Ok(())
    }

    /// Poll until the challenge reaches a terminal state.
    pub async fn poll_done(mut self, mut poller: Poller) -> Result<Challenge<A>> {
        while matches!(
            self.api_challenge.status,
            api::ChallengeStatus::Pending | api::ChallengeStatus::Processing
        ) {
            poller.wait(self.retry_after.take()).await?;
            self.refresh().await?;
        }
        Ok(self)
    }

    /// Returns a reference to the challenge's API object.
    ///
    /// Useful for debugging.
    pub fn api_challenge(&self) -> &api::Challenge {
        &self.api_challenge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test::with_directory_server, Directory, DirectoryUrl};

    #[tokio::test]
    async fn authorizations_offer_all_challenge_types() {
        let server = with_directory_server();
        let dir = Directory::fetch(DirectoryUrl::Other(&server.dir_url))
            .await
            .unwrap();
        let account = dir
            .new_account()
            .terms_of_service_agreed(true)
            .build()
            .await
            .unwrap();

        let order = account
            .new_order()
            .add_dns_identifier("chall.example.com")
            .build()
            .await
            .unwrap();

        let auths = order.authorizations().await.unwrap();
        assert_eq!(auths.len(), 1);
        let auth = &auths[0];
        assert!(auth.need_challenge());

        let http = auth.http_challenge().unwrap();
        assert!(http.need_validate());
        assert!(!http.http_token().is_empty());

        let dns = auth.dns_challenge().unwrap();
        assert!(dns.need_validate());
        assert_eq!(dns.dns_record_name(), "_acme-challenge.chall.example.com");

        let tls = auth.tls_alpn_challenge().unwrap();
        let proof = tls.tls_alpn_proof().unwrap();
        assert_eq!(proof.len(), 32);
    }

    #[tokio::test]
    async fn deactivated_authorization_reports_new_status() {
        let server = with_directory_server();
        let dir = Directory::fetch(DirectoryUrl::Other(&server.dir_url))
            .await
            .unwrap();
        let account = dir
            .new_account()
            .terms_of_service_agreed(true)
            .build()
            .await
            .unwrap();

        let order = account
            .new_order()
            .add_dns_identifier("gone.example.com")
            .build()
            .await
            .unwrap();

        let auths = order.authorizations().await.unwrap();
        let deactivated = auths.into_iter().next().unwrap().deactivate().await.unwrap();
        assert_eq!(
            deactivated.status,
            api::AuthorizationStatus::Deactivated
        );
    }
}
