//! Order life cycle.
//!
//! The order state machine is server-driven; the client only observes it
//! through POST-as-GET refreshes:
//!
//! ```text
//!           pending ──(all authz valid)──► ready
//!              │                             │
//!              ▼                             ▼ (finalize)
//!           invalid ◄──(any authz invalid)  processing ──► valid
//!                                            │
//!                                            └─► invalid
//! ```
//!
//! An [`Order`] is created through [`Account::new_order()`], its
//! authorizations are satisfied via [`Auth`]/[`Challenge`], and once `ready`
//! it is finalized with a CSR and the certificate chain downloaded.
//!
//! [`Account::new_order()`]: crate::Account::new_order()

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, time::Instant};

use crate::{
    acc::{Account, AccountInner},
    api,
    cert::Certificate,
    error::{Error, Result},
    req::{req_expect_header, req_link_alternates, req_retry_after},
    util::{base64url, read_json},
};

mod auth;

pub use self::auth::{Auth, Challenge, Dns, Http, TlsAlpn};

/// Polling discipline for the server-driven state transitions.
///
/// Carries the poll interval, an optional deadline and an optional
/// cancellation signal. A server-supplied `Retry-After` (delta-seconds form)
/// is authoritative and overrides the interval for that wait.
///
/// The library never times out on its own: without a deadline, polling
/// continues until the watched resource reaches a terminal state.
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Default for Poller {
    fn default() -> Self {
        Poller::new(Duration::from_secs(5))
    }
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Poller {
            interval,
            deadline: None,
            cancel: None,
        }
    }

    /// Give up with [`Error::Timeout`] once `budget` has elapsed.
    pub fn with_deadline(mut self, budget: Duration) -> Self {
        self.deadline = Some(Instant::now() + budget);
        self
    }

    /// Abort with [`Error::Cancelled`] when the sender flips the signal to
    /// `true`. In-flight HTTP is dropped, server-side state is not rolled
    /// back.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Sleep until the next poll is due.
    pub(crate) async fn wait(&mut self, retry_after: Option<Duration>) -> Result<()> {
        if let Some(cancel) = &self.cancel {
            if *cancel.borrow() {
                return Err(Error::Cancelled);
            }
        }

        let mut delay = retry_after.unwrap_or(self.interval);
        if let Some(deadline) = self.deadline {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            delay = delay.min(deadline - now);
        }

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        let Some(cancel) = &mut self.cancel else {
            sleep.await;
            return Ok(());
        };

        loop {
            tokio::select! {
                () = &mut sleep => return Ok(()),
                changed = cancel.changed() => match changed {
                    Ok(()) if *cancel.borrow() => return Err(Error::Cancelled),
                    // toggled back off; keep waiting
                    Ok(()) => {}
                    // sender dropped: no cancellation can arrive anymore
                    Err(_) => {
                        (&mut sleep).await;
                        return Ok(());
                    }
                },
            }
        }
    }
}

/// Builder for a newOrder request, obtained from
/// [`Account::new_order()`](crate::Account::new_order()).
pub struct OrderBuilder {
    account: Account,
    identifiers: Vec<api::Identifier>,
    not_before: Option<String>,
    not_after: Option<String>,
}

impl OrderBuilder {
    pub(crate) fn new(account: Account) -> Self {
        OrderBuilder {
            account,
            identifiers: Vec::new(),
            not_before: None,
            not_after: None,
        }
    }

    /// Add a DNS identifier, which may be a wildcard name like
    /// `*.example.com`. Duplicates are dropped at build time.
    pub fn add_dns_identifier(mut self, fqdn: impl Into<String>) -> Self {
        let fqdn = fqdn.into();
        self.identifiers.push(api::Identifier::dns(&fqdn));
        self
    }

    pub fn set_identifiers(mut self, identifiers: Vec<api::Identifier>) -> Self {
        self.identifiers = identifiers;
        self
    }

    /// Requested `notBefore` certificate field, RFC 3339 format.
    pub fn not_before(mut self, not_before: impl Into<String>) -> Self {
        self.not_before = Some(not_before.into());
        self
    }

    /// Requested `notAfter` certificate field, RFC 3339 format.
    pub fn not_after(mut self, not_after: impl Into<String>) -> Self {
        self.not_after = Some(not_after.into());
        self
    }

    /// POST the newOrder request.
    ///
    /// The `Location` header of the response becomes the order URL. Servers
    /// deduplicate: an identical identifier set within the replay window
    /// yields the same order URL, so creation is effectively idempotent.
    pub async fn build(self) -> Result<Order> {
        let mut identifiers: Vec<api::Identifier> = Vec::new();
        for identifier in self.identifiers {
            if !identifiers.contains(&identifier) {
                identifiers.push(identifier);
            }
        }

        let payload = api::NewOrder {
            identifiers,
            not_before: self.not_before,
            not_after: self.not_after,
        };

        let inner = self.account.inner();
        let url = &inner.api_directory.new_order;
        let res = inner.transport.call_kid(url, &payload).await?;

        let order_url = req_expect_header(&res, "location")?;
        let api_order: api::Order = read_json(res).await?;

        Ok(Order {
            acc: Arc::clone(inner),
            api_order,
            url: order_url,
            retry_after: None,
        })
    }
}

/// A certificate order and the client's view of its server-side state.
///
/// The state advances only on the server; [`refresh`](Order::refresh) and the
/// polling helpers update this view. Authorizations are referenced by URL and
/// fetched lazily through [`authorizations`](Order::authorizations).
pub struct Order {
    acc: Arc<AccountInner>,
    api_order: api::Order,
    url: String,
    retry_after: Option<Duration>,
}

impl Order {
    /// The order URL. This plus the account is enough to resume work on an
    /// order later; everything else is re-fetchable.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The last observed status. A freshly deserialized order without one
    /// counts as `pending`.
    pub fn status(&self) -> api::OrderStatus {
        self.api_order.status.unwrap_or(api::OrderStatus::Pending)
    }

    /// Returns a reference to the order's API object.
    ///
    /// Useful for debugging.
    pub fn api_order(&self) -> &api::Order {
        &self.api_order
    }

    /// Update the client's view of the order (POST-as-GET).
    pub async fn refresh(&mut self) -> Result<()> {
        let res = self.acc.transport.post_as_get(&self.url).await?;
        self.retry_after = req_retry_after(res.headers());
        self.api_order = read_json(res).await?;
        Ok(())
    }

    /// Fetch the authorizations the order references.
    ///
    /// One per identifier. Authorizations the account passed recently may
    /// already be `valid`; check [`Auth::need_challenge`].
    pub async fn authorizations(&self) -> Result<Vec<Auth>> {
        let mut result = Vec::new();

        if let Some(authorizations) = &self.api_order.authorizations {
            for auth_url in authorizations {
                let res = self.acc.transport.post_as_get(auth_url).await?;
                let api_auth: api::Authorization = read_json(res).await?;
                result.push(Auth::new(&self.acc, api_auth, auth_url));
            }
        }

        Ok(result)
    }

    /// Poll until the order leaves `pending`, i.e. becomes `ready` once all
    /// authorizations are valid (or `invalid` if one fails).
    pub async fn poll_ready(mut self, mut poller: Poller) -> Result<Order> {
        while self.status() == api::OrderStatus::Pending {
            poller.wait(self.retry_after.take()).await?;
            self.refresh().await?;
        }
        Ok(self)
    }

    /// Poll until the order reaches a terminal state (`valid` or `invalid`).
    pub async fn poll_done(mut self, mut poller: Poller) -> Result<Order> {
        while !matches!(
            self.status(),
            api::OrderStatus::Valid | api::OrderStatus::Invalid
        ) {
            poller.wait(self.retry_after.take()).await?;
            self.refresh().await?;
        }
        Ok(self)
    }

    /// Finalize the order by submitting a DER-encoded CSR, then poll until
    /// issuance concludes.
    ///
    /// Only permitted while the order is `ready`; anything else is a
    /// [`Error::StateViolation`]. Some servers keep reporting `pending` for a
    /// short window after accepting the CSR, so polling continues through
    /// non-terminal states until the poller's budget runs out.
    ///
    /// The returned order is `valid` (certificate URL populated) or
    /// `invalid` (inspect [`api::Order::error`]).
    pub async fn finalize(mut self, csr_der: &[u8], mut poller: Poller) -> Result<Order> {
        let actual = self.status();
        if actual != api::OrderStatus::Ready {
            return Err(Error::StateViolation {
                expected: api::OrderStatus::Ready,
                actual,
            });
        }

        let finalize = api::Finalize::new(base64url(csr_der));
        let finalize_url = self.api_order.finalize.clone();

        // An invalid CSR bombs out here with the server's problem document.
        self.acc.transport.call_kid(&finalize_url, &finalize).await?;

        self.refresh().await?;
        while !matches!(
            self.status(),
            api::OrderStatus::Valid | api::OrderStatus::Invalid
        ) {
            poller.wait(self.retry_after.take()).await?;
            self.refresh().await?;
        }

        Ok(self)
    }

    /// Download the issued certificate chain.
    ///
    /// Alternate chains advertised via `Link: rel="alternate"` are listed on
    /// the returned [`Certificate`].
    pub async fn download_cert(&self) -> Result<Certificate> {
        let url = self.api_order.certificate.clone().ok_or(Error::StateViolation {
            expected: api::OrderStatus::Valid,
            actual: self.status(),
        })?;
        self.download_cert_from(&url).await
    }

    /// Download one of the alternate chains enumerated by
    /// [`Certificate::alternate_urls`].
    pub async fn download_alternate_cert(&self, url: &str) -> Result<Certificate> {
        self.download_cert_from(url).await
    }

    async fn download_cert_from(&self, url: &str) -> Result<Certificate> {
        let res = self.acc.transport.post_as_get(url).await?;
        let alternates = req_link_alternates(res.headers());
        let pem = res.text().await?;
        Ok(Certificate::new(pem, alternates))
    }
}

#[cfg(test)]
mod tests {
    use der::Encode as _;

    use super::*;
    use crate::{
        cert::{create_csr, create_p256_key},
        challenge,
        test::with_directory_server,
        Directory, DirectoryUrl,
    };

    async fn test_account(dir_url: &str) -> Account {
        let dir = Directory::fetch(DirectoryUrl::Other(dir_url)).await.unwrap();
        dir.new_account()
            .contact(vec!["mailto:foo@bar.com".to_owned()])
            .terms_of_service_agreed(true)
            .build()
            .await
            .unwrap()
    }

    fn fast_poller() -> Poller {
        Poller::new(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn http01_happy_path_issues_a_certificate() {
        let server = with_directory_server();
        let account = test_account(&server.dir_url).await;

        let order = account
            .new_order()
            .add_dns_identifier("example.com")
            .build()
            .await
            .unwrap();
        assert_eq!(order.status(), api::OrderStatus::Pending);

        for auth in order.authorizations().await.unwrap() {
            let challenge = auth.http_challenge().unwrap();
            assert!(challenge.need_validate());

            // what a provisioner would publish
            let proof = challenge.http_proof().unwrap();
            let thumbprint = account.inner().transport.key().thumbprint().unwrap();
            assert_eq!(
                proof,
                format!("{}.{thumbprint}", challenge.http_token())
            );

            challenge.answer().await.unwrap();
            let challenge = challenge.poll_done(fast_poller()).await.unwrap();
            assert_eq!(
                challenge.api_challenge().status,
                api::ChallengeStatus::Valid
            );

            let auth = auth.poll_done(fast_poller()).await.unwrap();
            assert_eq!(
                auth.api_auth().status,
                api::AuthorizationStatus::Valid
            );
        }

        let order = order.poll_ready(fast_poller()).await.unwrap();
        assert_eq!(order.status(), api::OrderStatus::Ready);

        let key = create_p256_key();
        let csr = create_csr(&key, &["example.com"]).unwrap();
        let order = order
            .finalize(&csr.to_der().unwrap(), fast_poller())
            .await
            .unwrap();

        assert_eq!(order.status(), api::OrderStatus::Valid);
        assert!(order.api_order().certificate.is_some());

        let cert = order.download_cert().await.unwrap();
        assert!(cert.pem().contains("BEGIN CERTIFICATE"));
        assert_eq!(cert.der_chain().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn wildcard_orders_offer_dns01_only() {
        let server = with_directory_server();
        let account = test_account(&server.dir_url).await;

        let order = account
            .new_order()
            .add_dns_identifier("*.example.com")
            .add_dns_identifier("www.example.com")
            .build()
            .await
            .unwrap();

        let auths = order.authorizations().await.unwrap();
        assert_eq!(auths.len(), 2);

        let wildcard = auths.iter().find(|a| a.is_wildcard()).unwrap();
        assert_eq!(wildcard.domain_name(), "example.com");
        assert!(wildcard.dns_challenge().is_some());
        assert!(wildcard.http_challenge().is_none());
        assert!(wildcard.tls_alpn_challenge().is_none());

        let chall = wildcard.dns_challenge().unwrap();
        let key = account.inner().transport.key();
        assert_eq!(
            chall.dns_record_name(),
            "_acme-challenge.example.com"
        );
        assert_eq!(
            chall.dns_proof().unwrap(),
            challenge::dns01_txt_value(chall.api_challenge().token.as_str(), &key).unwrap()
        );

        // the plain name still gets the full menu
        let plain = auths.iter().find(|a| !a.is_wildcard()).unwrap();
        assert!(plain.http_challenge().is_some());
        assert!(plain.dns_challenge().is_some());
        assert!(plain.tls_alpn_challenge().is_some());
    }

    #[tokio::test]
    async fn duplicate_orders_return_the_same_url() {
        let server = with_directory_server();
        let account = test_account(&server.dir_url).await;

        let first = account
            .new_order()
            .add_dns_identifier("dup.example.com")
            .build()
            .await
            .unwrap();
        let second = account
            .new_order()
            .add_dns_identifier("dup.example.com")
            .build()
            .await
            .unwrap();

        assert_eq!(first.url(), second.url());
    }

    #[tokio::test]
    async fn finalize_before_ready_is_a_state_violation() {
        let server = with_directory_server();
        let account = test_account(&server.dir_url).await;

        let order = account
            .new_order()
            .add_dns_identifier("pending.example.com")
            .build()
            .await
            .unwrap();
        assert_eq!(order.status(), api::OrderStatus::Pending);

        let err = order.finalize(b"fake-csr", fast_poller()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::StateViolation {
                expected: api::OrderStatus::Ready,
                actual: api::OrderStatus::Pending,
            }
        ));
    }

    #[tokio::test]
    async fn rejected_authorization_invalidates_the_order() {
        let server = with_directory_server();
        let account = test_account(&server.dir_url).await;

        let order = account
            .new_order()
            .add_dns_identifier("forbidden.example.com")
            .build()
            .await
            .unwrap();

        for auth in order.authorizations().await.unwrap() {
            let challenge = auth.http_challenge().unwrap();
            challenge.answer().await.unwrap();

            let auth = auth.poll_done(fast_poller()).await.unwrap();
            assert_eq!(
                auth.api_auth().status,
                api::AuthorizationStatus::Invalid
            );
        }

        let mut order = order;
        order.refresh().await.unwrap();
        assert_eq!(order.status(), api::OrderStatus::Invalid);

        let err = order.finalize(b"fake-csr", fast_poller()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::StateViolation {
                expected: api::OrderStatus::Ready,
                actual: api::OrderStatus::Invalid,
            }
        ));
    }

    #[tokio::test]
    async fn alternate_chains_are_enumerated_and_fetchable() {
        let server = with_directory_server();
        let account = test_account(&server.dir_url).await;

        let order = account
            .new_order()
            .add_dns_identifier("alt.example.com")
            .build()
            .await
            .unwrap();

        for auth in order.authorizations().await.unwrap() {
            let challenge = auth.http_challenge().unwrap();
            challenge.answer().await.unwrap();
            auth.poll_done(fast_poller()).await.unwrap();
        }

        let order = order.poll_ready(fast_poller()).await.unwrap();
        let key = create_p256_key();
        let csr = create_csr(&key, &["alt.example.com"]).unwrap();
        let order = order
            .finalize(&csr.to_der().unwrap(), fast_poller())
            .await
            .unwrap();

        let cert = order.download_cert().await.unwrap();
        assert_eq!(cert.alternate_urls().len(), 1);

        let alternate = order
            .download_alternate_cert(&cert.alternate_urls()[0])
            .await
            .unwrap();
        assert!(alternate.pem().contains("BEGIN CERTIFICATE"));
        assert_ne!(alternate.pem(), cert.pem());
    }

    #[tokio::test]
    async fn deadline_elapsing_surfaces_timeout() {
        let server = with_directory_server();
        let account = test_account(&server.dir_url).await;

        // no challenge is ever answered, so the order stays pending
        let order = account
            .new_order()
            .add_dns_identifier("stuck.example.com")
            .build()
            .await
            .unwrap();

        let poller = Poller::new(Duration::from_millis(5))
            .with_deadline(Duration::from_millis(40));
        let err = order.poll_ready(poller).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test]
    async fn cancellation_signal_aborts_polling() {
        let server = with_directory_server();
        let account = test_account(&server.dir_url).await;

        let order = account
            .new_order()
            .add_dns_identifier("cancelled.example.com")
            .build()
            .await
            .unwrap();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = cancel_tx.send(true);
        });

        let poller = Poller::new(Duration::from_secs(30)).with_cancel(cancel_rx);
        let err = order.poll_ready(poller).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn retry_after_overrides_the_poll_interval() {
        let server = with_directory_server();
        let account = test_account(&server.dir_url).await;
        {
            let mut state = server.state.lock().unwrap();
            state.retry_after = Some(1);
            // keep the order pending for one extra poll so the Retry-After
            // actually gets honored between two refreshes
            state.authz_polls_until_valid = 2;
        }

        let order = account
            .new_order()
            .add_dns_identifier("slow.example.com")
            .build()
            .await
            .unwrap();

        for auth in order.authorizations().await.unwrap() {
            auth.http_challenge().unwrap().answer().await.unwrap();
        }

        // the first refresh observes Retry-After: 1 and must wait that long
        // before the next poll even though the interval is 5ms
        let started = std::time::Instant::now();
        let order = order.poll_ready(fast_poller()).await.unwrap();
        assert_eq!(order.status(), api::OrderStatus::Ready);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }
}
