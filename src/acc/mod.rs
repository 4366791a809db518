use std::sync::Arc;

use serde_json::json;

use crate::{
    api,
    dir::Directory,
    error::Result,
    jws::{self, ProtectedHeader},
    key::{AccountKey, SigningAlgorithm},
    order::OrderBuilder,
    req::req_expect_header,
    trans::Transport,
    util::{base64url, read_json},
};

#[derive(Clone)]
pub(crate) struct AccountInner {
    pub transport: Transport,
    pub api_account: api::Account,
    pub api_directory: api::Directory,
}

/// Account with an ACME provider.
///
/// Accounts are created through [`Directory::new_account()`] and consist of
/// contact URIs plus the private key that signs every request made on the
/// account's behalf. After creation the account is identified by its account
/// URL (`kid`); the key itself never leaves the client.
///
/// Cloning is cheap and clones share state: a [key rollover] performed
/// through any clone is picked up by all of them, as well as by orders and
/// authorizations already in flight.
///
/// [`Directory::new_account()`]: crate::Directory::new_account()
/// [key rollover]: Account::change_key()
#[derive(Clone)]
pub struct Account {
    inner: Arc<AccountInner>,
}

impl Account {
    pub(crate) fn new(
        transport: Transport,
        api_account: api::Account,
        api_directory: api::Directory,
    ) -> Self {
        Self {
            inner: Arc::new(AccountInner {
                transport,
                api_account,
                api_directory,
            }),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<AccountInner> {
        &self.inner
    }

    /// The account URL, used as the `kid` of every post-account request.
    pub fn kid(&self) -> &str {
        self.inner.transport.key_id()
    }

    /// The account's private key as unencrypted PKCS#8 PEM.
    ///
    /// Write this somewhere safe and pass it to
    /// [`AccountBuilder::key()`] next time instead of registering again.
    pub fn private_key_pem(&self) -> Result<zeroize::Zeroizing<String>> {
        Ok(self.inner.transport.key().to_pkcs8_pem()?)
    }

    /// Create a new order to issue a certificate for this account.
    ///
    /// Identifiers are added on the returned builder. The ACME provider
    /// limits how many names fit in one order; Let's Encrypt allows 100.
    pub fn new_order(&self) -> OrderBuilder {
        OrderBuilder::new(self.clone())
    }

    /// Replace the account's contact URIs.
    pub async fn update_contact(&self, contact: Vec<String>) -> Result<api::Account> {
        let res = self
            .inner
            .transport
            .call_kid(self.kid(), &json!({ "contact": contact }))
            .await?;
        read_json(res).await
    }

    /// Deactivate this account, consuming it.
    ///
    /// The server rejects any further request under this account's key, so
    /// outstanding orders become useless. There is no reactivation.
    pub async fn deactivate(self) -> Result<api::Account> {
        let res = self
            .inner
            .transport
            .call_kid(self.kid(), &json!({ "status": "deactivated" }))
            .await?;
        read_json(res).await
    }

    /// Roll the account over to `new_key`, keeping the `kid` unchanged.
    ///
    /// Sends the nested JWS of [RFC 8555 §7.3.5]: the inner JWS is signed by
    /// the new key (carrying its JWK and no nonce), names the same target
    /// URL, and wraps `{account, oldKey}`; the outer JWS is an ordinary
    /// kid-signed request under the old key. On success every handle sharing
    /// this account signs with the new key from then on.
    ///
    /// [RFC 8555 §7.3.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.3.5
    pub async fn change_key(&self, new_key: AccountKey) -> Result<()> {
        let url = &self.inner.api_directory.key_change;
        let old_key = self.inner.transport.key();

        let payload = api::KeyChange {
            account: self.kid().to_owned(),
            old_key: old_key.public_jwk(),
        };

        // The inner JWS omits the nonce; its url must equal the outer url.
        let inner_protected =
            ProtectedHeader::new_jwk(new_key.algorithm(), new_key.public_jwk(), url, None);
        let inner = jws::sign(&new_key, inner_protected, Some(&payload))?;

        self.inner.transport.call_kid(url, &inner).await?;
        self.inner.transport.replace_key(new_key);

        log::debug!("account key rolled over, kid unchanged");
        Ok(())
    }

    /// Revoke a certificate under this account for the reason given.
    pub async fn revoke_certificate(
        &self,
        cert_der: &[u8],
        reason: Option<RevocationReason>,
    ) -> Result<()> {
        let revocation =
            api::Revocation::new(base64url(cert_der), reason.and_then(RevocationReason::code));

        let url = &self.inner.api_directory.revoke_cert;
        self.inner.transport.call_kid(url, &revocation).await?;

        Ok(())
    }

    /// Returns a reference to the account's API object.
    ///
    /// Useful for debugging.
    pub fn api_account(&self) -> &api::Account {
        &self.inner.api_account
    }
}

/// Builder for a newAccount request.
///
/// Obtained from [`Directory::new_account()`]. Without an explicit key a
/// fresh one is generated for the configured [`algorithm`] (ES256 by
/// default).
///
/// [`Directory::new_account()`]: crate::Directory::new_account()
/// [`algorithm`]: AccountBuilder::algorithm()
pub struct AccountBuilder {
    directory: Directory,
    key: Option<AccountKey>,
    algorithm: SigningAlgorithm,
    contact: Option<Vec<String>>,
    terms_of_service_agreed: bool,
    only_return_existing: bool,
}

impl AccountBuilder {
    pub(crate) fn new(directory: Directory) -> Self {
        AccountBuilder {
            directory,
            key: None,
            algorithm: SigningAlgorithm::Es256,
            contact: None,
            terms_of_service_agreed: false,
            only_return_existing: false,
        }
    }

    /// Use an existing account key instead of generating one.
    pub fn key(mut self, key: AccountKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Algorithm for the generated key. Ignored when a key is supplied.
    pub fn algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Contact URIs the server may use for expiry mails and the like, e.g.
    /// `mailto:admin@example.com`.
    pub fn contact(mut self, contact: Vec<String>) -> Self {
        self.contact = Some(contact);
        self
    }

    /// Indicate agreement with the provider's terms of service. Most public
    /// CAs refuse registration without it.
    pub fn terms_of_service_agreed(mut self, agreed: bool) -> Self {
        self.terms_of_service_agreed = agreed;
        self
    }

    /// Only look up the account registered for the key; never create one.
    pub fn only_return_existing(mut self, only_existing: bool) -> Self {
        self.only_return_existing = only_existing;
        self
    }

    /// POST the newAccount request.
    ///
    /// The request is jwk-signed (there is no kid yet); the server's
    /// `Location` header becomes the account's kid. POSTing twice with the
    /// same key yields the same kid.
    pub async fn build(self) -> Result<Account> {
        let key = match self.key {
            Some(key) => key,
            None => AccountKey::generate(self.algorithm)?,
        };

        let payload = api::Account {
            contact: self.contact,
            terms_of_service_agreed: Some(self.terms_of_service_agreed),
            only_return_existing: self.only_return_existing.then_some(true),
            ..Default::default()
        };

        let mut transport = Transport::new(
            self.directory.http().clone(),
            Arc::clone(self.directory.nonce_pool()),
            key,
        );

        let res = transport
            .call_jwk(&self.directory.api_directory().new_account, &payload)
            .await?;

        let kid = req_expect_header(&res, "location")?;
        log::debug!("account key ID: {kid}");
        let api_account: api::Account = read_json(res).await?;

        transport.set_key_id(kid);

        Ok(Account::new(
            transport,
            api_account,
            self.directory.api_directory().clone(),
        ))
    }
}

/// Enumeration of reasons for revocation.
///
/// The reason codes are taken from [RFC 5280 §5.3.1].
///
/// [RFC 5280 §5.3.1]: https://tools.ietf.org/html/rfc5280#section-5.3.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationReason {
    Unspecified = 0,
    KeyCompromise = 1,
    CaCompromise = 2,
    AffiliationChanged = 3,
    Superseded = 4,
    CessationOfOperation = 5,
    CertificateHold = 6,
    // value 7 is not used
    RemoveFromCrl = 8,
    PrivilegeWithdrawn = 9,
    AaCompromise = 10,
}

impl RevocationReason {
    // > the reason code CRL entry extension SHOULD be absent instead of
    // > using the unspecified (0) reasonCode value
    // see <https://datatracker.ietf.org/doc/html/rfc5280#section-5.3.1>
    pub(crate) fn code(self) -> Option<usize> {
        match self {
            RevocationReason::Unspecified => None,
            reason => Some(reason as usize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test::with_directory_server, DirectoryUrl};

    async fn test_account(dir_url: &str) -> Account {
        let dir = Directory::fetch(DirectoryUrl::Other(dir_url)).await.unwrap();
        dir.new_account()
            .contact(vec!["mailto:foo@bar.com".to_owned()])
            .terms_of_service_agreed(true)
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn update_contact_round_trips() {
        let server = with_directory_server();
        let account = test_account(&server.dir_url).await;

        let updated = account
            .update_contact(vec!["mailto:new@bar.com".to_owned()])
            .await
            .unwrap();

        assert_eq!(
            updated.contact,
            Some(vec!["mailto:new@bar.com".to_owned()])
        );
    }

    #[tokio::test]
    async fn deactivate_flips_status() {
        let server = with_directory_server();
        let account = test_account(&server.dir_url).await;

        let deactivated = account.deactivate().await.unwrap();
        assert!(deactivated.is_status_deactivated());
    }

    #[tokio::test]
    async fn key_rollover_signs_nested_jws() {
        let server = with_directory_server();
        let account = test_account(&server.dir_url).await;
        let kid = account.kid().to_owned();

        let new_key = AccountKey::from_pkcs8_pem(crate::test::EC_PEM).unwrap();
        account.change_key(new_key).await.unwrap();

        let state = server.state.lock().unwrap();

        // outer JWS: old key, kid-signed, against keyChange
        let outer = state.protected_log.last().unwrap();
        assert!(outer.url.ends_with("/acme/key-change"));
        assert_eq!(outer.kid.as_deref(), Some(kid.as_str()));

        // inner JWS: new key's jwk, no nonce, same url as the outer
        let inner = state.key_change_inners.last().unwrap();
        assert!(inner.has_jwk);
        assert!(inner.kid.is_none());
        assert!(inner.nonce.is_none());
        assert_eq!(inner.url, outer.url);

        let payload = state.key_change_payloads.last().unwrap();
        assert_eq!(payload["account"], kid.as_str());
        assert!(payload["oldKey"].is_object());
    }

    #[tokio::test]
    async fn requests_after_rollover_use_the_new_key() {
        let server = with_directory_server();

        // start from an RSA account key, roll to P-256
        let dir = Directory::fetch(DirectoryUrl::Other(&server.dir_url))
            .await
            .unwrap();
        let account = dir
            .new_account()
            .key(AccountKey::from_pkcs8_pem(crate::test::RSA_PEM).unwrap())
            .terms_of_service_agreed(true)
            .build()
            .await
            .unwrap();
        let kid = account.kid().to_owned();

        let order = account
            .new_order()
            .add_dns_identifier("rollover.example.com")
            .build()
            .await
            .unwrap();

        let new_key = AccountKey::from_pkcs8_pem(crate::test::EC_PEM).unwrap();
        account.change_key(new_key).await.unwrap();

        let mut order = order;
        order.refresh().await.unwrap();

        let state = server.state.lock().unwrap();
        let refresh = state.protected_log.last().unwrap();
        assert_eq!(refresh.alg, "ES256");
        assert_eq!(refresh.kid.as_deref(), Some(kid.as_str()));
    }

    #[tokio::test]
    async fn revocation_is_kid_signed() {
        let server = with_directory_server();
        let account = test_account(&server.dir_url).await;

        account
            .revoke_certificate(b"not-a-real-der", Some(RevocationReason::Superseded))
            .await
            .unwrap();

        let state = server.state.lock().unwrap();
        let last = state.protected_log.last().unwrap();
        assert!(last.url.ends_with("/acme/revoke-cert"));
        assert!(last.kid.is_some());
        assert!(!last.has_jwk);
    }

    #[test]
    fn unspecified_reason_is_omitted() {
        assert_eq!(RevocationReason::Unspecified.code(), None);
        assert_eq!(RevocationReason::KeyCompromise.code(), Some(1));
        assert_eq!(RevocationReason::AaCompromise.code(), Some(10));
    }
}
