use std::sync::Arc;

use crate::{
    acc::{AccountBuilder, RevocationReason},
    api,
    error::Result,
    key::AccountKey,
    req::{req_get, req_handle_error},
    trans::{NoncePool, Transport},
    util::{base64url, read_json},
    Account,
};

const LETSENCRYPT_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";
const LETSENCRYPT_STAGING_URL: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Enumeration of known ACME API directories.
#[derive(Debug, Clone)]
pub enum DirectoryUrl<'a> {
    /// The main Let's Encrypt directory.
    ///
    /// Not appropriate for testing / development.
    LetsEncrypt,

    /// The staging Let's Encrypt directory.
    ///
    /// Use for testing and development. Doesn't issue "valid" certificates.
    /// The root signing certificate is not supposed to be in any trust
    /// chains.
    LetsEncryptStaging,

    /// Provide an arbitrary directory URL to connect to.
    Other(&'a str),
}

impl DirectoryUrl<'_> {
    fn to_url(&self) -> &str {
        match self {
            DirectoryUrl::LetsEncrypt => LETSENCRYPT_URL,
            DirectoryUrl::LetsEncryptStaging => LETSENCRYPT_STAGING_URL,
            DirectoryUrl::Other(url) => url,
        }
    }
}

/// Entry point for accessing an ACME API.
///
/// Holds the service URL map, the shared HTTP client and the nonce pool all
/// accounts created from it will draw from.
#[derive(Clone)]
pub struct Directory {
    http: reqwest::Client,
    nonce_pool: Arc<NoncePool>,
    api_directory: api::Directory,
}

impl Directory {
    /// Fetch the directory object from `url` with a default HTTP client.
    pub async fn fetch(url: DirectoryUrl<'_>) -> Result<Directory> {
        Self::fetch_with_client(reqwest::Client::new(), url).await
    }

    /// Fetch the directory object using a caller-configured client, e.g. one
    /// with extra trust roots for a local test CA.
    pub async fn fetch_with_client(
        http: reqwest::Client,
        url: DirectoryUrl<'_>,
    ) -> Result<Directory> {
        let res = req_handle_error(req_get(&http, url.to_url()).await?).await?;
        let api_directory: api::Directory = read_json(res).await?;

        let nonce_pool = Arc::new(NoncePool::new(&api_directory.new_nonce));

        Ok(Directory {
            http,
            nonce_pool,
            api_directory,
        })
    }

    /// Start building a new (or existing, see
    /// [`only_return_existing`](AccountBuilder::only_return_existing))
    /// account registration.
    pub fn new_account(&self) -> AccountBuilder {
        AccountBuilder::new(self.clone())
    }

    /// Fetch the account previously registered for `key` without creating
    /// one.
    ///
    /// Fails with an `accountDoesNotExist` problem if the key is unknown to
    /// the server.
    pub async fn load_existing_account(&self, key: AccountKey) -> Result<Account> {
        self.new_account()
            .key(key)
            .only_return_existing(true)
            .build()
            .await
    }

    /// Revoke a certificate using the certificate's own key rather than an
    /// account key.
    ///
    /// The request is signed with `cert_key` and carries its JWK, as allowed
    /// by [RFC 8555 §7.6](https://datatracker.ietf.org/doc/html/rfc8555#section-7.6).
    pub async fn revoke_certificate_with_key(
        &self,
        cert_key: &AccountKey,
        cert_der: &[u8],
        reason: Option<RevocationReason>,
    ) -> Result<()> {
        let revocation =
            api::Revocation::new(base64url(cert_der), reason.and_then(RevocationReason::code));

        let transport = Transport::new(
            self.http.clone(),
            Arc::clone(&self.nonce_pool),
            cert_key.clone(),
        );
        transport
            .call_jwk(&self.api_directory.revoke_cert, &revocation)
            .await?;

        Ok(())
    }

    /// Returns a reference to the directory's API object.
    ///
    /// Useful for debugging.
    pub fn api_directory(&self) -> &api::Directory {
        &self.api_directory
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn nonce_pool(&self) -> &Arc<NoncePool> {
        &self.nonce_pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::with_directory_server;

    #[tokio::test]
    async fn test_fetch_directory() {
        let server = with_directory_server();

        let dir = Directory::fetch(DirectoryUrl::Other(&server.dir_url))
            .await
            .unwrap();

        let api = dir.api_directory();
        assert!(api.new_nonce.ends_with("/acme/new-nonce"));
        assert!(api.new_account.ends_with("/acme/new-acct"));
        assert!(api.new_order.ends_with("/acme/new-order"));
        assert!(api.key_change.ends_with("/acme/key-change"));
    }

    #[tokio::test]
    async fn test_register_account() {
        let server = with_directory_server();
        let dir = Directory::fetch(DirectoryUrl::Other(&server.dir_url))
            .await
            .unwrap();

        let account = dir
            .new_account()
            .contact(vec!["mailto:foo@bar.com".to_owned()])
            .terms_of_service_agreed(true)
            .build()
            .await
            .unwrap();

        assert!(account.api_account().is_status_valid());
        assert!(account.kid().contains("/acme/acct/"));
    }

    #[tokio::test]
    async fn same_key_registers_the_same_kid() {
        let server = with_directory_server();
        let dir = Directory::fetch(DirectoryUrl::Other(&server.dir_url))
            .await
            .unwrap();

        let key = AccountKey::from_pkcs8_pem(crate::test::EC_PEM).unwrap();

        let first = dir
            .new_account()
            .key(key.clone())
            .terms_of_service_agreed(true)
            .build()
            .await
            .unwrap();
        let second = dir
            .new_account()
            .key(key)
            .terms_of_service_agreed(true)
            .build()
            .await
            .unwrap();

        assert_eq!(first.kid(), second.kid());
    }

    #[tokio::test]
    async fn certificate_key_revocation_is_jwk_signed() {
        let server = with_directory_server();
        let dir = Directory::fetch(DirectoryUrl::Other(&server.dir_url))
            .await
            .unwrap();

        let cert_key = AccountKey::from_pkcs8_pem(crate::test::EC_PEM).unwrap();
        dir.revoke_certificate_with_key(&cert_key, b"not-a-real-der", None)
            .await
            .unwrap();

        let state = server.state.lock().unwrap();
        let last = state.protected_log.last().unwrap();
        assert!(last.url.ends_with("/acme/revoke-cert"));
        assert!(last.has_jwk);
        assert!(last.kid.is_none());
    }

    #[tokio::test]
    async fn load_existing_account_reuses_the_kid() {
        let server = with_directory_server();
        let dir = Directory::fetch(DirectoryUrl::Other(&server.dir_url))
            .await
            .unwrap();

        let key = AccountKey::from_pkcs8_pem(crate::test::EC_PEM).unwrap();
        let created = dir
            .new_account()
            .key(key.clone())
            .terms_of_service_agreed(true)
            .build()
            .await
            .unwrap();

        let loaded = dir.load_existing_account(key).await.unwrap();
        assert_eq!(created.kid(), loaded.kid());

        let state = server.state.lock().unwrap();
        let last = state.protected_log.last().unwrap();
        assert!(last.has_jwk, "newAccount must be jwk-signed");
    }
}
