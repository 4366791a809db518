use std::{
    io::{BufReader, Cursor},
    time::SystemTime,
};

use der::{asn1::Ia5String, Decode as _};
use x509_cert::{
    builder::{Builder as _, RequestBuilder as CsrBuilder},
    ext::pkix::{name::GeneralName, SubjectAltName},
    name::Name,
};

use crate::error::{CryptoError, Error, Result};

/// Make a P-256 private key (from which we can derive a public key) for use
/// as a certificate key.
pub fn create_p256_key() -> p256::ecdsa::SigningKey {
    let csprng = &mut rand::thread_rng();
    ecdsa::SigningKey::from(p256::SecretKey::random(csprng))
}

/// Creates a CSR for `domains` and signs it with `signer`.
///
/// The first domain becomes the Common Name (CN); all domains, first
/// included, land in the Subject Alternative Name extension. Serialize the
/// result with [`der::Encode::to_der`] before passing it to
/// [`Order::finalize`](crate::order::Order::finalize).
pub fn create_csr(
    signer: &p256::ecdsa::SigningKey,
    domains: &[&str],
) -> Result<x509_cert::request::CertReq> {
    let primary_domain = domains
        .first()
        .ok_or_else(|| CryptoError::Certificate("no domains for CSR".to_owned()))?;
    let subject = format!("CN={primary_domain}")
        .parse::<Name>()
        .map_err(|err| CryptoError::Certificate(err.to_string()))?;

    let mut csr = CsrBuilder::new(subject, signer)
        .map_err(|err| CryptoError::Certificate(err.to_string()))?;

    let san = domains
        .iter()
        .map(|domain| {
            Ia5String::new(domain)
                .map(GeneralName::DnsName)
                .map_err(|err| CryptoError::Certificate(err.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    csr.add_extension(&SubjectAltName(san))
        .map_err(|err| CryptoError::Certificate(err.to_string()))?;

    csr.build::<p256::ecdsa::DerSignature>()
        .map_err(|err| CryptoError::Certificate(err.to_string()).into())
}

/// An issued certificate chain as downloaded from the order's certificate
/// URL, plus any alternate chains the server advertised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pem: String,
    alternate_urls: Vec<String>,
}

impl Certificate {
    pub(crate) fn new(pem: String, alternate_urls: Vec<String>) -> Self {
        Certificate {
            pem,
            alternate_urls,
        }
    }

    /// The raw `application/pem-certificate-chain` text, end-entity
    /// certificate first.
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// URLs of alternate chains, from the response's
    /// `Link: rel="alternate"` headers.
    ///
    /// Fetch one with
    /// [`Order::download_alternate_cert`](crate::order::Order::download_alternate_cert).
    pub fn alternate_urls(&self) -> &[String] {
        &self.alternate_urls
    }

    /// The chain split into DER blobs, end-entity certificate first.
    pub fn der_chain(&self) -> Result<Vec<Vec<u8>>> {
        let mut rdr = BufReader::new(Cursor::new(self.pem()));

        rustls_pemfile::certs(&mut rdr)
            .map(|res| res.map(|cert| cert.to_vec()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| CryptoError::Certificate(err.to_string()).into())
    }

    /// Inspect the certificate to count the number of (whole) valid days
    /// left.
    ///
    /// It's up to the ACME API provider to decide how long an issued
    /// certificate is valid. Let's Encrypt sets the validity to 90 days.
    /// This function reports 89 days for a newly issued cert, since it
    /// counts _whole_ days.
    ///
    /// It is possible to get negative days for an expired certificate.
    pub fn valid_days_left(&self) -> Result<i64> {
        let chain = self.der_chain()?;
        let cert_ee = chain
            .first() // EE cert is first
            .ok_or_else(|| Error::from(CryptoError::Certificate("empty chain".to_owned())))?;

        let cert = x509_cert::Certificate::from_der(cert_ee)
            .map_err(|err| CryptoError::Certificate(err.to_string()))?;

        let not_after = cert
            .tbs_certificate
            .validity
            .not_after
            .to_date_time()
            .unix_duration();
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();

        Ok((not_after.as_secs() as i64 - now.as_secs() as i64) / 86_400)
    }
}
