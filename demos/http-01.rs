use std::time::Duration;

use acme_core::{create_csr, create_p256_key, Directory, DirectoryUrl, Poller};
use actix_files::Files;
use actix_web::{middleware::Logger, App, HttpServer};
use der::Encode as _;
use pkcs8::{EncodePrivateKey as _, LineEnding};
use tokio::fs;

const CHALLENGE_DIR: &str = "./acme-challenges";
const CERTIFICATE_DIR: &str = "./acme-certificates";

const DOMAINS: &[&str] = &["example.org"];
const CONTACT_EMAIL: Option<&str> = None;

#[actix_web::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("ensuring challenge and certificate dirs exist");
    fs::create_dir_all(CHALLENGE_DIR).await?;
    fs::create_dir_all(CERTIFICATE_DIR).await?;

    log::info!("starting temporary HTTP challenge server");
    let srv = HttpServer::new(|| {
        App::new()
            .wrap(Logger::default().log_target("acme_http_server"))
            .service(Files::new("/.well-known/acme-challenge", CHALLENGE_DIR).show_files_listing())
    })
    .bind(("0.0.0.0", 80))?
    .workers(1)
    .disable_signals()
    .shutdown_timeout(0)
    .run();

    let srv_handle = srv.handle();
    let srv_task = actix_web::rt::spawn(srv);

    log::info!("fetching LetsEncrypt directory");
    // Create a directory entrypoint.
    // Note: Change to `DirectoryUrl::LetsEncrypt` in production.
    let dir = Directory::fetch(DirectoryUrl::LetsEncryptStaging).await?;

    // Your contact addresses, note the `mailto:`
    let contact = CONTACT_EMAIL.map(|email| vec![format!("mailto:{email}")]);

    log::info!("generating account key and registering with ACME provider");
    // Usually, you'll persist `account.private_key_pem()` and pass it to
    // `AccountBuilder::key` in the future instead of registering again.
    let mut builder = dir.new_account().terms_of_service_agreed(true);
    if let Some(contact) = contact {
        builder = builder.contact(contact);
    }
    let account = builder.build().await?;

    log::info!("ordering a new TLS certificate for our domain");
    let order = DOMAINS
        .iter()
        .fold(account.new_order(), |order, domain| {
            order.add_dns_identifier(*domain)
        })
        .build()
        .await?;

    // If the ownership of the domain(s) have already been authorized in a
    // previous order, you might be able to skip validation. The ACME API
    // provider decides.
    log::info!("waiting for order to be validated");
    for auth in order.authorizations().await? {
        if !auth.need_challenge() {
            continue;
        }

        // For HTTP, the challenge is a text file in the web server's root:
        let challenge = auth
            .http_challenge()
            .ok_or_else(|| eyre::eyre!("no http-01 challenge offered"))?;

        let path = format!("{CHALLENGE_DIR}/{}", challenge.http_token());
        log::info!("writing proof for {} to {path}", auth.domain_name());
        fs::write(&path, challenge.http_proof()?).await?;

        // After the proof is reachable, `answer` tells the ACME API to start
        // checking its existence, and we poll until validation concludes.
        challenge.answer().await?;
        auth.poll_done(Poller::new(Duration::from_secs(5))).await?;
    }

    let order = order.poll_ready(Poller::new(Duration::from_secs(5))).await?;

    // Ownership is proven. Create a private key for the certificate and
    // submit the CSR. The provider enters a "processing" state that is
    // polled until the certificate is either issued or rejected.
    let private_key = create_p256_key();
    log::info!("submitting CSR for: {DOMAINS:?}");
    let csr = create_csr(&private_key, DOMAINS)?;
    let order = order
        .finalize(&csr.to_der()?, Poller::new(Duration::from_secs(5)))
        .await?;

    log::info!("downloading certificate");
    let cert = order.download_cert().await?;

    let cert_path = format!("{CERTIFICATE_DIR}/{}.pem", DOMAINS[0]);
    log::info!("persisting certificate to {cert_path}");
    fs::write(cert_path, cert.pem()).await?;

    let key_path = format!("{CERTIFICATE_DIR}/{}.key", DOMAINS[0]);
    log::info!("persisting private key to {key_path}");
    fs::write(key_path, private_key.to_pkcs8_pem(LineEnding::LF)?.as_bytes()).await?;

    println!();
    println!("{}", cert.pem());
    println!("cert valid for {} days", cert.valid_days_left()?);

    log::info!("stopping temporary HTTP challenge server");
    srv_handle.stop(false).await;
    srv_task.await??;

    Ok(())
}
