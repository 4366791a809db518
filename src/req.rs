use std::time::Duration;

use reqwest::header::{self, HeaderMap};

use crate::{
    api,
    error::{Error, Result},
};

pub(crate) const JOSE_JSON: &str = "application/jose+json";

pub(crate) async fn req_get(http: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    log::trace!("GET {url}");
    Ok(http.get(url).send().await?)
}

pub(crate) async fn req_head(http: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    log::trace!("HEAD {url}");
    Ok(http.head(url).send().await?)
}

pub(crate) async fn req_post(
    http: &reqwest::Client,
    url: &str,
    body: String,
) -> Result<reqwest::Response> {
    log::trace!("POST {url} {body}");
    Ok(http
        .post(url)
        .header(header::CONTENT_TYPE, JOSE_JSON)
        .body(body)
        .send()
        .await?)
}

/// Classify a non-2xx response.
///
/// An `application/problem+json` body becomes an [`api::Problem`]; anything
/// else is surfaced as [`Error::UnexpectedStatus`] with the raw body.
pub(crate) async fn req_handle_error(res: reqwest::Response) -> Result<reqwest::Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let content_type = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let body = req_safe_read_body(res).await;

    if content_type.starts_with("application/problem+json") {
        let mut problem =
            serde_json::from_str::<api::Problem>(&body).unwrap_or_else(|err| api::Problem {
                _type: "problemJsonFail".to_owned(),
                detail: Some(format!(
                    "failed to deserialize application/problem+json ({err}) body: {body}"
                )),
                status: None,
                subproblems: None,
            });
        if problem.status.is_none() {
            problem.status = Some(status.as_u16());
        }
        return Err(Error::Api(problem));
    }

    Err(Error::UnexpectedStatus {
        status: status.as_u16(),
        body,
    })
}

pub(crate) fn req_expect_header(res: &reqwest::Response, name: &'static str) -> Result<String> {
    res.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
        .ok_or(Error::MissingHeader(name))
}

pub(crate) async fn req_safe_read_body(res: reqwest::Response) -> String {
    // letsencrypt sometimes closes the TLS abruptly causing io error
    // even though we did capture the body.
    res.text().await.unwrap_or_default()
}

/// `Retry-After` in delta-seconds form. The HTTP-date form is ignored and the
/// caller falls back to its configured interval.
pub(crate) fn req_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Targets of every `Link: rel="alternate"` header, in response order.
pub(crate) fn req_link_alternates(headers: &HeaderMap) -> Vec<String> {
    let mut urls = Vec::new();

    for value in headers.get_all(header::LINK) {
        let Ok(value) = value.to_str() else { continue };

        for link in value.split(',') {
            let link = link.trim();
            if !link
                .split(';')
                .skip(1)
                .any(|param| param.trim() == "rel=\"alternate\"")
            {
                continue;
            }

            let target = link.split(';').next().unwrap_or_default().trim();
            if let Some(url) = target
                .strip_prefix('<')
                .and_then(|target| target.strip_suffix('>'))
            {
                urls.push(url.to_owned());
            }
        }
    }

    urls
}
