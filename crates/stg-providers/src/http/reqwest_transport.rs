//! reqwest-backed HTTP transport.
//!
//! Redirect policy, timeout, TLS verification and proxy are per-request
//! controls, so a client is built per transfer. Wire failures come back as
//! data in the outcome; only infrastructure problems (bad proxy URL, client
//! build) are errors.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Proxy};

use stg_domain::entities::HttpMethod;
use stg_domain::error::{Error, Result};
use stg_domain::ports::{
    HttpTransport, TransferFailure, TransferFailureKind, TransferOutcome, TransferRequest,
};

pub struct ReqwestTransport {
    user_agent: String,
}

impl ReqwestTransport {
    #[must_use]
    pub fn new<S: Into<String>>(user_agent: S) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }

    fn build_client(&self, request: &TransferRequest) -> Result<Client> {
        let redirect = if request.follow_redirects {
            Policy::limited(request.max_redirects)
        } else {
            Policy::none()
        };
        let mut builder = Client::builder()
            .user_agent(&self.user_agent)
            .redirect(redirect)
            .timeout(Duration::from_millis(request.timeout_ms))
            .danger_accept_invalid_certs(!request.verify_tls);
        if let Some(proxy_url) = &request.proxy_url {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| Error::transport_with_source("invalid proxy URL", e))?;
            builder = builder.proxy(proxy);
        }
        builder
            .build()
            .map_err(|e| Error::transport_with_source("HTTP client build failed", e))
    }

    fn method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
        }
    }

    fn cookie_header(cookies: &HashMap<String, String>) -> String {
        let mut pairs: Vec<String> = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        pairs.sort();
        pairs.join("; ")
    }

    fn failure(elapsed_ms: u64, url: &str, e: &reqwest::Error) -> TransferOutcome {
        let (kind, message) = if e.is_timeout() {
            (TransferFailureKind::Timeout, "timeout".to_owned())
        } else {
            (TransferFailureKind::Transport, e.to_string())
        };
        TransferOutcome {
            status: None,
            headers: HashMap::new(),
            body: Vec::new(),
            final_url: url.to_owned(),
            elapsed_ms,
            failure: Some(TransferFailure { kind, message }),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &TransferRequest) -> Result<TransferOutcome> {
        let client = self.build_client(request)?;

        let mut builder = client.request(Self::method(request.method), &request.url);
        if !request.query_params.is_empty() {
            builder = builder.query(&request.query_params);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.cookies.is_empty() {
            builder = builder.header("Cookie", Self::cookie_header(&request.cookies));
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let started = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                return Ok(Self::failure(
                    started.elapsed().as_millis() as u64,
                    &request.url,
                    &e,
                ));
            }
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        match response.bytes().await {
            Ok(body) => Ok(TransferOutcome {
                status: Some(status),
                headers,
                body: body.to_vec(),
                final_url,
                elapsed_ms: started.elapsed().as_millis() as u64,
                failure: None,
            }),
            Err(e) => Ok(Self::failure(
                started.elapsed().as_millis() as u64,
                &final_url,
                &e,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_is_sorted_and_joined() {
        let cookies = HashMap::from([
            ("sid".to_owned(), "aaa".to_owned()),
            ("csrf".to_owned(), "ccc".to_owned()),
        ]);
        assert_eq!(ReqwestTransport::cookie_header(&cookies), "csrf=ccc; sid=aaa");
    }
}
