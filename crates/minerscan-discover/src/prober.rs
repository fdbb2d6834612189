//! Per-host endpoint probing.
//!
//! For one host, endpoints are tried in priority order. Each endpoint runs a
//! small state machine over the auth tiers:
//!
//! ```text
//! digest ─┬─ transport error ──> next endpoint
//!         ├─ 200 ──────────────> done (success)
//!         ├─ 401 ──> basic ─┬─ transport error ──> next endpoint
//!         │                 ├─ 200 ──────────────> done (success)
//!         │                 └─ anything else ────> next endpoint
//!         └─ other status ────> next endpoint
//! ```

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response, StatusCode};

use minerscan_core::{Host, ResponsePayload, ScanOutcome};

use crate::auth::{digest_authorization, digest_challenge, AuthTier, Credentials};
use crate::config::ScanConfig;
use crate::error::Result;

/// Something that can characterize one host.
///
/// Implementations never fail: every call yields exactly one outcome.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, host: &Host) -> ScanOutcome;
}

/// Result of one request under one auth tier.
#[derive(Debug)]
enum Attempt {
    Success(Response),
    AuthRejected,
    Status(StatusCode),
}

/// HTTP prober for miner management endpoints.
pub struct HttpProber {
    client: Client,
    endpoints: Vec<String>,
    credentials: Credentials,
    scheme: String,
}

impl HttpProber {
    /// Build a prober from the scan configuration.
    ///
    /// Every request is bounded by `config.timeout()`, connection setup included.
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("minerscan/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoints: config.endpoints.clone(),
            credentials: Credentials::new(&config.username, &config.password),
            scheme: config.scheme.clone(),
        })
    }

    /// Walk the auth tiers for one endpoint. `Some` only on a 200.
    async fn probe_endpoint(&self, host: &Host, endpoint: &str) -> Option<ResponsePayload> {
        let url = format!("{}://{}{}", self.scheme, host.authority(), endpoint);
        let mut tier = AuthTier::ORDER[0];

        loop {
            match self.attempt(&url, endpoint, tier).await {
                Err(e) => {
                    tracing::debug!(
                        host = %host,
                        endpoint = %endpoint,
                        tier = %tier,
                        error = %e,
                        "Transport failure, skipping endpoint"
                    );
                    return None;
                }
                Ok(Attempt::Success(response)) => return Some(capture_payload(response).await),
                Ok(Attempt::AuthRejected) => match tier.next() {
                    Some(next) => tier = next,
                    None => {
                        tracing::info!(host = %host, endpoint = %endpoint, "Credentials rejected");
                        return None;
                    }
                },
                Ok(Attempt::Status(status)) => {
                    tracing::debug!(
                        host = %host,
                        endpoint = %endpoint,
                        tier = %tier,
                        status = status.as_u16(),
                        "Endpoint answered without success"
                    );
                    return None;
                }
            }
        }
    }

    async fn attempt(
        &self,
        url: &str,
        path: &str,
        tier: AuthTier,
    ) -> std::result::Result<Attempt, reqwest::Error> {
        let response = match tier {
            AuthTier::Digest => self.digest_get(url, path).await?,
            AuthTier::Basic => {
                self.client
                    .get(url)
                    .basic_auth(&self.credentials.username, Some(&self.credentials.password))
                    .send()
                    .await?
            }
        };
        Ok(classify(response))
    }

    /// GET with a digest handshake: answer the server's challenge once, if it sends one.
    async fn digest_get(&self, url: &str, path: &str) -> std::result::Result<Response, reqwest::Error> {
        let response = self.client.get(url).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let authorization = digest_challenge(response.headers())
            .and_then(|challenge| digest_authorization(challenge, &self.credentials, path));

        match authorization {
            Some(authorization) => {
                self.client
                    .get(url)
                    .header(AUTHORIZATION, authorization)
                    .send()
                    .await
            }
            None => Ok(response),
        }
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(&self, host: &Host) -> ScanOutcome {
        for endpoint in &self.endpoints {
            if let Some(payload) = self.probe_endpoint(host, endpoint).await {
                tracing::info!(host = %host, endpoint = %endpoint, "Miner endpoint found");
                return ScanOutcome::success(host.clone(), endpoint.clone(), payload);
            }
        }

        tracing::warn!(host = %host, "Unreachable or no endpoint answered");
        ScanOutcome::failed(host.clone())
    }
}

fn classify(response: Response) -> Attempt {
    match response.status() {
        StatusCode::OK => Attempt::Success(response),
        StatusCode::UNAUTHORIZED => Attempt::AuthRejected,
        other => Attempt::Status(other),
    }
}

/// Read a successful body. A body that cannot be read still counts as success.
async fn capture_payload(response: Response) -> ResponsePayload {
    match response.bytes().await {
        Ok(body) => ResponsePayload::from_body(&body),
        Err(e) => {
            tracing::debug!(error = %e, "Failed to read response body");
            ResponsePayload::Absent
        }
    }
}
