use crate::app::ports::{HttpClientPort, HttpGetResult};
use crate::common::constants::USER_AGENT;
use crate::common::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Reqwest-backed client; every request is bounded by the configured timeout.
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get(&self, url: &str) -> Result<HttpGetResult> {
        let resp = self.client.get(url).send().await.map_err(|e| fetch_error(url, e))?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = resp.text().await.map_err(|e| fetch_error(url, e))?;
        Ok(HttpGetResult {
            status,
            body,
            content_type,
        })
    }
}

fn fetch_error(url: &str, e: reqwest::Error) -> PipelineError {
    let message = if e.is_timeout() {
        format!("request to {} timed out", url)
    } else {
        format!("request to {} failed: {}", url, e)
    };
    PipelineError::Fetch { message }
}
