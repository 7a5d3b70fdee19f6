use super::client::HttpClient;
use async_trait::async_trait;
use std::time::Duration;

/// Plain reqwest client with a connect timeout and a whole-request timeout.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self(client))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
