use async_trait::async_trait;
use reqwest::{Request, Response};

/// Seam between the downloader and the network, so tests can stand in for
/// the archive host.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
