use std::time::Instant;
use surf::middleware::{Middleware, Next};
use surf::{Client, Request, Response};

/// Logs every outgoing request with its status and latency. Query strings
/// are left out of the log line since they usually carry API keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct SurfLogging;

#[async_trait::async_trait]
impl Middleware for SurfLogging {
    async fn handle(&self, req: Request, client: Client, next: Next<'_>) -> surf::Result<Response> {
        let method = req.method();
        let url = req.url();
        let target = format!(
            "{}://{}{}",
            url.scheme(),
            url.host_str().unwrap_or_default(),
            url.path()
        );

        log::debug!("{} {}", method, target);
        let started = Instant::now();
        let result = next.run(req, client).await;

        match &result {
            Ok(response) => log::info!(
                "{} {} -> {} ({} ms)",
                method,
                target,
                response.status(),
                started.elapsed().as_millis()
            ),
            Err(err) => log::warn!(
                "{} {} failed after {} ms: {}",
                method,
                target,
                started.elapsed().as_millis(),
                err
            ),
        }

        result
    }
}
