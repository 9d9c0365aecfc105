//! HTTP fetch stage.

use super::{BoxStage, Stage};
use crate::context::RunContext;
use crate::errors::{Error, Result};
use crate::value::Value;
use async_trait::async_trait;
use std::sync::Arc;

type RequestFn = Arc<dyn Fn(&reqwest::Client, Value) -> reqwest::RequestBuilder + Send + Sync>;

/// Sends a request built from the incoming value and emits the response
/// body as [`Value::Bytes`].
///
/// Any status outside `2xx` fails with [`Error::Http`]. The request is
/// abandoned when the run is cancelled.
#[derive(Clone)]
pub struct HttpStage {
    client: reqwest::Client,
    make_request: RequestFn,
}

impl HttpStage {
    /// Creates the stage with a default client.
    pub fn new<F>(make_request: F) -> Self
    where
        F: Fn(&reqwest::Client, Value) -> reqwest::RequestBuilder + Send + Sync + 'static,
    {
        Self {
            client: reqwest::Client::new(),
            make_request: Arc::new(make_request),
        }
    }

    /// Uses `client` for requests.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Boxes the stage.
    #[must_use]
    pub fn into_stage(self) -> BoxStage {
        Box::new(self)
    }
}

impl std::fmt::Debug for HttpStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for HttpStage {
    fn name(&self) -> &str {
        "http"
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        let request = (self.make_request)(&self.client, input)
            .build()
            .map_err(|e| Error::Http(format!("invalid request: {e}")))?;
        let method = request.method().to_string();
        let url = request.url().to_string();
        ctx.tracer().trace("http", &[method.clone(), url.clone()]);

        let token = ctx.cancellation().clone();
        let fetch = async {
            let response = self
                .client
                .execute(request)
                .await
                .map_err(|e| Error::Http(format!("{method} {url} failed: {e}")))?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::Http(format!("{method} {url} returned {status}")));
            }
            let body = response
                .bytes()
                .await
                .map_err(|e| Error::Http(format!("{method} {url} body read failed: {e}")))?;
            tracing::debug!(%method, %url, %status, bytes = body.len(), "http request finished");
            Ok(Value::Bytes(body.to_vec()))
        };

        tokio::select! {
            biased;
            () = token.cancelled() => Err(Error::Cancelled(token.reason().unwrap_or_default())),
            result = fetch => result,
        }
    }
}

/// Sends the request built by `make_request` with a default client.
///
/// ```rust,ignore
/// let stage = http(|client, _input| client.get("https://example.com/status.json"));
/// ```
pub fn http<F>(make_request: F) -> BoxStage
where
    F: Fn(&reqwest::Client, Value) -> reqwest::RequestBuilder + Send + Sync + 'static,
{
    HttpStage::new(make_request).into_stage()
}
