use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::FetchError;

/// HTTP access to one API base. Every GET carries a deadline; every request
/// is tied to the fetcher's cancellation token.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    base: String,
    timeout: Duration,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(base: impl Into<String>, timeout: Duration, cancel: CancellationToken) -> Self {
        Self { client: Client::new(), base: base.into(), timeout, cancel }
    }

    /// Same client and base, bound to a different token.
    #[must_use]
    pub fn with_cancel(&self, cancel: CancellationToken) -> Self {
        Self { cancel, ..self.clone() }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    /// Sends `request` and waits for response headers, giving up after
    /// `timeout` or when the token fires. Non-2xx responses are errors.
    pub async fn fetch_with_timeout(
        &self,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<Response, FetchError> {
        self.bounded(Some(timeout), send_checked(request)).await
    }

    /// GET `path` and decode the body as JSON. The deadline covers both the
    /// response headers and the body.
    pub async fn get_json(&self, path: &str) -> Result<Value, FetchError> {
        let request = self.get(path);
        let outcome = self
            .bounded(Some(self.timeout), async move {
                let response = send_checked(request).await?;
                read_json(response).await
            })
            .await;

        if let Err(err) = &outcome {
            debug!(endpoint = %path, error = %err, "fetch failed");
        }
        outcome
    }

    /// POST a JSON body. Only cancellation bounds the call. An empty response
    /// body decodes as `null`.
    pub async fn post_json<B>(&self, path: &str, body: &B) -> Result<Value, FetchError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.client.post(self.url(path)).json(body);
        let outcome = self
            .bounded(None, async move {
                let response = send_checked(request).await?;
                read_json(response).await
            })
            .await;

        if let Err(err) = &outcome {
            debug!(endpoint = %path, error = %err, "post failed");
        }
        outcome
    }

    /// Opens a long-lived streaming response. Only connection setup is
    /// bounded, and only by cancellation; the caller owns the body afterwards.
    pub async fn open_stream(&self, url: &str) -> Result<Response, FetchError> {
        let request = self.client.get(url).header("accept", "text/event-stream");
        self.bounded(None, send_checked(request)).await
    }

    async fn bounded<T, F>(&self, deadline: Option<Duration>, work: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        let limited = async {
            match deadline {
                Some(limit) => tokio::time::timeout(limit, work).await.unwrap_or(Err(
                    FetchError::Timeout { after_ms: limit.as_millis() as u64 },
                )),
                None => work.await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(FetchError::Cancelled),
            outcome = limited => outcome,
        }
    }
}

async fn send_checked(request: RequestBuilder) -> Result<Response, FetchError> {
    let response = request.send().await.map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    Ok(response)
}

async fn read_json(response: Response) -> Result<Value, FetchError> {
    let body = response.bytes().await.map_err(transport)?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&body).map_err(|err| FetchError::Decode(err.to_string()))
}

fn transport(err: reqwest::Error) -> FetchError {
    FetchError::Transport(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::get};
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn fetcher(base: String, timeout_ms: u64) -> Fetcher {
        Fetcher::new(base, Duration::from_millis(timeout_ms), CancellationToken::new())
    }

    #[tokio::test]
    async fn decodes_json_and_maps_statuses() {
        let base = serve(
            Router::new()
                .route("/ok", get(|| async { Json(json!({ "total_tasks": 3 })) }))
                .route("/down", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
                .route("/junk", get(|| async { "<html>" })),
        )
        .await;
        let fetcher = fetcher(base, 1500);

        assert_eq!(fetcher.get_json("/ok").await.unwrap()["total_tasks"], 3);
        assert_eq!(fetcher.get_json("/down").await, Err(FetchError::Status(503)));
        assert!(matches!(fetcher.get_json("/junk").await, Err(FetchError::Decode(_))));

        let response =
            fetcher.fetch_with_timeout(fetcher.get("/ok"), Duration::from_millis(500)).await;
        assert_eq!(response.unwrap().status(), StatusCode::OK);
        let response =
            fetcher.fetch_with_timeout(fetcher.get("/down"), Duration::from_millis(500)).await;
        assert_eq!(response.err(), Some(FetchError::Status(503)));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let base = serve(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({}))
            }),
        ))
        .await;
        let fetcher = fetcher(base, 100);

        let started = std::time::Instant::now();
        assert_eq!(fetcher.get_json("/slow").await, Err(FetchError::Timeout { after_ms: 100 }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn cancellation_wins_over_pending_request() {
        let base = serve(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({}))
            }),
        ))
        .await;
        let fetcher = fetcher(base, 3000);
        let cancel = fetcher.cancel_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        assert_eq!(fetcher.get_json("/slow").await, Err(FetchError::Cancelled));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let fetcher = fetcher("http://127.0.0.1:9".to_string(), 1000);
        assert!(matches!(
            fetcher.get_json("/x").await,
            Err(FetchError::Transport(_) | FetchError::Timeout { .. })
        ));
    }
}
