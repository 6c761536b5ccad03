//! Concurrent fan-out wrapper around the search client
//!
//! Lets a caller issue many logical searches at once without one call's
//! suspension (rate-limit wait, backoff sleep, network round trip) blocking
//! the progress of the others. Calls are offloaded onto the runtime; the
//! wrapper only joins them.

use crate::client::SearchClient;
use crate::error::Error;
use crate::models::{SearchRequest, SearchResponse};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Concurrent handle over a shared [`SearchClient`].
///
/// Cheap to clone; all clones share the closed flag, so closing one closes
/// them all.
#[derive(Clone)]
pub struct ConcurrentClient {
    client: Arc<SearchClient>,
    closed: Arc<AtomicBool>,
}

impl ConcurrentClient {
    /// Wrap a client for concurrent use
    pub fn new(client: Arc<SearchClient>) -> Self {
        Self {
            client,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Perform a single search for a query with default parameters
    pub async fn search(&self, query: impl Into<String>) -> Result<SearchResponse, Error> {
        self.search_with(SearchRequest::new(query)).await
    }

    /// Perform a single search with a fully specified request
    pub async fn search_with(&self, request: SearchRequest) -> Result<SearchResponse, Error> {
        self.ensure_open()?;
        join_search(self.spawn_search(request)).await
    }

    /// Run every request and fail fast on the first error.
    ///
    /// On success the responses are index-correlated with the input. On the
    /// first failure the remaining in-flight calls are aborted so no worker
    /// slot leaks; the shared rate limiter is unaffected because token
    /// sleeps never hold its lock.
    pub async fn search_all(
        &self,
        requests: Vec<SearchRequest>,
    ) -> Result<Vec<SearchResponse>, Error> {
        self.ensure_open()?;

        let total = requests.len();
        info!(total, "fan-out search (fail-fast)");

        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| self.spawn_search(request))
            .collect();
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        let mut pending = FuturesUnordered::new();
        for (index, handle) in handles.into_iter().enumerate() {
            pending.push(async move { (index, join_search(handle).await) });
        }

        let mut slots: Vec<Option<SearchResponse>> = (0..total).map(|_| None).collect();
        while let Some((index, result)) = pending.next().await {
            match result {
                Ok(response) => slots[index] = Some(response),
                Err(err) => {
                    debug!(index, error = %err, "aborting remaining in-flight searches");
                    for abort in &aborts {
                        abort.abort();
                    }
                    return Err(err);
                }
            }
        }

        Ok(slots
            .into_iter()
            .map(|slot| slot.expect("every fan-out slot is filled on success"))
            .collect())
    }

    /// Run every request and report each outcome.
    ///
    /// Always returns one result per request, index-correlated with the
    /// input, so the caller can tell which of N calls failed without losing
    /// the others' successes.
    pub async fn try_search_all(
        &self,
        requests: Vec<SearchRequest>,
    ) -> Vec<Result<SearchResponse, Error>> {
        if let Err(err) = self.ensure_open() {
            return requests.iter().map(|_| Err(err.clone())).collect();
        }

        info!(total = requests.len(), "fan-out search (partial results)");

        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| self.spawn_search(request))
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(join_search(handle).await);
        }
        results
    }

    /// Close the wrapper.
    ///
    /// In-flight calls run to completion; any later call fails with a
    /// configuration error instead of hanging.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        debug!("concurrent client closed");
    }

    /// Whether this handle has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            Err(Error::configuration("client handle is closed"))
        } else {
            Ok(())
        }
    }

    fn spawn_search(&self, request: SearchRequest) -> JoinHandle<Result<SearchResponse, Error>> {
        let client = Arc::clone(&self.client);
        tokio::spawn(async move { client.execute(&request).await })
    }
}

/// Join a spawned search, folding runtime-level failures into the error
/// taxonomy
async fn join_search(handle: JoinHandle<Result<SearchResponse, Error>>) -> Result<SearchResponse, Error> {
    handle
        .await
        .unwrap_or_else(|join_err| Err(Error::configuration(format!("search task failed: {}", join_err))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> Arc<SearchClient> {
        let mut settings = Settings::default();
        settings.api.api_key = format!("zai_{}", "b".repeat(32));
        settings.api.base_url = base_url.to_string();
        settings.api.max_retries = 0;
        settings.retry.initial_backoff_seconds = 0.01;
        settings.retry.max_backoff_seconds = 0.02;
        Arc::new(SearchClient::new(settings).unwrap())
    }

    fn ok_body(query: &str) -> serde_json::Value {
        serde_json::json!({
            "results": [
                {"title": query, "url": "https://example.com/", "snippet": "s", "position": 1}
            ],
            "search_time": 0.1,
            "has_more": false
        })
    }

    #[tokio::test]
    async fn test_search_all_preserves_order() {
        let server = MockServer::start().await;
        for i in 0..4 {
            Mock::given(method("POST"))
                .and(path("/search"))
                .and(body_partial_json(serde_json::json!({"query": format!("q{}", i)})))
                .respond_with(ResponseTemplate::new(200).set_body_json(ok_body(&format!("q{}", i))))
                .mount(&server)
                .await;
        }

        let concurrent = ConcurrentClient::new(test_client(&server.uri()));
        let requests: Vec<_> = (0..4).map(|i| SearchRequest::new(format!("q{}", i))).collect();
        let responses = concurrent.search_all(requests).await.unwrap();

        assert_eq!(responses.len(), 4);
        for (i, response) in responses.iter().enumerate() {
            assert_eq!(response.query, format!("q{}", i));
        }
    }

    #[tokio::test]
    async fn test_search_all_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({"query": "broken"})))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("fine")))
            .mount(&server)
            .await;

        let concurrent = ConcurrentClient::new(test_client(&server.uri()));
        let err = concurrent
            .search_all(vec![
                SearchRequest::new("fine"),
                SearchRequest::new("broken"),
                SearchRequest::new("also fine"),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_aborted_siblings_leave_limiter_usable() {
        use std::time::Duration;

        let server = MockServer::start().await;
        // A slow success that is still in flight when the failure lands
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({"query": "slow"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(ok_body("slow"))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({"query": "broken"})))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("fine")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let concurrent = ConcurrentClient::new(Arc::clone(&client));

        let err = concurrent
            .search_all(vec![SearchRequest::new("slow"), SearchRequest::new("broken")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));

        // The aborted sibling must not corrupt admission state
        let capacity = client.limiter().capacity();
        assert!(client.limiter().available_tokens().await <= capacity);

        // And the same handle keeps working after the abort
        let response = concurrent.search("after").await.unwrap();
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn test_try_search_all_returns_partial_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({"query": "broken"})))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("fine")))
            .mount(&server)
            .await;

        let concurrent = ConcurrentClient::new(test_client(&server.uri()));
        let results = concurrent
            .try_search_all(vec![
                SearchRequest::new("fine"),
                SearchRequest::new("broken"),
                SearchRequest::new("also fine"),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Server { .. })));
        assert!(results[2].is_ok());
    }

    #[tokio::test]
    async fn test_closed_handle_rejects_calls() {
        let server = MockServer::start().await;
        let concurrent = ConcurrentClient::new(test_client(&server.uri()));

        concurrent.close();
        assert!(concurrent.is_closed());

        let err = concurrent.search("anything").await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));

        let results = concurrent
            .try_search_all(vec![SearchRequest::new("a"), SearchRequest::new("b")])
            .await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| matches!(r, Err(Error::Configuration { .. }))));
    }

    #[tokio::test]
    async fn test_close_propagates_to_clones() {
        let server = MockServer::start().await;
        let concurrent = ConcurrentClient::new(test_client(&server.uri()));
        let clone = concurrent.clone();

        concurrent.close();
        assert!(clone.is_closed());
    }

    #[tokio::test]
    async fn test_single_search_through_wrapper() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("solo")))
            .mount(&server)
            .await;

        let concurrent = ConcurrentClient::new(test_client(&server.uri()));
        let response = concurrent.search("solo").await.unwrap();
        assert_eq!(response.results.len(), 1);
    }
}
