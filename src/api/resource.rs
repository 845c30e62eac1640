use crate::api::client::{read_limited_body, ApiClient, ApiError, MAX_BODY_SIZE};
use futures::future::{self, BoxFuture, Either};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;

/// Items managed by a [`ResourceService`] expose their server identifier.
pub trait Identified {
    fn id(&self) -> u64;
}

/// Typed access to a single remote collection endpoint.
///
/// One service instance covers one collection (e.g. `/expenses`): GET lists
/// it, POST creates into it, PATCH and DELETE address individual items by
/// appending their identifier to the path. All requests go through the
/// [`ApiClient`] the service was constructed with; this layer performs no
/// retries. A failed call is surfaced as a typed [`ApiError`] and retrying
/// is the caller's decision.
pub struct ResourceService<T> {
    client: ApiClient,
    endpoint: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ResourceService<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            _marker: PhantomData,
        }
    }
}

/// In-flight collection fetch returned by [`ResourceService::list`].
///
/// Resolves to the fetched items, or to [`ApiError::Cancelled`] if the paired
/// [`CancelHandle`] was invoked before the response landed.
pub struct ListRequest<T> {
    inner: BoxFuture<'static, Result<Vec<T>, ApiError>>,
}

impl<T> Future for ListRequest<T> {
    type Output = Result<Vec<T>, ApiError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

/// Cancels the paired [`ListRequest`].
///
/// Cancellation is cooperative: invoking the handle makes the request resolve
/// `Err(ApiError::Cancelled)` instead of data or any other error. Invoking it
/// after the request already completed is a no-op. Dropping the handle
/// without calling [`cancel`](CancelHandle::cancel) does NOT cancel the
/// request, so fire-and-forget callers may discard it freely.
#[derive(Debug)]
pub struct CancelHandle {
    tx: oneshot::Sender<()>,
}

impl CancelHandle {
    pub fn cancel(self) {
        // Send fails only when the request already finished; nothing to do then.
        let _ = self.tx.send(());
    }
}

impl<T> ResourceService<T>
where
    T: Serialize + DeserializeOwned + Identified + Send + 'static,
{
    /// Create a service for `endpoint` (e.g. `/expenses`), issuing requests
    /// through the given client.
    pub fn new(client: &ApiClient, endpoint: &str) -> Self {
        Self {
            client: client.clone(),
            endpoint: endpoint.trim_matches('/').to_string(),
            _marker: PhantomData,
        }
    }

    /// Fetch the full collection.
    ///
    /// Returns the pending request together with its cancellation handle.
    /// The request future is detached from `self` and may be spawned or
    /// raced; only the handle it was returned with can cancel it.
    ///
    /// # Errors
    ///
    /// The request resolves with:
    /// - [`ApiError::Cancelled`]: the handle was invoked before completion
    /// - [`ApiError::RequestFailed`]: non-2xx response status
    /// - [`ApiError::Network`] / [`ApiError::Timeout`]: transport failures
    /// - [`ApiError::Decode`] / [`ApiError::BodyTooLarge`]: unusable body
    pub fn list(&self) -> (ListRequest<T>, CancelHandle) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let http = self.client.http().clone();
        let timeout = self.client.timeout();
        let url = self.collection_url();

        let guarded = async move {
            let request = async {
                let response = execute(timeout, http.get(&url)).await?;
                let body = read_limited_body(response, MAX_BODY_SIZE).await?;
                serde_json::from_slice::<Vec<T>>(&body)
                    .map_err(|e| ApiError::Decode(e.to_string()))
            };
            futures::pin_mut!(request);

            match future::select(cancel_rx, request).await {
                Either::Left((Ok(()), _)) => Err(ApiError::Cancelled),
                // Handle dropped without an explicit cancel: keep waiting.
                Either::Left((Err(_), request)) => request.await,
                Either::Right((result, _)) => result,
            }
        };

        let request = ListRequest {
            inner: Box::pin(guarded),
        };
        (request, CancelHandle { tx: cancel_tx })
    }

    /// Submit a new item; resolves with the server-assigned representation.
    pub async fn create(&self, item: &T) -> Result<T, ApiError> {
        let builder = self.client.http().post(self.collection_url()).json(item);
        let response = execute(self.client.timeout(), builder).await?;
        decode(response).await
    }

    /// Submit an update addressed by the item's identifier.
    ///
    /// Fails with [`ApiError::RequestFailed`] when the identifier is unknown
    /// server-side.
    pub async fn update(&self, item: &T) -> Result<T, ApiError> {
        let builder = self
            .client
            .http()
            .patch(self.item_url(item.id()))
            .json(item);
        let response = execute(self.client.timeout(), builder).await?;
        decode(response).await
    }

    /// Delete the item with the given identifier.
    pub async fn remove(&self, id: u64) -> Result<(), ApiError> {
        let builder = self.client.http().delete(self.item_url(id));
        execute(self.client.timeout(), builder).await?;
        Ok(())
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/{}",
            self.client.base_url().as_str().trim_end_matches('/'),
            self.endpoint
        )
    }

    fn item_url(&self, id: u64) -> String {
        format!("{}/{}", self.collection_url(), id)
    }
}

/// Issue a request with the configured timeout and map the status line.
async fn execute(
    timeout: Duration,
    builder: reqwest::RequestBuilder,
) -> Result<reqwest::Response, ApiError> {
    let response = tokio::time::timeout(timeout, builder.send())
        .await
        .map_err(|_| ApiError::Timeout)?
        .map_err(ApiError::Network)?;

    if !response.status().is_success() {
        return Err(ApiError::RequestFailed(response.status().as_u16()));
    }

    Ok(response)
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let body = read_limited_body(response, MAX_BODY_SIZE).await?;
    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: u64,
        name: String,
    }

    impl Identified for Widget {
        fn id(&self) -> u64 {
            self.id
        }
    }

    fn test_service(server: &MockServer) -> ResourceService<Widget> {
        let base = Url::parse(&server.uri()).unwrap();
        let client = ApiClient::new(base, Duration::from_secs(5)).unwrap();
        ResourceService::new(&client, "/widgets")
    }

    #[tokio::test]
    async fn test_list_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widgets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 1, "name": "alpha" },
                { "id": 2, "name": "beta" },
            ])))
            .mount(&server)
            .await;

        let (request, _cancel) = test_service(&server).list();
        let widgets = request.await.unwrap();
        assert_eq!(widgets.len(), 2);
        assert_eq!(widgets[0].name, "alpha");
        assert_eq!(widgets[1].id, 2);
    }

    #[tokio::test]
    async fn test_list_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (request, _cancel) = test_service(&server).list();
        match request.await.unwrap_err() {
            ApiError::RequestFailed(503) => {}
            e => panic!("Expected RequestFailed(503), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_list_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let (request, _cancel) = test_service(&server).list();
        match request.await.unwrap_err() {
            ApiError::Decode(_) => {}
            e => panic!("Expected Decode, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_cancel_before_response_resolves_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let (request, cancel) = test_service(&server).list();
        let handle = tokio::spawn(request);
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        match handle.await.unwrap().unwrap_err() {
            ApiError::Cancelled => {}
            e => panic!("Expected Cancelled, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_noop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let (request, cancel) = test_service(&server).list();
        let widgets = request.await.unwrap();
        assert!(widgets.is_empty());

        // The request is gone; cancelling must not panic or misbehave.
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_dropping_handle_does_not_cancel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 7, "name": "gamma" },
            ])))
            .mount(&server)
            .await;

        let (request, cancel) = test_service(&server).list();
        drop(cancel);

        let widgets = request.await.unwrap();
        assert_eq!(widgets.len(), 1);
    }

    #[tokio::test]
    async fn test_create_returns_server_representation() {
        let server = MockServer::start().await;
        let submitted = Widget {
            id: 1,
            name: "delta".into(),
        };
        Mock::given(method("POST"))
            .and(path("/widgets"))
            .and(body_json(&submitted))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "id": 42, "name": "delta" })),
            )
            .mount(&server)
            .await;

        let created = test_service(&server).create(&submitted).await.unwrap();
        assert_eq!(created.id, 42); // server-assigned id wins
        assert_eq!(created.name, "delta");
    }

    #[tokio::test]
    async fn test_create_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let widget = Widget {
            id: 1,
            name: "x".into(),
        };
        match test_service(&server).create(&widget).await.unwrap_err() {
            ApiError::RequestFailed(500) => {}
            e => panic!("Expected RequestFailed(500), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_update_addresses_item_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/widgets/9"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": 9, "name": "renamed" })),
            )
            .mount(&server)
            .await;

        let widget = Widget {
            id: 9,
            name: "renamed".into(),
        };
        let updated = test_service(&server).update(&widget).await.unwrap();
        assert_eq!(updated, widget);
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let widget = Widget {
            id: 999,
            name: "ghost".into(),
        };
        match test_service(&server).update(&widget).await.unwrap_err() {
            ApiError::RequestFailed(404) => {}
            e => panic!("Expected RequestFailed(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_remove_success_and_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/widgets/3"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/widgets/4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let service = test_service(&server);
        assert!(service.remove(3).await.is_ok());
        match service.remove(4).await.unwrap_err() {
            ApiError::RequestFailed(404) => {}
            e => panic!("Expected RequestFailed(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let client = ApiClient::new(base, Duration::from_millis(100)).unwrap();
        let service: ResourceService<Widget> = ResourceService::new(&client, "/widgets");

        let (request, _cancel) = service.list();
        match request.await.unwrap_err() {
            ApiError::Timeout => {}
            e => panic!("Expected Timeout, got {:?}", e),
        }
    }
}
