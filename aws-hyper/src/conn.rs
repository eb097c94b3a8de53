/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The transport seam of the engine

use smithy_http::body::SdkBody;
use smithy_http::error::BoxError;
use smithy_http::request::HttpRequest;
use smithy_http::response::HttpResponse;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tower::{Service, ServiceExt};

/// A boxed, sendable future
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Sends one wire request and returns its response.
///
/// Implementations never follow redirects or retry: the engine owns both.
pub trait HttpClient: Send + Sync {
    /// Sends `request`. The response body may still be streaming when this resolves.
    fn execute(&self, request: HttpRequest) -> BoxFuture<Result<HttpResponse, BoxError>>;

    /// Releases connections held by the transport
    fn shutdown(&self) {}
}

impl<T> HttpClient for Arc<T>
where
    T: HttpClient + ?Sized,
{
    fn execute(&self, request: HttpRequest) -> BoxFuture<Result<HttpResponse, BoxError>> {
        T::execute(self, request)
    }

    fn shutdown(&self) {
        T::shutdown(self)
    }
}

/// Adapts any tower service over `http` types into an [`HttpClient`]
#[derive(Clone)]
pub struct TowerConnector<S> {
    inner: S,
}

impl<S> Debug for TowerConnector<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TowerConnector").finish()
    }
}

impl<S> TowerConnector<S> {
    /// Wraps `service`
    pub fn new(service: S) -> Self {
        TowerConnector { inner: service }
    }
}

impl<S, B> HttpClient for TowerConnector<S>
where
    S: Service<http::Request<SdkBody>, Response = http::Response<B>>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    B: Into<SdkBody> + 'static,
{
    fn execute(&self, request: HttpRequest) -> BoxFuture<Result<HttpResponse, BoxError>> {
        let service = self.inner.clone();
        Box::pin(async move {
            let response = service
                .oneshot(request.into_http())
                .await
                .map_err(Into::<BoxError>::into)?;
            Ok::<_, BoxError>(HttpResponse::from(response))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tower::service_fn;

    #[tokio::test]
    async fn tower_service_as_client() {
        let service = service_fn(|request: http::Request<SdkBody>| async move {
            let body = format!("{} {}", request.method(), request.uri());
            Ok::<_, BoxError>(http::Response::builder().status(202).body(body).unwrap())
        });
        let client = TowerConnector::new(service);
        let request = HttpRequest::from(
            http::Request::builder()
                .uri("https://example.com/path")
                .body(SdkBody::empty())
                .unwrap(),
        );
        let response = client.execute(request).await.expect("service succeeds");
        assert_eq!(response.status().as_u16(), 202);
        assert_eq!(response.raw_content(), Some(&b"GET https://example.com/path"[..]));
    }

    #[tokio::test]
    async fn mock_service_sees_the_wire_request() {
        let (service, mut handle) =
            tower_test::mock::pair::<http::Request<SdkBody>, http::Response<SdkBody>>();
        let client = TowerConnector::new(service);
        let pending = client.execute(HttpRequest::from(
            http::Request::builder()
                .uri("https://example.com/mock")
                .body(SdkBody::from("hello"))
                .unwrap(),
        ));
        let serve = async move {
            let (request, send) = handle.next_request().await.expect("request arrives");
            assert_eq!(request.uri().path(), "/mock");
            assert_eq!(request.body().bytes(), Some(&b"hello"[..]));
            send.send_response(
                http::Response::builder()
                    .status(204)
                    .body(SdkBody::empty())
                    .unwrap(),
            );
        };
        let (response, ()) = tokio::join!(pending, serve);
        assert_eq!(response.unwrap().status().as_u16(), 204);
    }

    #[tokio::test]
    async fn tower_service_errors_are_dispatch_errors() {
        let service = service_fn(|_request: http::Request<SdkBody>| async move {
            Err::<http::Response<SdkBody>, _>(BoxError::from("connection refused"))
        });
        let client = TowerConnector::new(service);
        let err = client
            .execute(HttpRequest::from(http::Request::new(SdkBody::empty())))
            .await
            .expect_err("service fails");
        assert_eq!(err.to_string(), "connection refused");
    }
}
