/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Connections and sleep implementations useful for testing code that uses a
//! [`Client`](crate::Client).

// TODO(docs): document the public fields of ValidateRequest
#![allow(missing_docs)]

use crate::conn::{BoxFuture, HttpClient};
use crate::sleep::{AsyncSleep, Sleep};
use http::header::HeaderName;
use smithy_http::body::SdkBody;
use smithy_http::error::BoxError;
use smithy_http::request::HttpRequest;
use smithy_http::response::HttpResponse;
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type ConnectVec<B> = Vec<(http::Request<SdkBody>, Result<http::Response<B>, BoxError>)>;

/// A request the connection received, next to the one the test expected
#[derive(Debug)]
pub struct ValidateRequest {
    /// The request the test expected
    pub expected: http::Request<SdkBody>,
    /// The request the client sent
    pub actual: http::Request<SdkBody>,
}

impl ValidateRequest {
    /// Panics unless the method, URI, body and expected headers match, skipping `ignore_headers`
    pub fn assert_matches(&self, ignore_headers: &[HeaderName]) {
        let (actual, expected) = (&self.actual, &self.expected);
        for (name, value) in expected.headers() {
            if !ignore_headers.contains(name) {
                let actual_header = actual
                    .headers()
                    .get(name)
                    .unwrap_or_else(|| panic!("Header {:?} missing", name));
                assert_eq!(
                    actual_header.to_str().unwrap(),
                    value.to_str().unwrap(),
                    "Header mismatch for {:?}",
                    name
                );
            }
        }
        let actual_str = std::str::from_utf8(actual.body().bytes().unwrap_or(&[]));
        let expected_str = std::str::from_utf8(expected.body().bytes().unwrap_or(&[]));
        match (actual_str, expected_str) {
            (Ok(actual), Ok(expected)) => assert_eq!(actual, expected),
            _ => assert_eq!(actual.body().bytes(), expected.body().bytes()),
        };
        assert_eq!(actual.method(), expected.method());
        assert_eq!(actual.uri(), expected.uri());
    }
}

/// TestConnection for use with a [`Client`](crate::Client).
///
/// A basic test connection. It will:
/// - Respond to requests with a preloaded series of responses
/// - Record requests for future examination
///
/// The generic parameter `B` is the type of the response body.
/// Usage example:
/// ```rust
/// use aws_hyper::test_connection::TestConnection;
/// use smithy_http::body::SdkBody;
/// let events = vec![(
///    http::Request::new(SdkBody::from("request body")),
///    http::Response::builder()
///        .status(200)
///        .body("response body")
///        .unwrap(),
/// )];
/// let conn = TestConnection::new(events);
/// let client = aws_hyper::Client::new(conn);
/// ```
#[derive(Debug)]
pub struct TestConnection<B> {
    data: Arc<Mutex<ConnectVec<B>>>,
    requests: Arc<Mutex<Vec<ValidateRequest>>>,
}

// Need a clone impl that ignores `B`
impl<B> Clone for TestConnection<B> {
    fn clone(&self) -> Self {
        TestConnection {
            data: self.data.clone(),
            requests: self.requests.clone(),
        }
    }
}

impl<B> TestConnection<B> {
    /// Replays `data` in order: each request receives the paired response
    pub fn new(data: Vec<(http::Request<SdkBody>, http::Response<B>)>) -> Self {
        Self::from_results(
            data.into_iter()
                .map(|(request, response)| (request, Ok(response)))
                .collect(),
        )
    }

    /// Like [`new`](TestConnection::new), but an `Err` fails the matching attempt with a
    /// dispatch failure
    pub fn from_results(
        mut data: Vec<(http::Request<SdkBody>, Result<http::Response<B>, &'static str>)>,
    ) -> Self {
        data.reverse();
        let data = data
            .into_iter()
            .map(|(request, response)| (request, response.map_err(BoxError::from)))
            .collect();
        TestConnection {
            data: Arc::new(Mutex::new(data)),
            requests: Default::default(),
        }
    }

    /// Every request received so far
    pub fn requests(&self) -> impl Deref<Target = Vec<ValidateRequest>> + '_ {
        self.requests.lock().unwrap()
    }

    /// Asserts every request matched and every response was used
    pub fn assert_requests_match(&self, ignore_headers: &[HeaderName]) {
        for req in self.requests().iter() {
            req.assert_matches(ignore_headers)
        }
        let remaining_requests = self.data.lock().unwrap().len();
        let actual_requests = self.requests().len();
        assert_eq!(
            remaining_requests, 0,
            "Expected {} additional requests ({} were made)",
            remaining_requests, actual_requests
        );
    }
}

impl<B> HttpClient for TestConnection<B>
where
    B: Into<SdkBody> + Send + 'static,
{
    fn execute(&self, request: HttpRequest) -> BoxFuture<Result<HttpResponse, BoxError>> {
        let actual = request.into_http();
        let next = self.data.lock().unwrap().pop();
        let result = match next {
            Some((expected, response)) => {
                self.requests
                    .lock()
                    .unwrap()
                    .push(ValidateRequest { expected, actual });
                response.map(crate::hyper_client::sdk_response)
            }
            None => Err("No more data".into()),
        };
        Box::pin(std::future::ready(result))
    }
}

/// An [`AsyncSleep`] that returns immediately and records every requested duration
#[derive(Clone, Debug, Default)]
pub struct InstantSleep {
    log: Arc<Mutex<Vec<Duration>>>,
}

impl InstantSleep {
    /// A sleeper with an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Every duration slept so far
    pub fn logs(&self) -> Vec<Duration> {
        self.log.lock().unwrap().clone()
    }

    /// The sum of every duration slept so far
    pub fn total_duration(&self) -> Duration {
        self.logs().iter().sum()
    }
}

impl AsyncSleep for InstantSleep {
    fn sleep(&self, duration: Duration) -> Sleep {
        self.log.lock().unwrap().push(duration);
        Sleep::new(std::future::ready(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_http_client<T: HttpClient + Clone>(_: &T) {}

    #[tokio::test]
    async fn replays_responses_in_order() {
        let conn = TestConnection::new(vec![
            (
                http::Request::new(SdkBody::from("first")),
                http::Response::builder().status(500).body("").unwrap(),
            ),
            (
                http::Request::new(SdkBody::from("second")),
                http::Response::builder().status(200).body("ok").unwrap(),
            ),
        ]);
        is_http_client(&conn);
        let first = conn
            .execute(HttpRequest::from(http::Request::new(SdkBody::from("first"))))
            .await
            .unwrap();
        assert_eq!(first.status().as_u16(), 500);
        let second = conn
            .execute(HttpRequest::from(http::Request::new(SdkBody::from("second"))))
            .await
            .unwrap();
        assert_eq!(second.raw_content(), Some(&b"ok"[..]));
        assert!(conn
            .execute(HttpRequest::from(http::Request::new(SdkBody::empty())))
            .await
            .is_err());
        conn.assert_requests_match(&[]);
    }

    #[tokio::test]
    async fn instant_sleep_records_durations() {
        let sleep = InstantSleep::new();
        sleep.sleep(Duration::from_millis(100)).await;
        sleep.sleep(Duration::from_millis(250)).await;
        assert_eq!(sleep.total_duration(), Duration::from_millis(350));
        assert_eq!(sleep.logs().len(), 2);
    }
}
