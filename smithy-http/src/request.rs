/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The wire form of a single attempt.

use crate::body::SdkBody;
use http::{HeaderMap, HeaderValue, Method, Uri};

/// An outbound HTTP request, derived fresh from a [`Request`](crate::operation::Request) on
/// every attempt.
///
/// `HttpRequest` is immutable: transports read it and consume it with
/// [`into_http`](HttpRequest::into_http).
#[derive(Debug)]
pub struct HttpRequest {
    inner: http::Request<SdkBody>,
    streaming: bool,
}

impl HttpRequest {
    /// Wraps an assembled request
    pub fn new(inner: http::Request<SdkBody>, streaming: bool) -> Self {
        HttpRequest { inner, streaming }
    }

    /// The HTTP method
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// The full request URI
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// All headers
    pub fn headers(&self) -> &HeaderMap<HeaderValue> {
        self.inner.headers()
    }

    /// A single header as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    /// The request content
    pub fn body(&self) -> &SdkBody {
        self.inner.body()
    }

    /// True if the content is streamed
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Consumes the request, returning the `http::Request` to put on the wire
    pub fn into_http(self) -> http::Request<SdkBody> {
        self.inner
    }
}

impl From<http::Request<SdkBody>> for HttpRequest {
    fn from(inner: http::Request<SdkBody>) -> Self {
        HttpRequest::new(inner, false)
    }
}
