/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Inbound responses and the handlers that turn them into typed values.

use crate::body::SdkBody;
use crate::error::{BoxError, Crc32MismatchError};
use bytes::Bytes;
use flate2::read::GzDecoder;
use http::{HeaderMap, HeaderValue, StatusCode};
use once_cell::sync::OnceCell;
use std::io;
use std::io::Read;

/// An inbound HTTP response for one attempt.
///
/// The body starts out as whatever the transport produced (usually a stream). The execution
/// engine calls [`load_body`](HttpResponse::load_body) before handing the response to a handler
/// that does not need the connection left open; handlers then read
/// [`content`](HttpResponse::content), which is transparently gzip-decoded.
#[derive(Debug)]
pub struct HttpResponse {
    status: StatusCode,
    status_text: String,
    headers: HeaderMap<HeaderValue>,
    body: SdkBody,
    decoded: OnceCell<Bytes>,
}

impl HttpResponse {
    /// Creates a response
    pub fn new(
        status: StatusCode,
        status_text: impl Into<String>,
        headers: HeaderMap<HeaderValue>,
        body: SdkBody,
    ) -> Self {
        HttpResponse {
            status,
            status_text: status_text.into(),
            headers,
            body,
            decoded: OnceCell::new(),
        }
    }

    /// Replaces the status text
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    /// The status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The reason phrase of the status line
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// All headers
    pub fn headers(&self) -> &HeaderMap<HeaderValue> {
        &self.headers
    }

    /// A single header (looked up case-insensitively) as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// The raw body
    pub fn body(&self) -> &SdkBody {
        &self.body
    }

    /// Moves the raw body out of the response, leaving a `Taken` body behind.
    ///
    /// Handlers that keep the connection open use this to hand the stream to the caller.
    pub fn take_body(&mut self) -> SdkBody {
        self.decoded = OnceCell::new();
        std::mem::replace(&mut self.body, SdkBody::taken())
    }

    /// Reads the body to the end and keeps it in memory. Loading an in-memory body is a no-op.
    pub async fn load_body(&mut self) -> Result<(), BoxError> {
        if self.body.bytes().is_some() {
            return Ok(());
        }
        let body = std::mem::replace(&mut self.body, SdkBody::taken());
        let bytes = hyper::body::to_bytes(body).await?;
        tracing::trace!(len = bytes.len(), "loaded response body");
        self.body = SdkBody::from(bytes);
        self.decoded = OnceCell::new();
        Ok(())
    }

    /// The body exactly as it was received, or `None` if it has not been loaded
    pub fn raw_content(&self) -> Option<&[u8]> {
        self.body.bytes()
    }

    /// True if the service compressed the body
    pub fn is_gzip_encoded(&self) -> bool {
        self.header("content-encoding")
            .map(|encoding| encoding.trim().eq_ignore_ascii_case("gzip"))
            .unwrap_or(false)
    }

    /// The loaded body, decompressed if the service sent it gzip encoded.
    ///
    /// Decoding happens once, on first access.
    pub fn content(&self) -> io::Result<&[u8]> {
        let raw = self.raw_content().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "response body has not been loaded")
        })?;
        if !self.is_gzip_encoded() {
            return Ok(raw);
        }
        let decoded = self.decoded.get_or_try_init(|| {
            let mut out = Vec::new();
            GzDecoder::new(raw).read_to_end(&mut out).map_err(|err| {
                tracing::debug!(error = %err, "unable to decompress gzip response body");
                err
            })?;
            Ok::<_, io::Error>(Bytes::from(out))
        })?;
        Ok(decoded.as_ref())
    }
}

impl<B> From<http::Response<B>> for HttpResponse
where
    B: Into<SdkBody>,
{
    fn from(response: http::Response<B>) -> Self {
        let (parts, body) = response.into_parts();
        HttpResponse::new(
            parts.status,
            parts.status.canonical_reason().unwrap_or_default(),
            parts.headers,
            body.into(),
        )
    }
}

/// Failure to turn a response into a typed value
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The body did not match the checksum the service sent with it
    #[error(transparent)]
    Crc32Mismatch(#[from] Crc32MismatchError),

    /// The body could not be unmarshalled
    #[error("unable to unmarshall response: {0}")]
    Unmarshall(#[source] BoxError),
}

impl HandlerError {
    /// Wraps an unmarshalling failure
    pub fn unmarshall(err: impl Into<BoxError>) -> Self {
        HandlerError::Unmarshall(err.into())
    }
}

/// Converts an [`HttpResponse`] into a typed value.
///
/// Success handlers produce the call's result; error handlers produce the call's typed service
/// error. Handlers are sync: unless [`needs_connection_left_open`] returns true, the engine loads
/// the whole body before calling [`handle`] and releases the connection afterwards.
///
/// [`needs_connection_left_open`]: HttpResponseHandler::needs_connection_left_open
/// [`handle`]: HttpResponseHandler::handle
pub trait HttpResponseHandler {
    /// The typed value
    type Output;

    /// Handles the response
    fn handle(&self, response: &mut HttpResponse) -> Result<Self::Output, HandlerError>;

    /// True if the handler reads the body itself, as a stream, after `handle` returns
    fn needs_connection_left_open(&self) -> bool {
        false
    }
}
