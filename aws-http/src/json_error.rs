/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Error handling for the AWS JSON protocols

use crate::extract_request_id;
use http::StatusCode;
use serde_json::{Map, Value};
use smithy_http::error::{BoxError, ErrorMetadata, ErrorType};
use smithy_http::response::{HandlerError, HttpResponse, HttpResponseHandler};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::io;

/// Header some JSON services use to carry the error code
pub const ERROR_TYPE_HEADER: &str = "x-amzn-ErrorType";

/// Failure to parse an error response
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum UnmarshallError {
    /// The body is empty and no error type header was sent
    #[error("error response has an empty body and no {} header", ERROR_TYPE_HEADER)]
    EmptyBody,

    /// The body is not a JSON object
    #[error("error response body is not a JSON object")]
    NotAnObject,

    /// The body is not valid JSON
    #[error("error response body is not valid JSON")]
    InvalidJson(#[source] serde_json::Error),

    /// The body could not be read
    #[error("error response body could not be read")]
    Io(#[source] io::Error),
}

/// A parsed JSON error response
#[derive(Debug, Clone, PartialEq)]
pub struct JsonErrorResponse {
    status: StatusCode,
    error_code: Option<String>,
    message: Option<String>,
    body: Map<String, Value>,
}

impl JsonErrorResponse {
    /// Parses an error response.
    ///
    /// The error code comes from the `x-amzn-ErrorType` header when present, otherwise from the
    /// `__type` (or `code`) field of the body.
    pub fn from_response(response: &HttpResponse) -> Result<Self, UnmarshallError> {
        let content = response.content().map_err(UnmarshallError::Io)?;
        let header_code = response.header(ERROR_TYPE_HEADER);
        let body = if content.iter().all(u8::is_ascii_whitespace) {
            if header_code.is_none() {
                return Err(UnmarshallError::EmptyBody);
            }
            Map::new()
        } else {
            match serde_json::from_slice(content).map_err(UnmarshallError::InvalidJson)? {
                Value::Object(body) => body,
                _ => return Err(UnmarshallError::NotAnObject),
            }
        };

        let error_code = header_code
            .or_else(|| body.get("__type").and_then(Value::as_str))
            .or_else(|| body.get("code").and_then(Value::as_str))
            .map(|code| sanitize_error_code(code).to_string());
        let message = body
            .get("message")
            .or_else(|| body.get("Message"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(JsonErrorResponse {
            status: response.status(),
            error_code,
            message,
            body,
        })
    }

    /// Status of the error response
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The service error code, eg. `ResourceNotFoundException`
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    /// The error message
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The parsed body, for unmarshallers of modeled errors that carry extra fields
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }
}

fn sanitize_error_code(error_code: &str) -> &str {
    // Trim a trailing URL from the error code, beginning with a `:`
    let error_code = match error_code.find(':') {
        Some(idx) => &error_code[..idx],
        None => error_code,
    };

    // Trim a prefixing namespace from the error code, beginning with a `#`
    match error_code.find('#') {
        Some(idx) => &error_code[idx + 1..],
        None => error_code,
    }
}

/// Turns a parsed error response into a modeled service error
pub trait JsonErrorUnmarshaller<E>: Send + Sync {
    /// True if this unmarshaller handles `error`
    fn matches(&self, error: &JsonErrorResponse) -> bool;

    /// Builds the service error. `meta` already carries code, message, status and request id.
    fn unmarshall(&self, error: &JsonErrorResponse, meta: ErrorMetadata) -> Result<E, BoxError>;
}

/// Unmarshalls one error code with a function
pub struct ErrorCodeUnmarshaller<F> {
    code: &'static str,
    build: F,
}

impl<F> ErrorCodeUnmarshaller<F> {
    /// Handles errors whose code is `code`
    pub fn new(code: &'static str, build: F) -> Self {
        ErrorCodeUnmarshaller { code, build }
    }
}

impl<F> Debug for ErrorCodeUnmarshaller<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorCodeUnmarshaller")
            .field("code", &self.code)
            .finish()
    }
}

impl<E, F> JsonErrorUnmarshaller<E> for ErrorCodeUnmarshaller<F>
where
    F: Fn(&JsonErrorResponse, ErrorMetadata) -> Result<E, BoxError> + Send + Sync,
{
    fn matches(&self, error: &JsonErrorResponse) -> bool {
        error.error_code() == Some(self.code)
    }

    fn unmarshall(&self, error: &JsonErrorResponse, meta: ErrorMetadata) -> Result<E, BoxError> {
        (self.build)(error, meta)
    }
}

/// Error handler for AWS JSON services.
///
/// The first registered unmarshaller that matches the error wins. Unmatched errors become
/// `E::from(ErrorMetadata)`.
pub struct JsonErrorResponseHandler<E> {
    service_name: Option<String>,
    unmarshallers: Vec<Box<dyn JsonErrorUnmarshaller<E>>>,
}

impl<E> Debug for JsonErrorResponseHandler<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonErrorResponseHandler")
            .field("service_name", &self.service_name)
            .field("unmarshallers", &self.unmarshallers.len())
            .finish()
    }
}

impl<E> Default for JsonErrorResponseHandler<E> {
    fn default() -> Self {
        JsonErrorResponseHandler {
            service_name: None,
            unmarshallers: Vec::new(),
        }
    }
}

impl<E> JsonErrorResponseHandler<E> {
    /// Creates a handler without modeled errors
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `service_name` in the metadata of every error
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    /// Registers an unmarshaller for a modeled error
    pub fn with_unmarshaller(
        mut self,
        unmarshaller: impl JsonErrorUnmarshaller<E> + 'static,
    ) -> Self {
        self.unmarshallers.push(Box::new(unmarshaller));
        self
    }

    fn metadata(&self, response: &HttpResponse, error: &JsonErrorResponse) -> ErrorMetadata {
        let status = response.status().as_u16();
        let mut builder = ErrorMetadata::builder()
            .status_code(status)
            .error_type(ErrorType::from_status(status));
        if let Some(code) = error.error_code() {
            builder = builder.code(code);
        }
        if let Some(message) = error.message() {
            builder = builder.message(message);
        }
        if let Some(request_id) = extract_request_id(response.headers()) {
            builder = builder.request_id(request_id);
        }
        if let Some(service_name) = &self.service_name {
            builder = builder.service_name(service_name.as_str());
        }
        builder.build()
    }
}

impl<E> HttpResponseHandler for JsonErrorResponseHandler<E>
where
    E: From<ErrorMetadata>,
{
    type Output = E;

    fn handle(&self, response: &mut HttpResponse) -> Result<E, HandlerError> {
        let error = JsonErrorResponse::from_response(response).map_err(|err| {
            tracing::debug!(status = %response.status(), error = %err, "unable to parse error response");
            HandlerError::unmarshall(err)
        })?;
        let meta = self.metadata(response, &error);
        match self.unmarshallers.iter().find(|u| u.matches(&error)) {
            Some(unmarshaller) => unmarshaller
                .unmarshall(&error, meta)
                .map_err(HandlerError::Unmarshall),
            None => Ok(E::from(meta)),
        }
    }
}
