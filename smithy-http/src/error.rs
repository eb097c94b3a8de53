/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Error metadata shared by every service error.

use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// A type-erased error
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Which side of the call is responsible for a service error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorType {
    /// The request was invalid (status < 500)
    Client,
    /// The service failed to process a valid request (status >= 500)
    Service,
    /// The responsible party could not be determined
    Unknown,
}

impl Default for ErrorType {
    fn default() -> Self {
        ErrorType::Unknown
    }
}

impl ErrorType {
    /// Classifies a status code: 5xx is service-side, everything else client-side.
    pub fn from_status(status: u16) -> Self {
        if status >= 500 {
            ErrorType::Service
        } else {
            ErrorType::Client
        }
    }
}

/// Error metadata common to every service error: code, message, request id and the HTTP
/// status that carried it.
///
/// `ErrorMetadata` is itself usable as the error type of a call when no modeled error type
/// exists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorMetadata {
    code: Option<String>,
    message: Option<String>,
    request_id: Option<String>,
    error_type: ErrorType,
    status_code: Option<u16>,
    service_name: Option<String>,
}

impl ErrorMetadata {
    /// Returns a builder for `ErrorMetadata`
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// The error code, eg. `ThrottlingException`
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Human readable message
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Request id returned by the service
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Client or service fault
    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    /// HTTP status of the response that carried this error
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Name of the service that returned the error
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }
}

impl Display for ErrorMetadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message().unwrap_or("unknown error"))?;
        write!(
            f,
            " (Service: {}; Status Code: {}; Error Code: {}; Request ID: {})",
            self.service_name().unwrap_or("unknown"),
            self.status_code
                .map(|status| status.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            self.code().unwrap_or("unknown"),
            self.request_id().unwrap_or("unknown"),
        )
    }
}

impl Error for ErrorMetadata {}

/// Builder for [`ErrorMetadata`]
#[derive(Clone, Debug, Default)]
pub struct Builder {
    inner: ErrorMetadata,
}

impl Builder {
    /// Sets the error code
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.inner.code = Some(code.into());
        self
    }

    /// Sets the error message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.inner.message = Some(message.into());
        self
    }

    /// Sets the request id
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.inner.request_id = Some(request_id.into());
        self
    }

    /// Sets the error type
    pub fn error_type(mut self, error_type: ErrorType) -> Self {
        self.inner.error_type = error_type;
        self
    }

    /// Sets the HTTP status code
    pub fn status_code(mut self, status: u16) -> Self {
        self.inner.status_code = Some(status);
        self
    }

    /// Sets the service name
    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.inner.service_name = Some(service_name.into());
        self
    }

    /// Builds the metadata
    pub fn build(self) -> ErrorMetadata {
        self.inner
    }
}

/// Trait to retrieve error metadata from a service error
pub trait ProvideErrorMetadata {
    /// Returns the error metadata
    fn meta(&self) -> &ErrorMetadata;

    /// Returns the error code if it's available.
    fn code(&self) -> Option<&str> {
        self.meta().code()
    }

    /// Returns the error message, if there is one.
    fn message(&self) -> Option<&str> {
        self.meta().message()
    }

    /// Returns the request id, if there is one.
    fn request_id(&self) -> Option<&str> {
        self.meta().request_id()
    }

    /// Returns the error type.
    fn error_type(&self) -> ErrorType {
        self.meta().error_type()
    }

    /// Returns the HTTP status of the error response.
    fn status_code(&self) -> Option<u16> {
        self.meta().status_code()
    }
}

impl ProvideErrorMetadata for ErrorMetadata {
    fn meta(&self) -> &ErrorMetadata {
        self
    }
}

/// The CRC32 checksum sent by the service does not match the checksum of the received body.
///
/// This indicates a corrupted transfer rather than a transient network fault.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error(
    "client calculated crc32 checksum {actual} didn't match that calculated by server side {expected}"
)]
pub struct Crc32MismatchError {
    /// Checksum the service sent
    pub expected: u32,
    /// Checksum computed over the received body
    pub actual: u32,
}
