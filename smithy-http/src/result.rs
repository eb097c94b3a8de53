/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The outcome of a call: exactly one of [`SdkSuccess`] or [`SdkError`].

use crate::error::{BoxError, Crc32MismatchError, ProvideErrorMetadata};
use crate::response::HttpResponse;
use crate::retry::AttemptError;
use http::StatusCode;
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

/// Successful Sdk Result
///
/// The parsed output together with the raw response it was parsed from.
#[derive(Debug)]
pub struct SdkSuccess<O> {
    /// The response of the final attempt
    pub raw: HttpResponse,
    /// The output produced by the success handler
    pub parsed: O,
}

/// Failing Sdk Result
#[derive(Debug)]
pub enum SdkError<E> {
    /// The request failed during construction. It was not dispatched over the network.
    ConstructionFailure(BoxError),

    /// The request failed during dispatch. An HTTP response was not received. The request MAY
    /// have been sent.
    DispatchFailure(BoxError),

    /// A response was received but it was not parseable according the the protocol (for example
    /// the server hung up while the body was being read)
    ResponseError {
        /// The response that could not be handled
        raw: HttpResponse,
        /// Why it could not be handled
        err: BoxError,
    },

    /// The response body did not match the CRC32 checksum the service sent with it
    ChecksumMismatch {
        /// The corrupted response
        raw: HttpResponse,
        /// The expected and computed checksums
        err: Crc32MismatchError,
    },

    /// An error response was received from the service
    ServiceError {
        /// The error response
        raw: HttpResponse,
        /// The typed service error
        err: E,
    },

    /// A retryable failure happened, but the request body can not be replayed so it was not
    /// retried. Wraps the original failure.
    NonReplayableBody(Box<SdkError<E>>),
}

impl<E> SdkError<E> {
    /// The response associated with this error, if one was received
    pub fn raw_response(&self) -> Option<&HttpResponse> {
        match self {
            SdkError::ResponseError { raw, .. }
            | SdkError::ChecksumMismatch { raw, .. }
            | SdkError::ServiceError { raw, .. } => Some(raw),
            SdkError::NonReplayableBody(inner) => inner.raw_response(),
            SdkError::ConstructionFailure(_) | SdkError::DispatchFailure(_) => None,
        }
    }

    /// The status code of the response associated with this error
    pub fn status(&self) -> Option<StatusCode> {
        self.raw_response().map(HttpResponse::status)
    }

    /// The typed service error, if that is what this is
    pub fn into_service_error(self) -> Option<E> {
        match self {
            SdkError::ServiceError { err, .. } => Some(err),
            SdkError::NonReplayableBody(inner) => inner.into_service_error(),
            _ => None,
        }
    }

    /// True if the response body was corrupted in transfer
    pub fn is_checksum_mismatch(&self) -> bool {
        matches!(self, SdkError::ChecksumMismatch { .. })
    }
}

impl<E> SdkError<E>
where
    E: ProvideErrorMetadata,
{
    /// The request id of the failed call, from the service error or the response headers
    pub fn request_id(&self) -> Option<&str> {
        match self {
            SdkError::ServiceError { err, .. } => err.request_id(),
            SdkError::NonReplayableBody(inner) => inner.request_id(),
            other => other.raw_response().and_then(|raw| {
                raw.header("x-amzn-RequestId")
                    .or_else(|| raw.header("x-amz-request-id"))
            }),
        }
    }

    /// A view of this error for retry conditions and backoff strategies.
    ///
    /// Returns `None` for failures that are never offered to the retry policy.
    pub fn as_attempt_error(&self) -> Option<AttemptError<'_>> {
        match self {
            SdkError::DispatchFailure(err) => Some(AttemptError::Dispatch(err.as_ref())),
            SdkError::ServiceError { raw, err } => Some(AttemptError::Service {
                status: raw.status(),
                error: err,
            }),
            _ => None,
        }
    }
}

impl<E> Display for SdkError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SdkError::ConstructionFailure(err) => write!(f, "failed to construct request: {}", err),
            SdkError::DispatchFailure(err) => {
                write!(f, "unable to execute HTTP request: {}", err)
            }
            SdkError::ResponseError { err, .. } => write!(f, "{}", err),
            SdkError::ChecksumMismatch { err, .. } => write!(f, "{}", err),
            SdkError::ServiceError { err, .. } => write!(f, "{}", err),
            SdkError::NonReplayableBody(inner) => write!(
                f,
                "request body can not be replayed, not retrying: {}",
                inner
            ),
        }
    }
}

impl<E> Error for SdkError<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SdkError::ConstructionFailure(err)
            | SdkError::DispatchFailure(err)
            | SdkError::ResponseError { err, .. } => Some(err.as_ref()),
            SdkError::ChecksumMismatch { err, .. } => Some(err),
            SdkError::ServiceError { err, .. } => Some(err),
            SdkError::NonReplayableBody(inner) => Some(inner.as_ref()),
        }
    }
}
