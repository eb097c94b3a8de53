/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! HTTP specific retry behaviors

use crate::error::ProvideErrorMetadata;
use http::StatusCode;
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Formatter};

/// A failed attempt, as seen by retry conditions and backoff strategies
#[derive(Clone, Copy)]
pub enum AttemptError<'a> {
    /// The request could not be sent or no response was received
    Dispatch(&'a (dyn Error + Send + Sync + 'static)),

    /// The service answered with an error
    Service {
        /// Status of the error response
        status: StatusCode,
        /// The service error
        error: &'a dyn ProvideErrorMetadata,
    },
}

impl<'a> AttemptError<'a> {
    /// Status of the error response, `None` for dispatch failures
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AttemptError::Dispatch(_) => None,
            AttemptError::Service { status, .. } => Some(*status),
        }
    }

    /// Error code of the service error
    pub fn code(&self) -> Option<&'a str> {
        match *self {
            AttemptError::Dispatch(_) => None,
            AttemptError::Service { error, .. } => error.code(),
        }
    }

    /// Message of the underlying error
    pub fn message(&self) -> Option<String> {
        match self {
            AttemptError::Dispatch(err) => Some(err.to_string()),
            AttemptError::Service { error, .. } => error.message().map(str::to_string),
        }
    }
}

impl Debug for AttemptError<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Dispatch(err) => f.debug_tuple("Dispatch").field(err).finish(),
            AttemptError::Service { status, error } => f
                .debug_struct("Service")
                .field("status", status)
                .field("code", &error.code())
                .finish(),
        }
    }
}
