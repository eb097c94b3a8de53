/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Success handling for the AWS JSON protocols

use crate::extract_request_id;
use smithy_http::error::{BoxError, Crc32MismatchError};
use smithy_http::response::{HandlerError, HttpResponse, HttpResponseHandler};
use std::fmt;
use std::fmt::{Debug, Formatter};

/// Header carrying the CRC32 checksum of the response body
pub const CRC32_HEADER: &str = "x-amz-crc32";

/// Turns a JSON document into a typed value.
///
/// Any `Fn(&[u8]) -> Result<T, BoxError>` is an unmarshaller.
pub trait Unmarshall {
    /// The typed value
    type Output;

    /// Parses `body`
    fn unmarshall(&self, body: &[u8]) -> Result<Self::Output, BoxError>;
}

impl<F, T> Unmarshall for F
where
    F: Fn(&[u8]) -> Result<T, BoxError>,
{
    type Output = T;

    fn unmarshall(&self, body: &[u8]) -> Result<T, BoxError> {
        (self)(body)
    }
}

/// The result of a successful call together with the request id the service assigned to it
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ServiceResponse<T> {
    /// The unmarshalled result
    pub result: T,
    /// Request id from `x-amzn-RequestId` or `x-amz-request-id`
    pub request_id: Option<String>,
}

/// Success handler for AWS JSON services.
///
/// When the service sends `x-amz-crc32`, the checksum is verified against the bytes received on
/// the wire before anything is unmarshalled.
pub struct JsonResponseHandler<U> {
    unmarshaller: U,
    verify_crc32: bool,
}

impl<U> Debug for JsonResponseHandler<U> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonResponseHandler")
            .field("verify_crc32", &self.verify_crc32)
            .finish()
    }
}

impl<U> JsonResponseHandler<U> {
    /// Creates a handler that parses the body with `unmarshaller`
    pub fn new(unmarshaller: U) -> Self {
        JsonResponseHandler {
            unmarshaller,
            verify_crc32: true,
        }
    }

    /// Skip checksum verification even when the service sends one
    pub fn without_crc32_check(mut self) -> Self {
        self.verify_crc32 = false;
        self
    }
}

fn check_crc32(response: &HttpResponse, raw: &[u8]) -> Result<(), HandlerError> {
    let expected = match response.header(CRC32_HEADER) {
        Some(expected) => expected,
        None => return Ok(()),
    };
    let expected = expected
        .trim()
        .parse::<u32>()
        .map_err(HandlerError::unmarshall)?;
    let actual = crc32fast::hash(raw);
    if expected != actual {
        tracing::debug!(expected, actual, "response body failed the crc32 check");
        return Err(Crc32MismatchError { expected, actual }.into());
    }
    Ok(())
}

impl<U> HttpResponseHandler for JsonResponseHandler<U>
where
    U: Unmarshall,
{
    type Output = ServiceResponse<U::Output>;

    fn handle(&self, response: &mut HttpResponse) -> Result<Self::Output, HandlerError> {
        let raw = response
            .raw_content()
            .ok_or_else(|| HandlerError::unmarshall("response body has not been loaded"))?;
        if self.verify_crc32 {
            check_crc32(response, raw)?;
        }
        let content = response.content().map_err(HandlerError::unmarshall)?;
        let result = self
            .unmarshaller
            .unmarshall(content)
            .map_err(HandlerError::Unmarshall)?;
        Ok(ServiceResponse {
            result,
            request_id: extract_request_id(response.headers()).map(str::to_string),
        })
    }
}
