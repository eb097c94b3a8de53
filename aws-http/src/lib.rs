/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! AWS-specific HTTP behaviors: JSON protocol response handlers, response checksums, retry
//! classification of AWS error codes, and the SDK user agent.

#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]

pub mod json;
pub mod json_error;
pub mod protocol;
pub mod retry_utils;
pub mod user_agent;

use http::HeaderMap;

/// Extracts the request id from response headers
pub(crate) fn extract_request_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-amzn-requestid")
        .or_else(|| headers.get("x-amz-request-id"))
        .and_then(|value| value.to_str().ok())
}
