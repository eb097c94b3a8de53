/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Wire primitives and request/response contracts for the AWS HTTP execution core.
//!
//! - [`operation::Request`]: the mutable, service-level envelope for one logical call
//! - [`request::HttpRequest`] / [`response::HttpResponse`]: the wire form of each attempt
//! - [`response::HttpResponseHandler`]: pluggable conversion of a response into a typed value
//! - [`result::SdkError`] / [`result::SdkSuccess`]: the outcome of a call

#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]

pub mod body;
pub mod error;
pub mod operation;
pub mod query;
pub mod request;
pub mod response;
pub mod result;
pub mod retry;
