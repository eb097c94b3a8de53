/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! AWS Signature Authentication Package
//!
//! Signers are resolved per endpoint through a [`SignerProvider`](signer::SignerProvider) and
//! sign a [`Request`](smithy_http::operation::Request) in place. Signing time is corrected by the
//! process-wide [`ClockSkew`](clock_skew::ClockSkew) offset.

#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]

pub mod clock_skew;
pub mod signer;
pub mod sigv4;
