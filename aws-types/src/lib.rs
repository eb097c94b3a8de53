/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Cross-service types shared by the AWS HTTP execution core: credentials, regions and the
//! time source used for request signing.

#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]

pub mod credentials;
pub mod region;
pub mod time;

pub use credentials::Credentials;
pub use region::Region;
