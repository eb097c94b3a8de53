/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The SDK `User-Agent`

/// `aws-sdk-rust/<version> os/<os> lang/rust`
pub fn default_user_agent() -> String {
    format!(
        "aws-sdk-rust/{} os/{} lang/rust",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

/// Appends `suffix` to `base` unless `base` already contains it
pub fn append_user_agent(base: &str, suffix: &str) -> String {
    let suffix = suffix.trim();
    if suffix.is_empty() || base.contains(suffix) {
        return base.to_string();
    }
    if base.is_empty() {
        return suffix.to_string();
    }
    format!("{} {}", base, suffix)
}
