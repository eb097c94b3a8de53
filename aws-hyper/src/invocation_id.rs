/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Per-call invocation ids

/// Header carrying the invocation id, identical on every attempt of a call
pub const INVOCATION_ID_HEADER: &str = "aws-sdk-invocation-id";

/// A random (v4) UUID identifying one call
pub fn new_invocation_id() -> String {
    uuid::Builder::from_random_bytes(fastrand::u128(..).to_le_bytes())
        .into_uuid()
        .to_string()
}

#[cfg(test)]
mod test {
    use super::new_invocation_id;

    #[test]
    fn invocation_ids_are_v4_uuids() {
        let id = new_invocation_id();
        let parsed = uuid::Uuid::parse_str(&id).expect("valid uuid");
        assert_eq!(parsed.get_version_num(), 4);
        assert_ne!(id, new_invocation_id());
    }
}
