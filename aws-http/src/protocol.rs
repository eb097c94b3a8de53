/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Request conventions of the AWS JSON RPC protocols

use smithy_http::operation::Request;

/// Header naming the operation of a JSON RPC call
pub const X_AMZ_TARGET: &str = "X-Amz-Target";

const CONTENT_TYPE: &str = "Content-Type";

/// Version of the AWS JSON protocol a service speaks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JsonVersion {
    /// `awsJson1_0`, used by DynamoDB among others
    V1_0,
    /// `awsJson1_1`
    V1_1,
}

impl JsonVersion {
    /// The `Content-Type` of requests in this protocol version
    pub fn content_type(self) -> &'static str {
        match self {
            JsonVersion::V1_0 => "application/x-amz-json-1.0",
            JsonVersion::V1_1 => "application/x-amz-json-1.1",
        }
    }
}

/// `<ServiceId>_<ApiVersion>.<Operation>`, eg. `DynamoDB_20120810.ListTables`
pub fn amz_target(service_id: &str, api_version: &str, operation: &str) -> String {
    format!("{}_{}.{}", service_id, api_version, operation)
}

/// Sets `X-Amz-Target`, and the JSON `Content-Type` unless one is already present
pub fn prepare_json_request(request: &mut Request, target: impl Into<String>, version: JsonVersion) {
    request.add_header(X_AMZ_TARGET, target);
    if request.header_ignore_case(CONTENT_TYPE).is_none() {
        request.add_header(CONTENT_TYPE, version.content_type());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use http::Method;

    #[test]
    fn target_header_format() {
        assert_eq!(
            amz_target("DynamoDB", "20120810", "ListTables"),
            "DynamoDB_20120810.ListTables"
        );
    }

    #[test]
    fn json_request_keeps_explicit_content_type() {
        let mut request = Request::new("DynamoDB", Method::POST);
        prepare_json_request(
            &mut request,
            amz_target("DynamoDB", "20120810", "ListTables"),
            JsonVersion::V1_0,
        );
        assert_eq!(
            request.header("X-Amz-Target"),
            Some("DynamoDB_20120810.ListTables")
        );
        assert_eq!(
            request.header("Content-Type"),
            Some("application/x-amz-json-1.0")
        );

        let mut request =
            Request::new("OpsWorksCM", Method::POST).with_header("content-type", "text/plain");
        prepare_json_request(&mut request, "OpsWorksCM_V2016_11_01.ListTags", JsonVersion::V1_1);
        assert_eq!(request.header("Content-Type"), None);
        assert_eq!(request.header("content-type"), Some("text/plain"));
    }
}
