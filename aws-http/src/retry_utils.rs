/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Classification of AWS error codes for retry decisions

const THROTTLING_ERRORS: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ProvisionedThroughputExceededException",
    "SlowDown",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "BandwidthLimitExceeded",
    "RequestThrottled",
];

const CLOCK_SKEW_ERRORS: &[&str] = &[
    "RequestTimeTooSkewed",
    "RequestExpired",
    "InvalidSignatureException",
    "SignatureDoesNotMatch",
    "AuthFailure",
    "RequestInTheFuture",
];

/// True if the service throttled the request, either by error code or with a `429`
pub fn is_throttling_error(code: Option<&str>, status: u16) -> bool {
    status == 429 || code.map(|code| THROTTLING_ERRORS.contains(&code)).unwrap_or(false)
}

/// True if the service rejected the request because the client clock is off
pub fn is_clock_skew_error(code: Option<&str>) -> bool {
    code.map(|code| CLOCK_SKEW_ERRORS.contains(&code))
        .unwrap_or(false)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn throttling_by_code_or_status() {
        assert!(is_throttling_error(Some("ThrottlingException"), 400));
        assert!(is_throttling_error(
            Some("ProvisionedThroughputExceededException"),
            400
        ));
        assert!(is_throttling_error(None, 429));
        assert!(!is_throttling_error(Some("ValidationException"), 400));
        assert!(!is_throttling_error(None, 500));
    }

    #[test]
    fn clock_skew_codes() {
        assert!(is_clock_skew_error(Some("RequestTimeTooSkewed")));
        assert!(is_clock_skew_error(Some("InvalidSignatureException")));
        assert!(!is_clock_skew_error(Some("AccessDeniedException")));
        assert!(!is_clock_skew_error(None));
    }
}
