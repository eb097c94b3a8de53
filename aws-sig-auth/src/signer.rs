/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Choosing and applying a request signer

use crate::clock_skew::ClockSkew;
use crate::sigv4::SigV4Signer;
use aws_types::region::{Region, DEFAULT_REGION};
use aws_types::time::SharedTimeSource;
use aws_types::Credentials;
use http::Uri;
use smithy_http::operation::Request;
use std::fmt::Debug;
use std::sync::Arc;

/// Failure to sign a request
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SigningError {
    /// The request has no endpoint to derive the `Host` from
    #[error("request has no endpoint, it can not be signed")]
    MissingEndpoint,
}

/// Computes an authentication signature for a request and attaches it in place.
pub trait Signer: Debug + Send + Sync {
    /// Signs `request` with `credentials`, adding the headers the signature depends on.
    fn sign(&self, request: &mut Request, credentials: &Credentials) -> Result<(), SigningError>;
}

/// Resolves the signer to use for an endpoint.
///
/// Some services sign differently per region, so the signer is looked up for every attempt
/// from the endpoint the attempt targets.
pub trait SignerProvider: Debug + Send + Sync {
    /// The signer for requests sent to `endpoint`, if requests to it are signed at all
    fn signer_for(&self, endpoint: &Uri) -> Option<Arc<dyn Signer>>;
}

/// Uses the same signer for every endpoint
#[derive(Debug, Clone)]
pub struct StaticSignerProvider(Arc<dyn Signer>);

impl StaticSignerProvider {
    /// Wraps a signer
    pub fn new(signer: impl Signer + 'static) -> Self {
        Self(Arc::new(signer))
    }
}

impl SignerProvider for StaticSignerProvider {
    fn signer_for(&self, _endpoint: &Uri) -> Option<Arc<dyn Signer>> {
        Some(self.0.clone())
    }
}

/// Builds a SigV4 signer for the region named by each endpoint's host.
///
/// `dynamodb.us-west-2.amazonaws.com` signs for `us-west-2`; `iam.amazonaws.com` and hosts
/// outside `amazonaws.com` sign for `us-east-1` unless a region override is set.
#[derive(Debug, Clone)]
pub struct SigV4SignerProvider {
    service: String,
    region_override: Option<Region>,
    clock_skew: ClockSkew,
    time_source: SharedTimeSource,
}

impl SigV4SignerProvider {
    /// Signs for `service`, deriving the region from the endpoint
    pub fn new(service: impl Into<String>) -> Self {
        SigV4SignerProvider {
            service: service.into(),
            region_override: None,
            clock_skew: ClockSkew::global(),
            time_source: SharedTimeSource::default(),
        }
    }

    /// Always sign for `region`
    pub fn with_region(mut self, region: Region) -> Self {
        self.region_override = Some(region);
        self
    }

    /// Uses `clock_skew` instead of the process-wide offset
    pub fn with_clock_skew(mut self, clock_skew: ClockSkew) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    /// Uses `time_source` instead of the system clock
    pub fn with_time_source(mut self, time_source: SharedTimeSource) -> Self {
        self.time_source = time_source;
        self
    }
}

impl SignerProvider for SigV4SignerProvider {
    fn signer_for(&self, endpoint: &Uri) -> Option<Arc<dyn Signer>> {
        let region = match &self.region_override {
            Some(region) => region.clone(),
            None => endpoint
                .host()
                .and_then(parse_region_name)
                .unwrap_or(DEFAULT_REGION),
        };
        let signer = SigV4Signer::new(self.service.clone(), region)
            .with_clock_skew(self.clock_skew.clone())
            .with_time_source(self.time_source.clone());
        Some(Arc::new(signer))
    }
}

const AMAZONAWS_SUFFIX: &str = ".amazonaws.com";

/// Extracts the region from a `service.region.amazonaws.com` host name
fn parse_region_name(host: &str) -> Option<Region> {
    let host = host.to_ascii_lowercase();
    let prefix = host.strip_suffix(AMAZONAWS_SUFFIX)?;
    let mut labels = prefix.rsplit('.');
    let last = labels.next()?;
    // `service.amazonaws.com` carries no region
    labels.next()?;
    Some(Region::new(last.to_string()))
}
