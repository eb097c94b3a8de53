/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! AWS credentials and the providers that hand them out.

use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// AWS SDK Credentials
///
/// An opaque struct representing credentials that may be used in an AWS SDK, modeled on
/// the [CRT credentials implementation](https://github.com/awslabs/aws-c-auth/blob/main/source/credentials.c).
///
/// Credentials uses an interior Arc so that clones share one allocation.
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials(Arc<Inner>);

#[derive(Clone, Eq, PartialEq)]
struct Inner {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
    provider_name: &'static str,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut creds = f.debug_struct("Credentials");
        creds
            .field("provider_name", &self.0.provider_name)
            .field("access_key_id", &self.0.access_key_id)
            .field("secret_access_key", &"** redacted **");
        if self.0.session_token.is_some() {
            creds.field("session_token", &"** redacted **");
        }
        creds.finish()
    }
}

const STATIC_CREDENTIALS: &str = "Static";

impl Credentials {
    /// Creates credentials, naming the provider they came from.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
        provider_name: &'static str,
    ) -> Self {
        Credentials(Arc::new(Inner {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
            provider_name,
        }))
    }

    /// Creates static credentials from hardcoded keys.
    pub fn from_keys(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self::new(
            access_key_id,
            secret_access_key,
            session_token,
            STATIC_CREDENTIALS,
        )
    }

    /// Returns the access key ID.
    pub fn access_key_id(&self) -> &str {
        &self.0.access_key_id
    }

    /// Returns the secret access key.
    pub fn secret_access_key(&self) -> &str {
        &self.0.secret_access_key
    }

    /// Returns the session token, if any.
    pub fn session_token(&self) -> Option<&str> {
        self.0.session_token.as_deref()
    }

    /// Returns the name of the provider that created these credentials.
    pub fn provider_name(&self) -> &'static str {
        self.0.provider_name
    }
}

/// Failure to load credentials from a provider.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CredentialsError {
    /// The provider is not configured with any credentials
    #[error("no credentials were available from the provider")]
    CredentialsNotLoaded,

    /// The provider failed while loading credentials
    #[error("unexpected credentials error")]
    Unhandled(#[source] Box<dyn Error + Send + Sync + 'static>),
}

/// Result of a credentials lookup
pub type CredentialsResult = Result<Credentials, CredentialsError>;

/// Source of AWS credentials
pub trait ProvideCredentials: Send + Sync + Debug {
    /// Returns the credentials to use for a request
    fn provide_credentials(&self) -> CredentialsResult;
}

impl ProvideCredentials for Credentials {
    fn provide_credentials(&self) -> CredentialsResult {
        Ok(self.clone())
    }
}

/// Credentials provider that can be cloned cheaply and shared across clients
#[derive(Clone, Debug)]
pub struct SharedCredentialsProvider(Arc<dyn ProvideCredentials>);

impl SharedCredentialsProvider {
    /// Wraps a provider
    pub fn new(provider: impl ProvideCredentials + 'static) -> Self {
        Self(Arc::new(provider))
    }
}

impl ProvideCredentials for SharedCredentialsProvider {
    fn provide_credentials(&self) -> CredentialsResult {
        self.0.provide_credentials()
    }
}
