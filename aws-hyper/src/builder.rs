/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Type-state builder for [`Client`](crate::Client)

use crate::config::ClientConfiguration;
use crate::conn::TowerConnector;
use crate::factory::RequestFactory;
use crate::hyper_client::HyperClient;
use crate::sleep::{AsyncSleep, TokioSleep};
use crate::Client;
use aws_sig_auth::clock_skew::ClockSkew;
use aws_types::time::{SharedTimeSource, TimeSource};
use smithy_http::error::BoxError;
use std::sync::Arc;

/// A builder that provides more customization options when constructing a [`Client`].
///
/// To start, call [`Builder::new`]. Then, chain the method calls to configure the `Builder`.
/// When configured to your liking, call [`Builder::build`]. The individual methods have additional
/// documentation.
#[derive(Clone, Debug)]
pub struct Builder<C = ()> {
    connector: C,
    config: ClientConfiguration,
    sleep_impl: Option<Arc<dyn AsyncSleep>>,
    clock_skew: Option<ClockSkew>,
    time_source: Option<SharedTimeSource>,
}

impl Default for Builder<()> {
    fn default() -> Self {
        Builder {
            connector: (),
            config: ClientConfiguration::default(),
            sleep_impl: None,
            clock_skew: None,
            time_source: None,
        }
    }
}

impl Builder<()> {
    /// Construct a new builder.
    ///
    /// The builder has no [connector](Builder::connector) until one is set, so a connector
    /// must be chosen before [`Builder::build`] yields a usable client.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C> Builder<C> {
    /// Specify the connector for the eventual client to use.
    ///
    /// The connector dictates how requests are turned into responses. Normally, this would entail
    /// sending the request to some kind of remote server, but in certain settings it's useful to
    /// be able to use a custom connector instead, such as to mock the network for tests.
    ///
    /// If you just want to specify a function from request to response instead, use
    /// [`Builder::map_connector`].
    pub fn connector<C2>(self, connector: C2) -> Builder<C2> {
        Builder {
            connector,
            config: self.config,
            sleep_impl: self.sleep_impl,
            clock_skew: self.clock_skew,
            time_source: self.time_source,
        }
    }

    /// Use a function that directly maps each request to a response as a connector.
    ///
    /// ```no_run
    /// use aws_hyper::Builder;
    /// use smithy_http::body::SdkBody;
    /// let client = Builder::new()
    ///   .map_connector(|req: http::Request<SdkBody>| {
    ///     async move {
    ///       Ok::<_, std::convert::Infallible>(http::Response::new(SdkBody::empty()))
    ///     }
    ///   })
    ///   .build();
    /// ```
    pub fn map_connector<F>(self, map: F) -> Builder<TowerConnector<tower::util::ServiceFn<F>>> {
        self.connector(TowerConnector::new(tower::service_fn(map)))
    }

    /// Use the hyper-based transport, configured from this builder's
    /// [`ClientConfiguration`].
    ///
    /// Set the configuration with [`Builder::config`] first: the transport reads its timeouts,
    /// proxy, TLS and pool settings when it is created.
    pub fn https(self) -> Result<Builder<HyperClient>, BoxError> {
        let connector = HyperClient::new(&self.config)?;
        Ok(self.connector(connector))
    }

    /// Replace the client configuration
    pub fn config(mut self, config: ClientConfiguration) -> Self {
        self.config = config;
        self
    }

    /// Use `sleep_impl` to wait between retries. Defaults to tokio's timer.
    pub fn sleep_impl(mut self, sleep_impl: impl AsyncSleep + 'static) -> Self {
        self.sleep_impl = Some(Arc::new(sleep_impl));
        self
    }

    /// Record clock skew corrections in `clock_skew` instead of the process-wide offset.
    ///
    /// Signers only pick up a correction if they read the same handle.
    pub fn clock_skew(mut self, clock_skew: ClockSkew) -> Self {
        self.clock_skew = Some(clock_skew);
        self
    }

    /// Use `time_source` as the local clock when computing clock skew
    pub fn time_source(mut self, time_source: impl TimeSource + 'static) -> Self {
        self.time_source = Some(SharedTimeSource::new(time_source));
        self
    }

    /// Build a client.
    pub fn build(self) -> Client<C> {
        Client {
            connector: self.connector,
            config: self.config,
            sleep_impl: self
                .sleep_impl
                .unwrap_or_else(|| Arc::new(TokioSleep::new())),
            clock_skew: self.clock_skew.unwrap_or_else(ClockSkew::global),
            time_source: self.time_source.unwrap_or_default(),
            factory: RequestFactory::new(),
        }
    }
}
