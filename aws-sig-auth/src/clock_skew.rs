/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Clock skew correction shared by every signer.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

static GLOBAL: Lazy<ClockSkew> = Lazy::new(ClockSkew::new);

/// Difference, in seconds, between the local clock and the clock of the services being called.
///
/// A positive offset means the local clock is ahead: signers subtract the offset from the
/// current time. The value is last-write-wins and shared by every clone of the handle.
///
/// [`ClockSkew::global`] is the process-wide instance used by default. Tests construct isolated
/// instances with [`ClockSkew::new`].
#[derive(Clone, Debug, Default)]
pub struct ClockSkew {
    offset: Arc<AtomicI64>,
}

impl ClockSkew {
    /// Creates a new, independent offset starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide offset
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    /// Current offset in seconds
    pub fn get(&self) -> i64 {
        self.offset.load(Ordering::Relaxed)
    }

    /// Replaces the offset
    pub fn set(&self, seconds: i64) {
        self.offset.store(seconds, Ordering::Relaxed);
    }

    /// Resets the offset to zero
    pub fn reset(&self) {
        self.set(0);
    }
}

#[cfg(test)]
mod test {
    use super::ClockSkew;

    #[test]
    fn clones_share_state() {
        let skew = ClockSkew::new();
        let other = skew.clone();
        other.set(900);
        assert_eq!(skew.get(), 900);
        skew.reset();
        assert_eq!(other.get(), 0);
    }

    #[test]
    fn new_instances_are_isolated() {
        let local = ClockSkew::new();
        local.set(-30);
        assert_eq!(ClockSkew::new().get(), 0);
    }
}
