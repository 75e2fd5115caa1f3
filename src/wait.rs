// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Bounded polling.
//!
//! Every wait in the workflow goes through [`wait_until`], whether the
//! source of truth is the rendered console page or the filesystem.

use crate::error::{Error, Result};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// Timeout tiers used by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Ordinary page transitions.
    pub page: Duration,
    /// Remote certificate generation, which is much slower than a page load.
    pub issuance: Duration,
    /// Downloaded certificate landing on disk.
    pub download: Duration,
    /// Delay between predicate checks.
    pub poll: Duration,
}

/// Poll `predicate` until it returns `Ok(true)` or `timeout` elapses.
///
/// The predicate is always evaluated at least once, so a condition that
/// already holds succeeds even with a zero timeout. Errors from the predicate
/// abort the wait immediately.
pub fn wait_until<F>(
    waiting_for: &str,
    timeout: Duration,
    poll: Duration,
    mut predicate: F,
) -> Result<()>
where
    F: FnMut() -> Result<bool>,
{
    let start = Instant::now();

    loop {
        if predicate()? {
            return Ok(());
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(Error::TimedOut {
                waiting_for: waiting_for.to_string(),
                seconds: whole_seconds(timeout),
            });
        }

        thread::sleep(poll.min(timeout - elapsed));
    }
}

/// Block until `path` exists.
pub fn wait_for_file(path: &Path, timeout: Duration, poll: Duration) -> Result<()> {
    wait_until(
        &format!("file {}", path.display()),
        timeout,
        poll,
        || Ok(path.exists()),
    )
}

/// Seconds reported for a timeout, rounded up so sub-second limits never read as 0s.
fn whole_seconds(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}
