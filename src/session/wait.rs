//! Readiness-wait strategies for the session handshake.
//!
//! Both strategies answer the same question, "has the surface flipped its
//! readiness flag within the deadline?", so the controller never branches on
//! the embedding environment itself.

use crate::error::{Error, Result};
use chromiumoxide::page::Page;
use serde_json::Value;
use std::time::Duration;

/// How [`Space::open`](crate::session::Space::open) waits for the remote
/// readiness flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitStrategy {
    /// Tight re-check loop cancelled as one unit when the handshake deadline
    /// passes.
    #[default]
    Condition,
    /// Fixed-interval sleeps with an explicit deadline check between them.
    /// For constrained embeddings (notebook kernels, sandboxed containers)
    /// that cannot hold a blocking wait; also switches the browser launch to
    /// no-sandbox arguments.
    Polling { interval: Duration },
}

const CONDITION_RECHECK: Duration = Duration::from_millis(100);

pub(crate) async fn await_ready(
    page: &Page,
    flag: &str,
    timeout: Duration,
    strategy: WaitStrategy,
) -> Result<()> {
    let expression = format!("window.{flag} === true");
    match strategy {
        WaitStrategy::Condition => {
            tokio::time::timeout(timeout, recheck_until_set(page, &expression, CONDITION_RECHECK))
                .await
                .map_err(|_| Error::HandshakeTimeout {
                    flag: flag.to_string(),
                    timeout,
                })?
        }
        WaitStrategy::Polling { interval } => {
            let started = tokio::time::Instant::now();
            loop {
                if flag_is_set(page, &expression).await? {
                    return Ok(());
                }
                if started.elapsed() >= timeout {
                    return Err(Error::HandshakeTimeout {
                        flag: flag.to_string(),
                        timeout,
                    });
                }
                tracing::debug!(flag, "readiness flag not set yet");
                tokio::time::sleep(interval).await;
            }
        }
    }
}

async fn recheck_until_set(page: &Page, expression: &str, interval: Duration) -> Result<()> {
    loop {
        if flag_is_set(page, expression).await? {
            return Ok(());
        }
        tokio::time::sleep(interval).await;
    }
}

async fn flag_is_set(page: &Page, expression: &str) -> Result<bool> {
    let outcome = page
        .evaluate(expression)
        .await
        .map_err(|err| Error::Automation(err.to_string()))?;
    Ok(outcome.value().and_then(Value::as_bool).unwrap_or(false))
}
