//! Racing two upstream candidates.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{HermodError, Result};

/// Which candidate produced the race result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    /// The model the routing decision asked for.
    Primary,
    /// The cheap-tier challenger.
    Challenger,
    /// Both failed.
    None,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Winner::Primary => "primary",
            Winner::Challenger => "cheap",
            Winner::None => "none",
        }
    }
}

fn spawn_cancellable<T, F>(token: CancellationToken, fut: F) -> JoinHandle<Result<T>>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => Err(HermodError::Stream("cancelled by race winner".to_string())),
            result = fut => result,
        }
    })
}

fn flatten<T>(joined: std::result::Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    joined.unwrap_or_else(|e| Err(HermodError::Stream(format!("upstream task failed: {e}"))))
}

/// Run both candidates concurrently and return the first success.
///
/// The loser is cancelled and awaited before returning, so no upstream
/// call outlives the race. Dropping the race future cancels both
/// candidates. When both fail the error that arrived last is returned.
pub(crate) async fn race<T, P, C>(primary: P, challenger: C) -> (Result<T>, Winner)
where
    T: Send + 'static,
    P: Future<Output = Result<T>> + Send + 'static,
    C: Future<Output = Result<T>> + Send + 'static,
{
    let token = CancellationToken::new();
    let _cancel_on_drop = token.clone().drop_guard();
    let mut primary = spawn_cancellable(token.clone(), primary);
    let mut challenger = spawn_cancellable(token.clone(), challenger);
    let mut primary_done = false;
    let mut challenger_done = false;
    let mut last_err = None;

    while !(primary_done && challenger_done) {
        let (result, winner) = tokio::select! {
            joined = &mut primary, if !primary_done => {
                primary_done = true;
                (flatten(joined), Winner::Primary)
            }
            joined = &mut challenger, if !challenger_done => {
                challenger_done = true;
                (flatten(joined), Winner::Challenger)
            }
        };
        match result {
            Ok(value) => {
                token.cancel();
                if !primary_done {
                    let _ = primary.await;
                }
                if !challenger_done {
                    let _ = challenger.await;
                }
                debug!(winner = winner.as_str(), "race decided");
                return (Ok(value), winner);
            }
            Err(e) => {
                debug!(candidate = winner.as_str(), error = %e, "race candidate failed");
                last_err = Some(e);
            }
        }
    }

    let err = last_err.unwrap_or_else(|| HermodError::Http("race had no candidates".to_string()));
    (Err(err), Winner::None)
}
