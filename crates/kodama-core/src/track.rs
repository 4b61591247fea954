//! Debounced completion scheduling with staleness gating.
//!
//! [`ChangeTracker`] owns the only mutable state in the pipeline: the
//! last remembered [`CompletionContext`] and an epoch counter. Every
//! differing extraction bumps the epoch; debounce timers and in-flight
//! backend calls re-check the epoch before acting, so a response for a
//! superseded context is silently discarded rather than surfaced.
//! That staleness check is the system's cancellation substitute; the
//! underlying transport is never aborted.
//!
//! # State Machine
//!
//! ```text
//! +------+  differing non-null extraction   +-----------------+
//! | Idle | -------------------------------> | PendingDebounce |
//! +------+                                  +--------+--------+
//!    ^        delay elapsed, still current           |
//!    |   +---------+ <------------------------------ +
//!    |   | Loading |     (stale: discarded silently)
//!    |   +----+----+
//!    |        | success, still current
//!    |   +----+------+
//!    +-- | Presented |   any differing extraction, accept, or
//!        +-----------+   dismiss returns to Idle
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use kodama_types::{CompletionContext, CursorPosition};

use crate::llm::CompletionService;
use crate::text::byte_at_char;

/// The presentation collaborator: receives results, clear requests,
/// and displayable failures.
#[async_trait]
pub trait CompletionPresenter: Send + Sync {
    /// Show a generated result at the caret it was requested for.
    async fn present(&self, cursor: CursorPosition, result: String);
    /// Remove any currently shown result or loading state.
    async fn clear(&self);
    /// Show a failure state with a displayable message.
    async fn fail(&self, message: String);
}

/// Splice an accepted result into the cursor line.
///
/// Returns the new line text and the advanced caret column.
pub fn apply_completion(line: &str, column: usize, result: &str) -> (String, usize) {
    let split = byte_at_char(line, column);
    let mut applied = String::with_capacity(line.len() + result.len());
    applied.push_str(&line[..split]);
    applied.push_str(result);
    applied.push_str(&line[split..]);
    (applied, column + result.chars().count())
}

struct TrackState {
    last_context: Option<CompletionContext>,
    epoch: u64,
}

/// Debounces extraction results and gates backend calls on context
/// currency. One instance per active editor session.
pub struct ChangeTracker {
    service: Arc<dyn CompletionService>,
    presenter: Arc<dyn CompletionPresenter>,
    wait: Duration,
    state: Arc<Mutex<TrackState>>,
}

impl ChangeTracker {
    pub fn new(
        service: Arc<dyn CompletionService>,
        presenter: Arc<dyn CompletionPresenter>,
        wait: Duration,
    ) -> Self {
        Self {
            service,
            presenter,
            wait,
            state: Arc::new(Mutex::new(TrackState {
                last_context: None,
                epoch: 0,
            })),
        }
    }

    /// Feed one extraction result into the tracker.
    ///
    /// A context structurally equal to the remembered one is a no-op.
    /// Anything else clears the presenter, supersedes pending and
    /// in-flight work, and, for a non-null context, schedules a
    /// debounced completion call.
    pub fn on_edit(&self, analyzed: Option<CompletionContext>) {
        let epoch = {
            let mut state = self.state.lock();
            if state.last_context == analyzed {
                return;
            }
            state.epoch += 1;
            state.last_context = analyzed.clone();
            state.epoch
        };

        let presenter = self.presenter.clone();
        let Some(context) = analyzed else {
            tokio::spawn(async move {
                presenter.clear().await;
            });
            return;
        };

        let service = self.service.clone();
        let state = self.state.clone();
        let wait = self.wait;
        tokio::spawn(async move {
            presenter.clear().await;
            tokio::time::sleep(wait).await;
            if state.lock().epoch != epoch {
                // Superseded while debouncing: no request is sent.
                return;
            }
            match service.completion(&context.query).await {
                Ok(result) => {
                    if state.lock().epoch != epoch {
                        debug!("discarding stale completion result");
                        return;
                    }
                    presenter.present(context.cursor, result).await;
                }
                Err(err) => {
                    if state.lock().epoch != epoch {
                        return;
                    }
                    presenter.fail(err.to_string()).await;
                }
            }
        });
    }

    /// The user accepted the presented result.
    pub fn accept(&self) {
        self.reset();
    }

    /// The user dismissed the presented result.
    pub fn dismiss(&self) {
        self.reset();
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.epoch += 1;
        state.last_context = None;
    }
}
