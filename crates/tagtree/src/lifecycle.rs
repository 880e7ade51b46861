//! Construction lifecycle of a [`TaggedStore`](crate::TaggedStore).
//!
//! ```text
//! Uninitialized -> AttachingStorage -> IndexCreated  -> ContentStoreCreated  -> Ready
//!                                   -> IndexAttached -> ContentStoreAttached -> Ready
//! any non-terminal state -> Failed
//! ```
//!
//! The state is published through a `watch` channel, so a caller that
//! subscribes late still sees the current state. `Ready` and `Failed` are
//! terminal.

use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{TagStoreError, TagStoreResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    AttachingStorage,
    IndexCreated,
    IndexAttached,
    ContentStoreCreated,
    ContentStoreAttached,
    Ready,
    Failed(TagStoreError),
}

impl LifecycleState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::AttachingStorage => "attaching-storage",
            Self::IndexCreated => "index-created",
            Self::IndexAttached => "index-attached",
            Self::ContentStoreCreated => "content-store-created",
            Self::ContentStoreAttached => "content-store-attached",
            Self::Ready => "ready",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed(_))
    }

    /// Whether the index log is open.
    pub fn is_initialized(&self) -> bool {
        matches!(
            self,
            Self::IndexCreated
                | Self::IndexAttached
                | Self::ContentStoreCreated
                | Self::ContentStoreAttached
                | Self::Ready
        )
    }

    fn can_advance_to(&self, next: &LifecycleState) -> bool {
        use LifecycleState::*;
        match (self, next) {
            (Ready | Failed(_), _) => false,
            (_, Failed(_)) => true,
            (Uninitialized, AttachingStorage)
            | (AttachingStorage, IndexCreated | IndexAttached)
            | (IndexCreated, ContentStoreCreated)
            | (IndexAttached, ContentStoreAttached)
            | (ContentStoreCreated | ContentStoreAttached, Ready) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Owner side of the lifecycle channel.
pub(crate) struct Lifecycle {
    tx: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Uninitialized);
        Self { tx }
    }

    pub(crate) fn current(&self) -> LifecycleState {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Move to `next`, rejecting anything the state machine does not allow.
    pub(crate) fn advance(&self, next: LifecycleState) -> TagStoreResult<()> {
        let mut rejected = None;
        self.tx.send_if_modified(|state| {
            if state.can_advance_to(&next) {
                *state = next.clone();
                true
            } else {
                rejected = Some(state.name());
                false
            }
        });

        match rejected {
            Some(from) => Err(TagStoreError::InvalidTransition {
                from: from.to_string(),
                to: next.name().to_string(),
            }),
            None => {
                match &next {
                    LifecycleState::Failed(e) => warn!(error = %e, "tagged store failed"),
                    state => info!(state = %state, "tagged store lifecycle"),
                }
                Ok(())
            }
        }
    }

    /// Record a terminal failure. No-op if already terminal.
    pub(crate) fn fail(&self, error: TagStoreError) {
        let _ = self.advance(LifecycleState::Failed(error));
    }

    pub(crate) async fn wait_initialized(&self) -> TagStoreResult<()> {
        wait_until(self.subscribe(), LifecycleState::is_initialized).await
    }

    pub(crate) async fn wait_ready(&self) -> TagStoreResult<()> {
        wait_until(self.subscribe(), |s| *s == LifecycleState::Ready).await
    }
}

async fn wait_until(
    mut rx: watch::Receiver<LifecycleState>,
    reached: impl Fn(&LifecycleState) -> bool,
) -> TagStoreResult<()> {
    let state = rx
        .wait_for(|s| reached(s) || matches!(s, LifecycleState::Failed(_)))
        .await
        .map(|s| s.clone())
        .map_err(|_| TagStoreError::NotReady)?;
    match state {
        LifecycleState::Failed(e) => Err(e),
        _ => Ok(()),
    }
}
