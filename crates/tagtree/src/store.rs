use std::sync::Arc;

use async_trait::async_trait;
use tagtree_drive::{Checkout, VersionedStore};
use tagtree_index::{IndexError, TagIndex};
use tagtree_log::LogContainer;
use tagtree_sync::{ReplicateOptions, ReplicationSession, SessionSummary, SettleHook};
use tagtree_types::{LogId, Version};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{watch, OnceCell};
use tokio::task::AbortHandle;
use tracing::{debug, info};

use crate::bootstrap::BootstrapRecord;
use crate::config::{ReadyPolicy, TaggedStoreConfig};
use crate::error::{TagStoreError, TagStoreResult};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::semver::SemVer;

/// A drive plus a tag index that names its versions.
///
/// The index log's header carries a [`BootstrapRecord`] pointing at the
/// drive's content log, so [`TaggedStore::attach`] needs nothing but the
/// index id. Handles are cheap to clone and share one store.
#[derive(Clone)]
pub struct TaggedStore {
    inner: Arc<StoreInner>,
    _attach_task: Arc<AttachTask>,
}

/// Aborts the background attachment once the last handle is dropped.
struct AttachTask(Option<AbortHandle>);

impl Drop for AttachTask {
    fn drop(&mut self) {
        if let Some(handle) = &self.0 {
            handle.abort();
        }
    }
}

struct StoreInner {
    container: LogContainer,
    lifecycle: Lifecycle,
    index: TagIndex,
    bootstrap: OnceCell<BootstrapRecord>,
    drive: OnceCell<Arc<VersionedStore>>,
    policy: ReadyPolicy,
}

impl TaggedStore {
    /// Create a new drive and a new index that points at it.
    pub async fn create(config: TaggedStoreConfig) -> TagStoreResult<Self> {
        let lifecycle = Lifecycle::new();
        let container = config.storage.unwrap_or_else(LogContainer::in_memory);
        container.ready().await?;
        lifecycle.advance(LifecycleState::AttachingStorage)?;

        let drive = VersionedStore::create(&container).await?;
        let bootstrap = BootstrapRecord::new(drive.content_log_id(), config.user_data);
        let index_log = container.create_log().await?;
        let index = TagIndex::create(index_log, Some(bootstrap.encode()?)).await?;
        lifecycle.advance(LifecycleState::IndexCreated)?;

        let inner = StoreInner {
            container,
            lifecycle,
            index,
            bootstrap: OnceCell::new_with(Some(bootstrap)),
            drive: OnceCell::new_with(Some(Arc::new(drive))),
            policy: config.ready_policy,
        };
        inner.lifecycle.advance(LifecycleState::ContentStoreCreated)?;
        inner.lifecycle.advance(LifecycleState::Ready)?;

        info!(index = %inner.index.id().short_id(), "created tagged store");
        Ok(Self {
            inner: Arc::new(inner),
            _attach_task: Arc::new(AttachTask(None)),
        })
    }

    /// Attach to an existing store by its index id.
    ///
    /// Returns once the index log is open. Reading the bootstrap record and
    /// attaching the drive continue in the background; wait on
    /// [`ready`](Self::ready) for them. On a fresh replica that means
    /// running [`replicate`](Self::replicate) with a peer that has the data.
    pub async fn attach(index_id: LogId, config: TaggedStoreConfig) -> TagStoreResult<Self> {
        let lifecycle = Lifecycle::new();
        let container = config.storage.unwrap_or_else(LogContainer::in_memory);
        container.ready().await?;
        lifecycle.advance(LifecycleState::AttachingStorage)?;

        let log = match container.open_log(&index_id).await {
            Ok(log) => log,
            Err(e) => {
                let e = TagStoreError::from(e);
                lifecycle.fail(e.clone());
                return Err(e);
            }
        };
        lifecycle.advance(LifecycleState::IndexAttached)?;

        let inner = Arc::new(StoreInner {
            container,
            lifecycle,
            index: TagIndex::attach(log),
            bootstrap: OnceCell::new(),
            drive: OnceCell::new(),
            policy: config.ready_policy,
        });

        let task = {
            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                if let Err(e) = inner.finish_attach().await {
                    inner.lifecycle.fail(e);
                }
            })
        };

        debug!(index = %index_id.short_id(), "attaching tagged store");
        Ok(Self {
            inner,
            _attach_task: Arc::new(AttachTask(Some(task.abort_handle()))),
        })
    }

    /// [`attach`](Self::attach), then wait until ready.
    pub async fn open(index_id: LogId, config: TaggedStoreConfig) -> TagStoreResult<Self> {
        let store = Self::attach(index_id, config).await?;
        store.ready().await?;
        Ok(store)
    }

    // ---- Lifecycle ----

    /// Resolves once the index log is open.
    pub async fn initialized(&self) -> TagStoreResult<()> {
        self.inner.lifecycle.wait_initialized().await
    }

    /// Resolves once the drive is attached, or with the attachment error.
    pub async fn ready(&self) -> TagStoreResult<()> {
        self.inner.lifecycle.wait_ready().await
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lifecycle.current()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.inner.lifecycle.subscribe()
    }

    // ---- Identity ----

    pub fn index_id(&self) -> LogId {
        self.inner.index.id()
    }

    pub fn container(&self) -> &LogContainer {
        &self.inner.container
    }

    pub async fn bootstrap(&self) -> TagStoreResult<BootstrapRecord> {
        self.gate().await?;
        self.inner
            .bootstrap
            .get()
            .cloned()
            .ok_or(TagStoreError::NotReady)
    }

    /// The caller data recorded at creation, if any.
    pub async fn user_data(&self) -> TagStoreResult<Option<Vec<u8>>> {
        Ok(self.bootstrap().await?.user_data)
    }

    pub async fn drive(&self) -> TagStoreResult<Arc<VersionedStore>> {
        self.gate().await?;
        self.inner.drive().cloned()
    }

    // ---- Tags ----

    /// Point `tag` at `version`, replacing any earlier assignment.
    pub async fn put(&self, tag: &str, version: Version) -> TagStoreResult<()> {
        self.gate().await?;
        self.inner.index.put(tag, version).await?;
        Ok(())
    }

    /// Point `tag` at the drive's current version and return that version.
    pub async fn put_current(&self, tag: &str) -> TagStoreResult<Version> {
        self.gate().await?;
        let version = self.inner.drive()?.version();
        self.inner.index.put(tag, version).await?;
        Ok(version)
    }

    pub async fn get(&self, tag: &str) -> TagStoreResult<Option<Version>> {
        self.gate().await?;
        Ok(self.inner.index.get(tag).await?)
    }

    /// The drive as it was at the version `tag` names.
    pub async fn checkout_at_tag(&self, tag: &str) -> TagStoreResult<Option<Checkout>> {
        let Some(version) = self.get(tag).await? else {
            return Ok(None);
        };
        let checkout = self.inner.drive()?.checkout(version).await?;
        Ok(Some(checkout))
    }

    /// All tags in name order.
    pub async fn tags(&self) -> TagStoreResult<Vec<(String, Version)>> {
        self.gate().await?;
        Ok(self.inner.index.entries().await?)
    }

    pub async fn tags_with_prefix(&self, prefix: &str) -> TagStoreResult<Vec<(String, Version)>> {
        self.gate().await?;
        Ok(self.inner.index.entries_with_prefix(prefix).await?)
    }

    /// Remove `tag`. Returns whether it was set.
    pub async fn delete_tag(&self, tag: &str) -> TagStoreResult<bool> {
        self.gate().await?;
        Ok(self.inner.index.delete(tag).await?)
    }

    // ---- Releases ----

    /// Tag the current drive version as `release`.
    pub async fn put_release(&self, release: &SemVer) -> TagStoreResult<Version> {
        self.put_current(&release.tag_name()).await
    }

    /// Tags named like `v1.2.3`, lowest precedence first.
    pub async fn releases(&self) -> TagStoreResult<Vec<(SemVer, Version)>> {
        let mut out: Vec<(SemVer, Version)> = self
            .tags_with_prefix("v")
            .await?
            .into_iter()
            .filter_map(|(tag, version)| SemVer::parse(&tag).ok().map(|s| (s, version)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    pub async fn latest_release(&self) -> TagStoreResult<Option<(SemVer, Version)>> {
        Ok(self.releases().await?.pop())
    }

    // ---- Replication ----

    /// Replicate every log in this store's container with one peer.
    ///
    /// Waits for the index log to be open, not for readiness, since an
    /// attaching store needs the session to become ready at all. Between
    /// rounds the session lets the attachment task run until it finishes or
    /// blocks on an entry the peer has to supply.
    pub async fn replicate<T>(
        &self,
        is_initiator: bool,
        io: T,
        options: ReplicateOptions,
    ) -> TagStoreResult<SessionSummary>
    where
        T: AsyncRead + AsyncWrite + Send,
    {
        self.initialized().await?;
        let session = ReplicationSession::new(self.inner.container.clone(), is_initiator, options);
        let hook = AttachSettle {
            lifecycle: self.inner.lifecycle.subscribe(),
        };
        let summary = session.run_with(io, &hook).await?;
        debug!(
            index = %self.index_id().short_id(),
            state = %self.state(),
            rounds = summary.rounds,
            "replicated tagged store"
        );
        Ok(summary)
    }

    async fn gate(&self) -> TagStoreResult<()> {
        match self.inner.policy {
            ReadyPolicy::Wait => self.ready().await,
            ReadyPolicy::FailFast => match self.state() {
                LifecycleState::Ready => Ok(()),
                LifecycleState::Failed(e) => Err(e),
                _ => Err(TagStoreError::NotReady),
            },
        }
    }
}

impl StoreInner {
    fn drive(&self) -> TagStoreResult<&Arc<VersionedStore>> {
        self.drive.get().ok_or(TagStoreError::NotReady)
    }

    async fn finish_attach(&self) -> TagStoreResult<()> {
        let header = self.index.header().await.map_err(|e| match e {
            IndexError::Log(e) => TagStoreError::from(e),
            other => TagStoreError::CorruptBootstrap(other.to_string()),
        })?;
        let bootstrap = BootstrapRecord::from_header(header)?;
        debug!(
            index = %self.index.id().short_id(),
            content = %bootstrap.content_log_id.short_id(),
            "read bootstrap record"
        );

        let drive = VersionedStore::attach(&self.container, &bootstrap.content_log_id).await?;
        self.lifecycle.advance(LifecycleState::ContentStoreAttached)?;
        self.bootstrap.set(bootstrap).ok();
        self.drive.set(Arc::new(drive)).ok();
        self.lifecycle.advance(LifecycleState::Ready)?;

        info!(index = %self.index.id().short_id(), "attached tagged store");
        Ok(())
    }
}

impl std::fmt::Debug for TaggedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaggedStore")
            .field("index", &self.inner.index.id().short_id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Settles a round once attachment is over or waiting on the peer.
struct AttachSettle {
    lifecycle: watch::Receiver<LifecycleState>,
}

#[async_trait]
impl SettleHook for AttachSettle {
    async fn settle(&self, container: &LogContainer) {
        let mut lifecycle = self.lifecycle.clone();
        let mut activity = container.activity();
        loop {
            if lifecycle.borrow_and_update().is_terminal() {
                return;
            }
            if container.has_stalled_reads().await {
                return;
            }
            tokio::select! {
                changed = lifecycle.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                changed = activity.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
