use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::diff::diff;
use super::diff::Snapshot;
use super::event::EventDispatcher;
use super::source::ConfigSource;
use super::source::FileSource;
use super::watcher::scan_namespace;
use super::watcher::WatchLoop;
use crate::metrics::SYNC_WRITES;
use crate::EtcdClient;
use crate::KvStore;
use crate::Result;
use crate::Settings;
use crate::WatchConfig;
use crate::WatchError;

/// Outcome of one [`Configurator::sync`] run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Keys written to the remote store
    pub puts: Vec<String>,
    /// Keys removed from the remote store
    pub deletes: Vec<String>,
    /// Whether an extra watch tick ran after the writes
    pub ticked: bool,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}

/// Mirrors one namespace of a remote key-value store
///
/// Owns at most one watch loop. [`listen`](Self::listen) seeds the dispatcher
/// with the full namespace and then reports changes every interval;
/// [`sync`](Self::sync) makes the namespace match a local config source.
///
/// # Example
///
/// ```ignore
/// let configurator = Configurator::<EtcdClient>::connect(&Settings::load(None)?).await?;
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
/// configurator.listen(tx).await?;
///
/// configurator.sync("config/app.toml").await?;
/// while let Some(event) = rx.recv().await {
///     println!("{:?}", event);
/// }
/// ```
pub struct Configurator<S: KvStore> {
    store: Arc<S>,
    config: WatchConfig,
    source: Arc<dyn ConfigSource>,
    listener: Mutex<Option<WatchLoop<S>>>,
}

impl Configurator<EtcdClient> {
    /// Connects (and authenticates) to the configured etcd gateway
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let client = EtcdClient::connect(&settings.etcd).await?;
        Ok(Self::new(Arc::new(client), settings.watch.clone()))
    }
}

impl<S: KvStore> Configurator<S> {
    pub fn new(
        store: Arc<S>,
        config: WatchConfig,
    ) -> Self {
        Self {
            store,
            config,
            source: Arc::new(FileSource),
            listener: Mutex::new(None),
        }
    }

    /// Replaces the local source read by `sync`
    pub fn with_source(
        mut self,
        source: impl ConfigSource,
    ) -> Self {
        self.source = Arc::new(source);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Starts the watch loop
    ///
    /// Emits one `Put` per key currently under the namespace before returning,
    /// then reports changes every `interval_secs`.
    ///
    /// # Errors
    /// - [`WatchError::AlreadyActive`] if a loop is running
    /// - [`crate::RemoteError`] if the baseline scan fails; the engine stays idle
    pub async fn listen(
        &self,
        dispatcher: impl EventDispatcher,
    ) -> Result<()> {
        let mut listener = self.listener.lock().await;
        if let Some(active) = listener.as_ref() {
            if active.is_running() {
                return Err(WatchError::AlreadyActive.into());
            }
        }
        if let Some(ended) = listener.take() {
            if let Err(e) = ended.stop().await {
                warn!("previous watch loop ended with: {}", e);
            }
        }

        let watch = WatchLoop::start(
            self.store.clone(),
            Arc::new(dispatcher),
            self.config.namespace.clone(),
            self.config.interval(),
            self.config.on_tick_error,
        )
        .await?;
        *listener = Some(watch);

        info!(
            "listening on {} every {}s",
            self.config.namespace, self.config.interval_secs
        );
        Ok(())
    }

    pub async fn is_listening(&self) -> bool {
        self.listener.lock().await.as_ref().map(|l| l.is_running()).unwrap_or(false)
    }

    /// Resolves once the watch loop has stopped, on `close` or on its own
    /// under `on_tick_error = "stop"`. Resolves at once when nothing listens.
    pub async fn stopped(&self) {
        let token = self.listener.lock().await.as_ref().map(|l| l.cancellation());
        if let Some(token) = token {
            token.cancelled().await;
        }
    }

    /// Pushes a local config file or directory into the namespace
    ///
    /// Local keys are prefixed with the namespace. Remote keys that differ are
    /// written, remote keys missing locally are deleted. When something changed
    /// and a watch loop is running, one extra tick runs so listeners see the
    /// change without waiting for the timer. That tick follows the loop's
    /// `on_tick_error` policy; its failure leaves `ticked` false and does not
    /// fail the sync.
    ///
    /// Not atomic: the first failed write aborts and is returned; the keys
    /// written before it stay written. Running `sync` again is safe.
    pub async fn sync(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<SyncReport> {
        let local = self.load_local(path.as_ref()).await?;
        let remote = self.all().await?;
        let changes = diff(&remote, &local);

        let mut report = SyncReport::default();
        for (key, value) in &changes.puts {
            self.store.put(key, value).await?;
            SYNC_WRITES.with_label_values(&["put"]).inc();
            report.puts.push(key.clone());
        }
        for key in &changes.deletes {
            if changes.puts.contains_key(key) {
                continue;
            }
            self.store.delete(key).await?;
            SYNC_WRITES.with_label_values(&["delete"]).inc();
            report.deletes.push(key.clone());
        }

        info!(
            "sync of {:?} into {}: {} puts, {} deletes",
            path.as_ref(),
            self.config.namespace,
            report.puts.len(),
            report.deletes.len()
        );

        if !report.is_noop() {
            let listener = self.listener.lock().await;
            if let Some(active) = listener.as_ref().filter(|l| l.is_running()) {
                match active.trigger().await {
                    Some(dispatched) => {
                        debug!("post-sync tick dispatched {} events", dispatched);
                        report.ticked = true;
                    }
                    None => warn!("post-sync tick on {} failed, writes are kept", self.config.namespace),
                }
            }
        }

        Ok(report)
    }

    /// Value of a fully-qualified key, `default` when absent
    pub async fn get(
        &self,
        key: &str,
        default: &str,
    ) -> Result<String> {
        Ok(self.store.get(key).await?.unwrap_or_else(|| default.to_string()))
    }

    /// Every key currently under the namespace
    pub async fn all(&self) -> Result<Snapshot> {
        scan_namespace(self.store.as_ref(), &self.config.namespace).await
    }

    /// Stops the watch loop, if any
    ///
    /// A tick already in flight completes its dispatch first. Returns the error
    /// that ended the loop when it had stopped on its own.
    pub async fn close(&self) -> Result<()> {
        let active = self.listener.lock().await.take();
        match active {
            Some(active) => {
                info!("closing watch loop on {}", self.config.namespace);
                active.stop().await
            }
            None => Ok(()),
        }
    }

    async fn load_local(
        &self,
        path: &Path,
    ) -> Result<Snapshot> {
        let source = self.source.clone();
        let path = path.to_path_buf();
        let local = tokio::task::spawn_blocking(move || source.load_all(&path)).await??;

        Ok(local
            .into_iter()
            .map(|(key, value)| (format!("{}{}", self.config.namespace, key), value))
            .collect())
    }
}
