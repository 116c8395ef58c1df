use crate::delayed::{DelayedTask, schedule_cleanup};
use crate::destination::{ConfigDirectory, Directory, resolve_destination};
use crate::error::{ErrorKind, Result};
use crate::handoff::{Dispatcher, Handoff, Launcher};
use exn::{OptionExt, ResultExt};
use parcel_acquire::{
    AcquireOptions, Acquirer, Acquisition, BatchOrchestrator, Context, IndexMode, MediaIndex, Request, TaskRunner,
    TokioRunner,
};
use parcel_cache::{ClearTarget, Repository};
use parcel_config::Config;
use parcel_sniff::RangeSniffer;
use parcel_storage::BackendHandle;
use parcel_storage::backend::LocalBackend;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// What to send: one item, or a batch shared as a single multi-file handoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    One(Request),
    Many(Vec<Request>),
}

impl From<Request> for Payload {
    fn from(request: Request) -> Self {
        Payload::One(request)
    }
}

impl From<Vec<Request>> for Payload {
    fn from(requests: Vec<Request>) -> Self {
        Payload::Many(requests)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::One(Request::new(text))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::One(Request::new(bytes))
    }
}

/// Per-send overrides of the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub timeout: Option<Duration>,
    /// Name for a single item, or the name template for a batch.
    pub file_name: Option<String>,
    pub use_cache: Option<bool>,
}

/// Result of a dispatched send.
#[derive(Debug)]
pub struct Sent {
    pub handoff: Handoff,
    /// Pending removal of the transient files, if there were any.
    pub cleanup: Option<DelayedTask>,
}

/// Sends media to channels of the messaging client.
///
/// The boolean methods never fail loudly: errors are logged and reported as
/// `false`. A `true` from [`send`](Self::send) only means the handoff was
/// made, not that anyone received anything.
pub struct MediaSender {
    config: Config,
    acquirer: Acquirer,
    runner: Option<Arc<dyn TaskRunner>>,
    destination: BackendHandle,
    directory: Arc<dyn Directory>,
    dispatcher: Arc<dyn Dispatcher>,
    launcher: Arc<dyn Launcher>,
}

impl MediaSender {
    /// Build a sender from configuration. Rooms come from `config.rooms`
    /// and batches run in parallel on Tokio until told otherwise.
    pub fn new(config: Config, dispatcher: Arc<dyn Dispatcher>, launcher: Arc<dyn Launcher>) -> Result<Self> {
        config.validate().or_raise(|| ErrorKind::Config)?;
        let cache = Repository::new(config.cache_dir(), config.cache.max_entries)
            .or_raise(|| ErrorKind::Cache)?
            .with_buffer_size(config.transfer.buffer_size)
            .with_sniff_window(config.transfer.sniff_window);
        let ctx = Context::with_default_client(cache, config.range_connect_timeout()).or_raise(|| ErrorKind::Acquire)?;
        let sniffer = RangeSniffer::with_client(ctx.client.clone(), config.transfer.sniff_window, config.range_read_timeout());
        let ctx = ctx
            .with_sniffer(sniffer)
            .with_managed_roots(config.storage.managed_roots.clone())
            .with_buffer_size(config.transfer.buffer_size);
        let destination: BackendHandle =
            Arc::new(LocalBackend::new("transient", config.temp_dir()).or_raise(|| ErrorKind::Storage)?);

        Ok(Self {
            acquirer: Acquirer::new(ctx),
            runner: Some(Arc::new(TokioRunner::new())),
            destination,
            directory: Arc::new(ConfigDirectory::new(config.rooms.clone())),
            dispatcher,
            launcher,
            config,
        })
    }

    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.directory = directory;
        self
    }

    /// Runner for batches; `None` runs them sequentially.
    #[must_use]
    pub fn with_runner(mut self, runner: Option<Arc<dyn TaskRunner>>) -> Self {
        self.runner = runner;
        self
    }

    #[must_use]
    pub fn with_media_index(mut self, media_index: Arc<dyn MediaIndex>) -> Self {
        self.acquirer = Acquirer::new(self.acquirer.context().clone().with_media_index(media_index));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn cache(&self) -> &Repository {
        &self.acquirer.context().cache
    }

    fn orchestrator(&self) -> BatchOrchestrator {
        let orchestrator = BatchOrchestrator::new(self.acquirer.clone());
        match &self.runner {
            Some(runner) => orchestrator.with_runner(runner.clone()),
            None => orchestrator,
        }
    }

    // =========================================================================
    // Public surface
    // =========================================================================

    /// Acquire and hand off `payload` to `destination` (a channel id or a
    /// room name). Transient files are removed after the configured delay.
    pub async fn send(&self, destination: &str, payload: impl Into<Payload>, options: SendOptions) -> bool {
        match self.try_send(destination, payload.into(), options).await {
            Ok(sent) => {
                tracing::info!(files = sent.handoff.paths.len(), channel_id = sent.handoff.channel_id, "sent");
                true
            },
            Err(err) => {
                tracing::error!(error = ?err, "send failed");
                false
            },
        }
    }

    /// Bring `package` (or the configured host package) to the foreground
    /// after `delay` (or the configured delay).
    pub fn schedule_return_to_foreground(&self, package: Option<&str>, delay: Option<Duration>) -> bool {
        match self.try_schedule_return_to_foreground(package, delay) {
            Ok(_) => true,
            Err(err) => {
                tracing::error!(error = ?err, "could not schedule return to foreground");
                false
            },
        }
    }

    /// Remove cached files: all of them, or the named entries.
    pub async fn clear_cache(&self, target: Option<ClearTarget>) -> bool {
        match self.cache().clear(target.unwrap_or(ClearTarget::All)).await {
            Ok(removed) => {
                tracing::info!(removed, "cleared cache");
                true
            },
            Err(err) => {
                tracing::error!(error = ?err, "could not clear cache");
                false
            },
        }
    }

    // =========================================================================
    // Fallible variants
    // =========================================================================

    #[instrument(skip(self, payload, options))]
    pub async fn try_send(&self, destination: &str, payload: Payload, options: SendOptions) -> Result<Sent> {
        let channel_id = resolve_destination(destination, self.directory.as_ref()).await?;
        let timeout = options.timeout.unwrap_or_else(|| self.config.timeout());
        let use_cache = options.use_cache.unwrap_or(self.config.cache.enabled_by_default);
        let package = &self.config.delivery.package;

        let (handoff, acquired) = match payload {
            Payload::One(mut request) => {
                if request.file_name.is_none() {
                    request.file_name = options.file_name;
                }
                let options = AcquireOptions { timeout, use_cache, slot: None };
                let acquisition = self
                    .acquirer
                    .acquire(request, &self.destination, options, IndexMode::Standalone)
                    .await
                    .or_raise(|| ErrorKind::Acquire)?;
                (Handoff::single(package, channel_id, &acquisition), vec![acquisition])
            },
            Payload::Many(requests) => {
                let results = self
                    .orchestrator()
                    .send_batch(requests, &self.destination, timeout, options.file_name.as_deref(), use_cache)
                    .await;
                let acquired: Vec<Acquisition> = results.into_iter().flatten().collect();
                let handoff =
                    Handoff::multiple(package, channel_id, &acquired).ok_or_raise(|| ErrorKind::NothingToSend)?;
                (handoff, acquired)
            },
        };

        let dispatched = self.dispatcher.deliver(&handoff).await;
        // Transient files go whether or not the handoff worked.
        let transient: Vec<PathBuf> =
            acquired.into_iter().filter(|acquisition| acquisition.downloaded).map(|acquisition| acquisition.local_path).collect();
        let cleanup =
            if transient.is_empty() { None } else { Some(schedule_cleanup(transient, self.config.cleanup_delay())?) };
        dispatched.or_raise(|| ErrorKind::Dispatch)?;
        Ok(Sent { handoff, cleanup })
    }

    pub fn try_schedule_return_to_foreground(&self, package: Option<&str>, delay: Option<Duration>) -> Result<DelayedTask> {
        let package = package
            .map(str::to_string)
            .or_else(|| self.config.delivery.host_package.clone())
            .ok_or_raise(|| ErrorKind::Launch("<unset>".to_string()))?;
        let delay = delay.unwrap_or_else(|| self.config.foreground_delay());
        let launcher = self.launcher.clone();
        tracing::debug!(%package, ?delay, "scheduled return to foreground");
        DelayedTask::spawn(delay, async move {
            if let Err(err) = launcher.bring_to_foreground(&package).await {
                tracing::warn!(%package, error = ?err, "could not bring app to the foreground");
            }
        })
    }
}
