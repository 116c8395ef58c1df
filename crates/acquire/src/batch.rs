//! Multi-file sends.
//!
//! A batch is deduplicated before anything is fetched: repeated text inputs
//! (same text, same requested name) are acquired once and the result is
//! handed to every position that asked for it. Binary payloads are always
//! acquired on their own.
//!
//! With a [`TaskRunner`] the unique items run concurrently against a read-only
//! snapshot of the cache index, and their index changes are merged in one go
//! afterwards. Without one they run in order against a single shared index
//! that is saved once at the end.

use crate::acquire::{AcquireOptions, Acquirer, Acquisition, IndexMode, Request};
use crate::runner::{AcquireTask, TaskRunner};
use parcel_cache::{CacheIndex, MetaUpdate};
use parcel_storage::{BackendHandle, sanitize_file_name};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

#[derive(Clone)]
pub struct BatchOrchestrator {
    acquirer: Acquirer,
    runner: Option<Arc<dyn TaskRunner>>,
}

impl BatchOrchestrator {
    /// Sequential orchestrator.
    pub fn new(acquirer: Acquirer) -> Self {
        Self { acquirer, runner: None }
    }

    /// Run unique items concurrently on `runner`.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn TaskRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn acquirer(&self) -> &Acquirer {
        &self.acquirer
    }

    /// Acquire every request, returning one result per request in the same
    /// order (duplicates included). Failed items are `None`.
    ///
    /// With a `template`, unique items that have no name of their own are
    /// named `<template>_<n>`, `n` counting unique items from 1.
    #[instrument(skip_all, fields(items = requests.len(), parallel = self.runner.is_some(), use_cache = use_cache))]
    pub async fn send_batch(
        &self,
        requests: Vec<Request>,
        destination: &BackendHandle,
        timeout: Duration,
        template: Option<&str>,
        use_cache: bool,
    ) -> Vec<Option<Acquisition>> {
        let (mut unique, slots) = dedup(requests);
        if let Some(template) = template {
            apply_template(&mut unique, template);
        }
        tracing::debug!(unique = unique.len(), "deduplicated batch");

        let results = match &self.runner {
            Some(runner) => self.run_parallel(runner.as_ref(), unique, destination, timeout, use_cache).await,
            None => self.run_sequential(unique, destination, timeout, use_cache).await,
        };
        slots.into_iter().map(|slot| results.get(slot).cloned().flatten()).collect()
    }

    async fn run_sequential(
        &self,
        unique: Vec<Request>,
        destination: &BackendHandle,
        timeout: Duration,
        use_cache: bool,
    ) -> Vec<Option<Acquisition>> {
        let cache = &self.acquirer.context().cache;
        let mut index = if use_cache {
            match cache.load().await {
                Ok(index) => Some(index),
                Err(err) => {
                    tracing::warn!(error = ?err, "could not load cache index; items will load it themselves");
                    None
                },
            }
        } else {
            None
        };

        let mut results = Vec::with_capacity(unique.len());
        for (slot, request) in unique.into_iter().enumerate() {
            let options = AcquireOptions { timeout, use_cache, slot: Some(slot) };
            let mode = match index.as_mut() {
                Some(index) => IndexMode::Shared(index),
                None => IndexMode::Standalone,
            };
            match self.acquirer.acquire(request, destination, options, mode).await {
                Ok(acquisition) => results.push(Some(acquisition)),
                Err(err) => {
                    tracing::warn!(slot, error = ?err, "batch item failed");
                    results.push(None);
                },
            }
        }

        if let Some(mut index) = index
            && let Err(err) = cache.persist(&mut index).await
        {
            tracing::warn!(error = ?err, "could not save cache index after batch");
        }
        results
    }

    async fn run_parallel(
        &self,
        runner: &dyn TaskRunner,
        unique: Vec<Request>,
        destination: &BackendHandle,
        timeout: Duration,
        use_cache: bool,
    ) -> Vec<Option<Acquisition>> {
        let cache = &self.acquirer.context().cache;
        let snapshot = if use_cache {
            cache.load().await.unwrap_or_else(|err| {
                tracing::warn!(error = ?err, "could not load cache index; treating every item as a miss");
                CacheIndex::default()
            })
        } else {
            CacheIndex::default()
        };
        let snapshot = Arc::new(snapshot);

        let tasks: Vec<AcquireTask> = unique
            .into_iter()
            .enumerate()
            .map(|(slot, request)| {
                let acquirer = self.acquirer.clone();
                let destination = destination.clone();
                let snapshot = snapshot.clone();
                let options = AcquireOptions { timeout, use_cache, slot: Some(slot) };
                Box::pin(async move {
                    acquirer.acquire(request, &destination, options, IndexMode::Deferred(snapshot)).await
                }) as AcquireTask
            })
            .collect();
        let results = runner.run(tasks, timeout).await;

        if use_cache {
            let updates: Vec<MetaUpdate> =
                results.iter().flatten().filter_map(|acquisition| acquisition.meta_update.clone()).collect();
            if let Err(err) = cache.merge(updates).await {
                tracing::warn!(error = ?err, "could not merge cache updates after batch");
            }
        }
        results
    }
}

/// Collapse repeated text requests. Returns the unique requests in order of
/// first appearance, and for each original position the index of its unique
/// request.
fn dedup(requests: Vec<Request>) -> (Vec<Request>, Vec<usize>) {
    let mut unique: Vec<Request> = Vec::new();
    let mut seen: HashMap<(String, Option<String>), usize> = HashMap::new();
    let mut slots = Vec::with_capacity(requests.len());
    for request in requests {
        let key = request.input.as_text().map(|text| (text.to_string(), request.file_name.clone()));
        if let Some(key) = key {
            if let Some(&slot) = seen.get(&key) {
                slots.push(slot);
                continue;
            }
            seen.insert(key, unique.len());
        }
        slots.push(unique.len());
        unique.push(request);
    }
    (unique, slots)
}

fn apply_template(unique: &mut [Request], template: &str) {
    for (position, request) in unique.iter_mut().enumerate() {
        if request.file_name.is_none() {
            request.file_name = Some(sanitize_file_name(&format!("{template}_{}", position + 1)));
        }
    }
}
