// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reference-counted texture cache with deduplicated background loads.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::backend::TextureBackend;
use crate::clock::{Clock, SystemClock, Timestamp};
use crate::decode::{DecodedImage, Decoder, FileDecoder, SourceDescriptor};
use crate::error::LoadError;
use crate::executor::{CancelToken, Executor, ThreadExecutor};
use crate::key::{TextureId, TextureKey};

/// Tuning knobs for [`TextureCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureCacheConfig {
    /// How long a failed entry keeps resolving to the placeholder before a new
    /// request retries the load.
    pub failed_retry_after_ms: u64,
    /// Upper bound on uploads performed by one [`TextureCache::maintain`] call.
    /// Remaining completions wait for the next frame.
    pub max_uploads_per_maintain: usize,
}

impl TextureCacheConfig {
    /// Retry failures after five seconds, no upload budget.
    pub const DEFAULT: Self = Self {
        failed_retry_after_ms: 5_000,
        max_uploads_per_maintain: usize::MAX,
    };
}

impl Default for TextureCacheConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What a [`TextureRef`] currently draws with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureState {
    /// Still loading. Callers skip drawing.
    Pending,
    /// Uploaded and ready.
    Ready(TextureId),
    /// The load failed; draw with the placeholder.
    Fallback(TextureId),
}

impl TextureState {
    /// The texture to draw with, if any.
    pub fn texture(self) -> Option<TextureId> {
        match self {
            Self::Pending => None,
            Self::Ready(id) | Self::Fallback(id) => Some(id),
        }
    }
}

/// Counts from one [`TextureCache::maintain`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaintainReport {
    /// Loads that finished and were uploaded.
    pub ready: usize,
    /// Loads that finished with an error.
    pub failed: usize,
    /// Textures handed back to the backend.
    pub released: usize,
    /// Completions dropped because their request was cancelled or superseded.
    pub discarded: usize,
}

impl MaintainReport {
    /// Whether anything visible changed, so the frame should be redrawn.
    pub fn changed_appearance(&self) -> bool {
        self.ready > 0 || self.failed > 0
    }
}

#[derive(Debug)]
enum EntryState {
    Pending { load_id: u64, cancel: CancelToken },
    Ready(TextureId),
    Failed { at: Timestamp },
}

#[derive(Debug)]
struct Entry {
    state: EntryState,
    use_count: usize,
    last_used: Timestamp,
}

struct Completion {
    key: TextureKey,
    load_id: u64,
    result: Result<DecodedImage, LoadError>,
}

/// Sends exactly one completion for a load, even if the task never runs.
struct Reply {
    tx: Sender<Completion>,
    key: TextureKey,
    load_id: u64,
    armed: bool,
}

impl Reply {
    fn send(mut self, result: Result<DecodedImage, LoadError>) {
        self.armed = false;
        self.deliver(result);
    }

    fn deliver(&self, result: Result<DecodedImage, LoadError>) {
        // The receiver is gone only when the cache itself was dropped.
        let _ = self.tx.send(Completion {
            key: self.key.clone(),
            load_id: self.load_id,
            result,
        });
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        if self.armed {
            self.deliver(Err(LoadError::Dropped));
        }
    }
}

struct Inner {
    config: TextureCacheConfig,
    entries: HashMap<TextureKey, Entry>,
    next_load_id: u64,
    placeholder: TextureId,
    released: Vec<TextureId>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    executor: Box<dyn Executor>,
    decoder: Arc<dyn Decoder>,
    clock: Box<dyn Clock>,
}

impl Inner {
    fn acquire(&mut self, key: &TextureKey, source: SourceDescriptor) {
        let now = self.clock.now();
        let retry_after = self.config.failed_retry_after_ms;
        let expired = match self.entries.get_mut(key) {
            Some(entry) => {
                entry.use_count += 1;
                entry.last_used = now;
                matches!(entry.state, EntryState::Failed { at } if now.since(at) >= retry_after)
            }
            None => {
                let state = self.spawn_load(key.clone(), source);
                self.entries.insert(
                    key.clone(),
                    Entry {
                        state,
                        use_count: 1,
                        last_used: now,
                    },
                );
                return;
            }
        };
        if expired {
            tracing::debug!(%key, "retrying failed texture load");
            let state = self.spawn_load(key.clone(), source);
            if let Some(entry) = self.entries.get_mut(key) {
                entry.state = state;
            }
        }
    }

    fn spawn_load(&mut self, key: TextureKey, source: SourceDescriptor) -> EntryState {
        self.next_load_id += 1;
        let load_id = self.next_load_id;
        let cancel = CancelToken::new();
        let task_cancel = cancel.clone();
        let reply = Reply {
            tx: self.tx.clone(),
            key,
            load_id,
            armed: true,
        };
        let decoder = Arc::clone(&self.decoder);
        self.executor.spawn(Box::new(move || {
            let result = if task_cancel.is_cancelled() {
                Err(LoadError::Cancelled)
            } else {
                decoder.decode(&source)
            };
            reply.send(result);
        }));
        EntryState::Pending { load_id, cancel }
    }

    fn retain(&mut self, key: &TextureKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.use_count += 1;
        }
    }

    fn release(&mut self, key: &TextureKey) {
        let Some(entry) = self.entries.get_mut(key) else {
            tracing::debug!(%key, "release of unknown texture ignored");
            return;
        };
        entry.use_count = entry.use_count.saturating_sub(1);
        if entry.use_count > 0 {
            return;
        }
        let Some(entry) = self.entries.remove(key) else {
            return;
        };
        match entry.state {
            EntryState::Ready(id) => self.released.push(id),
            EntryState::Pending { cancel, .. } => cancel.cancel(),
            EntryState::Failed { .. } => {}
        }
    }

    fn state(&self, key: &TextureKey) -> TextureState {
        match self.entries.get(key).map(|e| &e.state) {
            Some(EntryState::Pending { .. }) => TextureState::Pending,
            Some(EntryState::Ready(id)) => TextureState::Ready(*id),
            Some(EntryState::Failed { .. }) | None => TextureState::Fallback(self.placeholder),
        }
    }

    fn maintain<B: TextureBackend + ?Sized>(&mut self, backend: &mut B) -> MaintainReport {
        let mut report = MaintainReport::default();
        for id in self.released.drain(..) {
            backend.delete(id);
            report.released += 1;
        }
        let now = self.clock.now();
        while report.ready < self.config.max_uploads_per_maintain {
            let Ok(done) = self.rx.try_recv() else {
                break;
            };
            let Some(entry) = self.entries.get_mut(&done.key) else {
                tracing::trace!(key = %done.key, "completion for released texture dropped");
                report.discarded += 1;
                continue;
            };
            let current = match &entry.state {
                EntryState::Pending { load_id, cancel } => {
                    *load_id == done.load_id && !cancel.is_cancelled()
                }
                _ => false,
            };
            if !current {
                tracing::trace!(key = %done.key, "stale completion dropped");
                report.discarded += 1;
                continue;
            }
            match done.result {
                Ok(image) => {
                    entry.state = EntryState::Ready(backend.upload(&image));
                    report.ready += 1;
                }
                Err(err) => {
                    tracing::warn!(key = %done.key, %err, "texture load failed");
                    entry.state = EntryState::Failed { at: now };
                    report.failed += 1;
                }
            }
        }
        report
    }
}

/// Shared texture cache.
///
/// Cloning the cache clones a handle; all clones see the same entries. The
/// cache lives on the frame thread; only decoding happens elsewhere.
#[derive(Clone)]
pub struct TextureCache {
    inner: Rc<RefCell<Inner>>,
}

impl TextureCache {
    /// A cache with default services: [`ThreadExecutor`], [`FileDecoder`],
    /// [`SystemClock`]. Uploads the placeholder through `backend`.
    pub fn new<B: TextureBackend + ?Sized>(backend: &mut B) -> Self {
        Self::builder().build(backend)
    }

    /// Start configuring a cache.
    pub fn builder() -> TextureCacheBuilder {
        TextureCacheBuilder::default()
    }

    /// Return a reference to the texture for `key`, starting a load if needed.
    ///
    /// Requests for a key that is already loaded or in flight share the
    /// existing entry; no second decode or upload happens.
    pub fn load_or_get(
        &self,
        key: impl Into<TextureKey>,
        source: impl Into<SourceDescriptor>,
    ) -> TextureRef {
        let key = key.into();
        self.inner.borrow_mut().acquire(&key, source.into());
        TextureRef {
            cache: Rc::clone(&self.inner),
            key,
        }
    }

    /// Apply finished loads and free released textures. Call once per frame,
    /// before rendering.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn maintain<B: TextureBackend + ?Sized>(&self, backend: &mut B) -> MaintainReport {
        let report = self.inner.borrow_mut().maintain(backend);
        if report != MaintainReport::default() {
            tracing::trace!(?report, "texture cache maintained");
        }
        report
    }

    /// The 1×1 white texture used for solid fills and failed loads.
    pub fn placeholder(&self) -> TextureId {
        self.inner.borrow().placeholder
    }

    /// Current state of `key`, if it has an entry.
    pub fn state(&self, key: &TextureKey) -> Option<TextureState> {
        let inner = self.inner.borrow();
        inner.entries.contains_key(key).then(|| inner.state(key))
    }

    /// Number of live references to `key`.
    pub fn use_count(&self, key: &TextureKey) -> usize {
        self.inner
            .borrow()
            .entries
            .get(key)
            .map_or(0, |e| e.use_count)
    }

    /// When `key` was last requested or drawn.
    pub fn last_used(&self, key: &TextureKey) -> Option<Timestamp> {
        self.inner.borrow().entries.get(key).map(|e| e.last_used)
    }

    /// Number of entries (pending, ready, or failed).
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of loads still in flight.
    pub fn pending_loads(&self) -> usize {
        self.inner
            .borrow()
            .entries
            .values()
            .filter(|e| matches!(e.state, EntryState::Pending { .. }))
            .count()
    }

    /// The cache's clock reading.
    pub fn now(&self) -> Timestamp {
        self.inner.borrow().clock.now()
    }
}

impl core::fmt::Debug for TextureCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("TextureCache")
            .field("config", &inner.config)
            .field("entries", &inner.entries.len())
            .field("placeholder", &inner.placeholder)
            .field("released", &inner.released.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`TextureCache`].
#[derive(Default)]
pub struct TextureCacheBuilder {
    config: TextureCacheConfig,
    executor: Option<Box<dyn Executor>>,
    decoder: Option<Arc<dyn Decoder>>,
    clock: Option<Box<dyn Clock>>,
}

impl TextureCacheBuilder {
    /// Set the tuning knobs.
    pub fn config(mut self, config: TextureCacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Run decode tasks on `executor`.
    pub fn executor(mut self, executor: impl Executor + 'static) -> Self {
        self.executor = Some(Box::new(executor));
        self
    }

    /// Decode sources with `decoder`.
    pub fn decoder(mut self, decoder: impl Decoder + 'static) -> Self {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    /// Stamp entries with `clock`.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Create the cache, uploading the placeholder through `backend`.
    pub fn build<B: TextureBackend + ?Sized>(self, backend: &mut B) -> TextureCache {
        let placeholder = backend.upload(&DecodedImage::placeholder());
        let (tx, rx) = mpsc::channel();
        let inner = Inner {
            config: self.config,
            entries: HashMap::new(),
            next_load_id: 0,
            placeholder,
            released: Vec::new(),
            tx,
            rx,
            executor: self.executor.unwrap_or_else(|| Box::new(ThreadExecutor::new())),
            decoder: self.decoder.unwrap_or_else(|| Arc::new(FileDecoder)),
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock::new())),
        };
        TextureCache {
            inner: Rc::new(RefCell::new(inner)),
        }
    }
}

impl core::fmt::Debug for TextureCacheBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TextureCacheBuilder")
            .field("config", &self.config)
            .field("executor", &self.executor.is_some())
            .field("decoder", &self.decoder.is_some())
            .field("clock", &self.clock.is_some())
            .finish()
    }
}

/// Owning reference to a cached texture.
///
/// Each live `TextureRef` counts as one use. Dropping it (or calling
/// [`dispose`](Self::dispose)) gives the use back; when the count reaches zero
/// the GPU texture is freed on the next [`TextureCache::maintain`], or the
/// in-flight load is cancelled.
pub struct TextureRef {
    cache: Rc<RefCell<Inner>>,
    key: TextureKey,
}

impl TextureRef {
    /// The logical key.
    pub fn key(&self) -> &TextureKey {
        &self.key
    }

    /// What to draw with right now.
    pub fn resolve(&self) -> TextureState {
        self.cache.borrow().state(&self.key)
    }

    /// Record that the texture was drawn at `now`.
    pub fn mark_used(&self, now: Timestamp) {
        if let Some(entry) = self.cache.borrow_mut().entries.get_mut(&self.key) {
            entry.last_used = entry.last_used.max(now);
        }
    }

    /// Number of live references to this texture, including this one.
    pub fn use_count(&self) -> usize {
        self.cache
            .borrow()
            .entries
            .get(&self.key)
            .map_or(0, |e| e.use_count)
    }

    /// Give up this reference now.
    pub fn dispose(self) {
        drop(self);
    }
}

impl Clone for TextureRef {
    fn clone(&self) -> Self {
        self.cache.borrow_mut().retain(&self.key);
        Self {
            cache: Rc::clone(&self.cache),
            key: self.key.clone(),
        }
    }
}

impl Drop for TextureRef {
    fn drop(&mut self) {
        match self.cache.try_borrow_mut() {
            Ok(mut inner) => inner.release(&self.key),
            Err(_) => tracing::warn!(key = %self.key, "texture released while cache is busy; leaked"),
        }
    }
}

impl PartialEq for TextureRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cache, &other.cache) && self.key == other.key
    }
}

impl core::fmt::Debug for TextureRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TextureRef")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
