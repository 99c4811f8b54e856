//! Test doubles for engine tests: a store with scripted failures, sinks that
//! record or block, and tree builders.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, RetryConfig, TraversalConfig};
use crate::error::{RemoteError, SinkError};
use crate::sink::Sink;
use crate::store::{ByteStream, MemoryStore, ObjectStore};
use crate::types::{FileDescriptor, ListingPage};

/// How a scripted key or prefix misbehaves
#[derive(Clone)]
enum Script {
    /// Fail the next `n` calls, then delegate
    FailTimes(usize, RemoteError),
    /// Fail every call
    FailAlways(RemoteError),
    /// Never complete
    Hang,
}

/// [`MemoryStore`] wrapper that injects failures and counts calls
pub(crate) struct ScriptedStore {
    inner: MemoryStore,
    list_scripts: Mutex<HashMap<String, Script>>,
    fetch_scripts: Mutex<HashMap<String, Script>>,
    list_calls: AtomicUsize,
    fetch_calls: Mutex<HashMap<String, usize>>,
    stalled_bodies: Mutex<HashSet<String>>,
    cancel_on_list: Option<CancellationToken>,
    /// Signalled whenever a call starts hanging
    pub(crate) hanging: Notify,
}

impl ScriptedStore {
    pub(crate) fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            list_scripts: Mutex::new(HashMap::new()),
            fetch_scripts: Mutex::new(HashMap::new()),
            list_calls: AtomicUsize::new(0),
            fetch_calls: Mutex::new(HashMap::new()),
            stalled_bodies: Mutex::new(HashSet::new()),
            cancel_on_list: None,
            hanging: Notify::new(),
        }
    }

    pub(crate) fn fail_fetch_times(self, key: &str, times: usize, err: RemoteError) -> Self {
        self.script_fetch(key, Script::FailTimes(times, err))
    }

    pub(crate) fn fail_fetch_always(self, key: &str, err: RemoteError) -> Self {
        self.script_fetch(key, Script::FailAlways(err))
    }

    pub(crate) fn hang_fetch(self, key: &str) -> Self {
        self.script_fetch(key, Script::Hang)
    }

    /// Open `key` normally but never deliver a byte of its body
    pub(crate) fn stall_body(self, key: &str) -> Self {
        self.stalled_bodies.lock().unwrap().insert(key.to_string());
        self
    }

    /// Cancel `token` from inside every listing call, before it returns
    pub(crate) fn cancel_during_list(mut self, token: CancellationToken) -> Self {
        self.cancel_on_list = Some(token);
        self
    }

    pub(crate) fn fail_list_always(self, prefix: &str, err: RemoteError) -> Self {
        self.list_scripts
            .lock()
            .unwrap()
            .insert(prefix.to_string(), Script::FailAlways(err));
        self
    }

    pub(crate) fn fail_list_times(self, prefix: &str, times: usize, err: RemoteError) -> Self {
        self.list_scripts
            .lock()
            .unwrap()
            .insert(prefix.to_string(), Script::FailTimes(times, err));
        self
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fetch_calls(&self, key: &str) -> usize {
        self.fetch_calls
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    fn script_fetch(self, key: &str, script: Script) -> Self {
        self.fetch_scripts
            .lock()
            .unwrap()
            .insert(key.to_string(), script);
        self
    }

    /// Apply the script for `name`, returning `Some` if the call should fail
    /// and `None` if it should proceed. Hanging scripts never return.
    async fn apply(
        &self,
        scripts: &Mutex<HashMap<String, Script>>,
        name: &str,
    ) -> Option<RemoteError> {
        let outcome = {
            let mut scripts = scripts.lock().unwrap();
            match scripts.get_mut(name) {
                None => Ok(None),
                Some(Script::FailAlways(err)) => Ok(Some(err.clone())),
                Some(Script::FailTimes(remaining, err)) => {
                    if *remaining == 0 {
                        Ok(None)
                    } else {
                        *remaining -= 1;
                        Ok(Some(err.clone()))
                    }
                }
                Some(Script::Hang) => Err(()),
            }
        };
        match outcome {
            Ok(failure) => failure,
            Err(()) => {
                self.hanging.notify_one();
                futures::future::pending::<()>().await;
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for ScriptedStore {
    async fn list_children(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListingPage, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_list {
            token.cancel();
        }
        if let Some(err) = self.apply(&self.list_scripts, prefix).await {
            return Err(err);
        }
        self.inner
            .list_children(prefix, delimiter, continuation_token)
            .await
    }

    async fn fetch(&self, key: &str) -> Result<ByteStream, RemoteError> {
        *self
            .fetch_calls
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_insert(0) += 1;
        if let Some(err) = self.apply(&self.fetch_scripts, key).await {
            return Err(err);
        }
        if self.stalled_bodies.lock().unwrap().contains(key) {
            return Ok(futures::stream::pending().boxed());
        }
        self.inner.fetch(key).await
    }
}

/// Sink that records every key it receives and tracks write concurrency
#[derive(Default)]
pub(crate) struct RecordingSink {
    keys: Mutex<Vec<String>>,
    delay: Option<Duration>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Keys in the order they were written
    pub(crate) fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }

    pub(crate) fn sorted_keys(&self) -> Vec<String> {
        let mut keys = self.keys();
        keys.sort();
        keys
    }

    /// Highest number of writes observed running at once
    pub(crate) fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Sink for RecordingSink {
    async fn write(&self, file: &FileDescriptor, mut body: ByteStream) -> Result<u64, SinkError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let mut bytes = 0u64;
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(chunk) => bytes += chunk.len() as u64,
                Err(e) => {
                    self.active.fetch_sub(1, Ordering::SeqCst);
                    return Err(SinkError::Stream(e));
                }
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.keys.lock().unwrap().push(file.key.clone());
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(bytes)
    }
}

/// Sink that holds every write until [`GateSink::release`] is called
pub(crate) struct GateSink {
    gate: Semaphore,
    /// Signalled when a write is waiting at the gate
    pub(crate) entered: Notify,
    written: AtomicUsize,
}

impl GateSink {
    pub(crate) fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            entered: Notify::new(),
            written: AtomicUsize::new(0),
        }
    }

    pub(crate) fn release(&self) {
        self.gate.add_permits(1 << 20);
    }

    pub(crate) fn written(&self) -> usize {
        self.written.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Sink for GateSink {
    async fn write(&self, _file: &FileDescriptor, mut body: ByteStream) -> Result<u64, SinkError> {
        self.entered.notify_one();
        let _permit = self.gate.acquire().await.unwrap();

        let mut bytes = 0u64;
        while let Some(chunk) = body.next().await {
            bytes += chunk.map_err(SinkError::Stream)?.len() as u64;
        }
        self.written.fetch_add(1, Ordering::SeqCst);
        Ok(bytes)
    }
}

/// Sink that panics on every write, taking its worker task down with it
pub(crate) struct PanickingSink;

#[async_trait::async_trait]
impl Sink for PanickingSink {
    async fn write(&self, file: &FileDescriptor, _body: ByteStream) -> Result<u64, SinkError> {
        panic!("sink rejected {}", file.key);
    }
}

/// Build a uniform tree under `root`
///
/// Every folder holds `fanout` files; folders above `depth` also hold
/// `fanout` subfolders. Returns the store and every key it contains.
pub(crate) fn tree_store(
    root: &str,
    depth: usize,
    fanout: usize,
) -> (MemoryStore, HashSet<String>) {
    fn fill(
        store: &mut MemoryStore,
        keys: &mut HashSet<String>,
        prefix: &str,
        level: usize,
        depth: usize,
        fanout: usize,
    ) {
        for f in 0..fanout {
            let key = format!("{prefix}file-{f}.bin");
            store.insert(key.clone(), key.as_bytes().to_vec());
            keys.insert(key);
        }
        if level < depth {
            for d in 0..fanout {
                let child = format!("{prefix}dir-{d}/");
                fill(store, keys, &child, level + 1, depth, fanout);
            }
        }
    }

    let mut store = MemoryStore::new();
    let mut keys = HashSet::new();
    fill(&mut store, &mut keys, root, 0, depth, fanout);
    (store, keys)
}

/// The two-subfolder tree used by most scenarios:
/// `root/a/1.txt`, `root/b/2.txt`, `root/3.txt`
pub(crate) fn small_store() -> MemoryStore {
    MemoryStore::new()
        .with_object("root/a/1.txt", "one")
        .with_object("root/b/2.txt", "two")
        .with_object("root/3.txt", "three")
}

/// Configuration with millisecond backoff so retry tests run quickly
pub(crate) fn fast_config(parallelism: usize) -> Config {
    Config {
        traversal: TraversalConfig {
            parallelism,
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        },
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: true,
        },
        ..Default::default()
    }
}
