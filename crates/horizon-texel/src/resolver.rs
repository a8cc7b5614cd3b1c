//! Background resolution of references and deferred painters.
//!
//! The [`LayerSourceResolver`] owns a small pool of worker threads. Jobs are
//! tagged with the slot index and the slot generation they were issued for;
//! completed jobs are drained on the viewer thread with
//! [`LayerSourceResolver::poll`] and checked against the slot's current
//! generation before being applied.
//!
//! Fetching is pluggable through [`ReferenceFetcher`]. The default
//! [`LocalFetcher`] reads plain paths, `file://` URIs and `local-raw:///`
//! URIs from the local filesystem.
//!
//! Dropping the resolver never waits on its workers: queued jobs are
//! skipped and a job that is already running finishes on its detached
//! thread with its result discarded.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use crate::error::{ViewerError, ViewerResult};
use crate::logging::targets;
use crate::source::{Painter, ResolvedLayer};
use crate::surface::Surface;

/// Retrieves the encoded bytes behind a reference URI.
///
/// Implementations run on loader worker threads.
pub trait ReferenceFetcher: Send + Sync + 'static {
    /// Fetch the raw (still encoded) bytes for `uri`.
    fn fetch(&self, uri: &str) -> Result<Vec<u8>, String>;
}

/// Reads references from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFetcher;

impl LocalFetcher {
    /// URI schemes that map directly onto local paths.
    const SCHEMES: [&'static str; 2] = ["local-raw://", "file://"];

    /// Strip a known local scheme from `uri`, leaving a filesystem path.
    pub fn path_for(uri: &str) -> &Path {
        let path = Self::SCHEMES
            .iter()
            .find_map(|scheme| uri.strip_prefix(scheme))
            .unwrap_or(uri);
        Path::new(path)
    }
}

impl ReferenceFetcher for LocalFetcher {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>, String> {
        std::fs::read(Self::path_for(uri)).map_err(|e| e.to_string())
    }
}

/// Configuration for the background resolver.
#[derive(Clone)]
pub struct LoaderConfig {
    /// Number of worker threads.
    /// Defaults to the number of CPU cores, capped at 4.
    pub worker_threads: usize,
    /// Maximum number of jobs in flight before new jobs are refused.
    /// Defaults to 256.
    pub max_pending: usize,
    /// Where reference bytes come from. Defaults to [`LocalFetcher`].
    pub fetcher: Arc<dyn ReferenceFetcher>,
}

impl LoaderConfig {
    /// Use `fetcher` for references.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ReferenceFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Use `count` worker threads (at least one).
    #[must_use]
    pub fn with_worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = count.max(1);
        self
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let cores = thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(2);
        Self {
            worker_threads: cores.min(4),
            max_pending: 256,
            fetcher: Arc::new(LocalFetcher),
        }
    }
}

impl fmt::Debug for LoaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderConfig")
            .field("worker_threads", &self.worker_threads)
            .field("max_pending", &self.max_pending)
            .finish_non_exhaustive()
    }
}

/// Identifies the slot state a job was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub slot: usize,
    pub generation: u64,
}

/// The product of a finished job.
#[derive(Debug)]
pub enum JobOutput {
    /// A reference was fetched and decoded, or failed to.
    Resolved(ViewerResult<ResolvedLayer>),
    /// A deferred painter finished drawing, or panicked.
    Painted(ViewerResult<Surface>),
}

/// A finished job, ready to be applied on the viewer thread.
#[derive(Debug)]
pub struct Completed {
    pub key: JobKey,
    pub output: JobOutput,
}

/// Internal message sent to worker threads.
enum Request {
    /// Fetch and decode a reference.
    Fetch { key: JobKey, uri: String },
    /// Run a deferred painter on a fresh surface.
    Paint {
        key: JobKey,
        painter: Painter,
        width: u32,
        height: u32,
    },
}

/// Resolves references and runs deferred painters on background threads.
pub struct LayerSourceResolver {
    /// Channel sender for sending requests to workers.
    request_tx: Sender<Request>,
    /// Channel receiver for completed jobs from workers.
    completed_rx: Receiver<Completed>,
    /// Worker thread handles.
    workers: Vec<JoinHandle<()>>,
    /// Set on drop; workers skip every request received afterwards.
    shutdown: Arc<AtomicBool>,
    /// Number of jobs currently in flight.
    in_progress: usize,
    /// Configuration.
    config: LoaderConfig,
}

impl LayerSourceResolver {
    /// Create a resolver with default configuration.
    pub fn new() -> ViewerResult<Self> {
        Self::with_config(LoaderConfig::default())
    }

    /// Create a resolver with custom configuration.
    pub fn with_config(config: LoaderConfig) -> ViewerResult<Self> {
        let (request_tx, request_rx) = unbounded::<Request>();
        let (completed_tx, completed_rx) = unbounded::<Completed>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.worker_threads);
        for i in 0..config.worker_threads.max(1) {
            let rx = request_rx.clone();
            let tx = completed_tx.clone();
            let fetcher = Arc::clone(&config.fetcher);
            let stop = Arc::clone(&shutdown);
            let handle = thread::Builder::new()
                .name(format!("texel-loader-{}", i))
                .spawn(move || Self::worker_thread(rx, tx, fetcher, stop))
                .map_err(|e| ViewerError::WorkerSpawn(e.to_string()))?;
            workers.push(handle);
        }

        Ok(Self {
            request_tx,
            completed_rx,
            workers,
            shutdown,
            in_progress: 0,
            config,
        })
    }

    /// Worker thread function that processes requests.
    fn worker_thread(
        request_rx: Receiver<Request>,
        completed_tx: Sender<Completed>,
        fetcher: Arc<dyn ReferenceFetcher>,
        shutdown: Arc<AtomicBool>,
    ) {
        while let Ok(request) = request_rx.recv() {
            if shutdown.load(Ordering::Acquire) {
                break;
            }
            let completed = match request {
                Request::Fetch { key, uri } => Completed {
                    key,
                    output: JobOutput::Resolved(Self::resolve(fetcher.as_ref(), &uri)),
                },
                Request::Paint {
                    key,
                    painter,
                    width,
                    height,
                } => Completed {
                    key,
                    output: JobOutput::Painted(Self::run_painter(&painter, width, height)),
                },
            };
            // The viewer may already be gone; its results are abandoned.
            if completed_tx.send(completed).is_err() {
                break;
            }
        }
    }

    /// Fetch and decode `uri`, turning a panic in the fetcher or decoder
    /// into a load error.
    fn resolve(fetcher: &dyn ReferenceFetcher, uri: &str) -> ViewerResult<ResolvedLayer> {
        panic::catch_unwind(AssertUnwindSafe(|| Self::fetch_and_decode(fetcher, uri)))
            .unwrap_or_else(|payload| {
                Err(ViewerError::Load {
                    uri: uri.to_string(),
                    reason: format!("loader panicked: {}", panic_message(&*payload)),
                })
            })
    }

    /// Fetch `uri` and decode it to RGBA8.
    fn fetch_and_decode(fetcher: &dyn ReferenceFetcher, uri: &str) -> ViewerResult<ResolvedLayer> {
        let load_error = |reason: String| ViewerError::Load {
            uri: uri.to_string(),
            reason,
        };
        let bytes = fetcher.fetch(uri).map_err(load_error)?;
        let img = image::load_from_memory(&bytes)
            .map_err(|e| load_error(format!("failed to decode image: {}", e)))?;
        Ok(ResolvedLayer::image(Surface::from_image(img.to_rgba8())))
    }

    /// Run `painter` on a fresh `width` x `height` surface.
    fn run_painter(painter: &Painter, width: u32, height: u32) -> ViewerResult<Surface> {
        let mut surface = Surface::new(width, height);
        panic::catch_unwind(AssertUnwindSafe(|| painter.paint(&mut surface)))
            .map_err(|payload| ViewerError::PainterPanicked(panic_message(&*payload)))?;
        Ok(surface)
    }

    /// Start resolving `uri` for the given slot state.
    pub fn fetch(&mut self, key: JobKey, uri: impl Into<String>) -> ViewerResult<()> {
        let uri = uri.into();
        tracing::debug!(
            target: targets::RESOLVER,
            slot = key.slot,
            generation = key.generation,
            %uri,
            "fetching reference"
        );
        self.submit(Request::Fetch { key, uri })
    }

    /// Start running a deferred painter on a `width` x `height` surface.
    pub fn paint(
        &mut self,
        key: JobKey,
        painter: Painter,
        width: u32,
        height: u32,
    ) -> ViewerResult<()> {
        tracing::debug!(
            target: targets::RESOLVER,
            slot = key.slot,
            generation = key.generation,
            width,
            height,
            "dispatching deferred painter"
        );
        self.submit(Request::Paint {
            key,
            painter,
            width,
            height,
        })
    }

    fn submit(&mut self, request: Request) -> ViewerResult<()> {
        if self.in_progress >= self.config.max_pending {
            return Err(ViewerError::TooManyPending(self.config.max_pending));
        }
        self.request_tx
            .send(request)
            .map_err(|_| ViewerError::LoaderShutdown)?;
        self.in_progress += 1;
        Ok(())
    }

    /// Drain every job that has finished, without blocking.
    pub fn poll(&mut self) -> Vec<Completed> {
        let mut done = Vec::new();
        while let Ok(completed) = self.completed_rx.try_recv() {
            done.push(completed);
        }
        self.in_progress = self.in_progress.saturating_sub(done.len());
        done
    }

    /// Block until at least one job finishes or `deadline` passes, then
    /// drain everything that has finished.
    pub fn wait(&mut self, deadline: Instant) -> Vec<Completed> {
        if self.in_progress == 0 {
            return Vec::new();
        }
        let first = match self.completed_rx.recv_deadline(deadline) {
            Ok(completed) => completed,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                return Vec::new();
            }
        };
        self.in_progress = self.in_progress.saturating_sub(1);
        let mut done = vec![first];
        done.extend(self.poll());
        done
    }

    /// Get the number of jobs currently in flight.
    #[inline]
    pub fn in_progress_count(&self) -> usize {
        self.in_progress
    }

    /// Returns `true` if any job is in flight.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.in_progress > 0
    }
}

impl fmt::Debug for LayerSourceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerSourceResolver")
            .field("workers", &self.workers.len())
            .field("in_progress", &self.in_progress)
            .field("config", &self.config)
            .finish()
    }
}

impl Drop for LayerSourceResolver {
    fn drop(&mut self) {
        // Workers blocked in `recv` exit once `request_tx` drops; a running
        // job finishes on its own and its send fails.
        self.shutdown.store(true, Ordering::Release);
        let detached = self.workers.drain(..).count();
        tracing::debug!(
            target: targets::RESOLVER,
            detached,
            abandoned = self.in_progress,
            "resolver shut down"
        );
    }
}

/// Best-effort text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::time::Duration;

    use image::{ImageFormat, Rgba, RgbaImage};

    use super::*;

    struct MapFetcher(HashMap<String, Vec<u8>>);

    impl ReferenceFetcher for MapFetcher {
        fn fetch(&self, uri: &str) -> Result<Vec<u8>, String> {
            self.0.get(uri).cloned().ok_or_else(|| "not found".to_string())
        }
    }

    fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(rgba));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn resolver_with(files: &[(&str, Vec<u8>)]) -> LayerSourceResolver {
        let map = files
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let config = LoaderConfig::default()
            .with_worker_threads(1)
            .with_fetcher(Arc::new(MapFetcher(map)));
        LayerSourceResolver::with_config(config).unwrap()
    }

    fn wait_one(resolver: &mut LayerSourceResolver) -> Completed {
        let mut done = resolver.wait(Instant::now() + Duration::from_secs(5));
        assert_eq!(done.len(), 1);
        done.remove(0)
    }

    #[test]
    fn test_config_defaults() {
        let config = LoaderConfig::default();
        assert!(config.worker_threads >= 1);
        assert!(config.worker_threads <= 4);
        assert_eq!(config.max_pending, 256);
    }

    #[test]
    fn test_local_fetcher_paths() {
        assert_eq!(LocalFetcher::path_for("local-raw:///tmp/a.png"), Path::new("/tmp/a.png"));
        assert_eq!(LocalFetcher::path_for("file:///tmp/a.png"), Path::new("/tmp/a.png"));
        assert_eq!(LocalFetcher::path_for("rel/a.png"), Path::new("rel/a.png"));
    }

    #[test]
    fn test_fetch_decodes_png() {
        let mut resolver = resolver_with(&[("red.png", png(3, 2, [255, 0, 0, 255]))]);
        let key = JobKey { slot: 1, generation: 7 };
        resolver.fetch(key, "red.png").unwrap();
        assert!(resolver.is_busy());

        let completed = wait_one(&mut resolver);
        assert_eq!(completed.key, key);
        let JobOutput::Resolved(Ok(layer)) = completed.output else {
            panic!("expected a decoded layer");
        };
        assert_eq!((layer.width, layer.height), (3, 2));
        assert_eq!(layer.image.unwrap().get_pixel(2, 1), Some([255, 0, 0, 255]));
        assert!(!resolver.is_busy());
    }

    #[test]
    fn test_fetch_missing_is_load_error() {
        let mut resolver = resolver_with(&[]);
        resolver.fetch(JobKey { slot: 0, generation: 1 }, "nope.png").unwrap();
        let completed = wait_one(&mut resolver);
        assert!(matches!(
            completed.output,
            JobOutput::Resolved(Err(ViewerError::Load { ref uri, .. })) if uri == "nope.png"
        ));
    }

    #[test]
    fn test_fetch_garbage_is_load_error() {
        let mut resolver = resolver_with(&[("bad.png", vec![1, 2, 3])]);
        resolver.fetch(JobKey { slot: 0, generation: 1 }, "bad.png").unwrap();
        let completed = wait_one(&mut resolver);
        assert!(matches!(completed.output, JobOutput::Resolved(Err(ViewerError::Load { .. }))));
    }

    #[test]
    fn test_deferred_paint() {
        let mut resolver = resolver_with(&[]);
        let painter = Painter::deferred(|s| s.put_pixel(1, 1, [1, 2, 3, 4]));
        resolver.paint(JobKey { slot: 2, generation: 3 }, painter, 2, 2).unwrap();
        let completed = wait_one(&mut resolver);
        let JobOutput::Painted(Ok(surface)) = completed.output else {
            panic!("expected a painted surface");
        };
        assert_eq!(surface.dimensions(), (2, 2));
        assert_eq!(surface.get_pixel(1, 1), Some([1, 2, 3, 4]));
    }

    #[test]
    fn test_panicking_painter_is_reported() {
        let mut resolver = resolver_with(&[("ok.png", png(1, 1, [0, 0, 0, 255]))]);
        let painter = Painter::deferred(|_| panic!("brush exploded"));
        resolver.paint(JobKey { slot: 1, generation: 1 }, painter, 2, 2).unwrap();

        let completed = wait_one(&mut resolver);
        match completed.output {
            JobOutput::Painted(Err(ViewerError::PainterPanicked(message))) => {
                assert!(message.contains("brush exploded"));
            }
            other => panic!("expected a painter failure, got {other:?}"),
        }
        assert!(!resolver.is_busy());

        // The same worker keeps serving jobs.
        resolver.fetch(JobKey { slot: 2, generation: 1 }, "ok.png").unwrap();
        let completed = wait_one(&mut resolver);
        assert!(matches!(completed.output, JobOutput::Resolved(Ok(_))));
    }

    #[test]
    fn test_panicking_fetcher_is_load_error() {
        struct Exploding;
        impl ReferenceFetcher for Exploding {
            fn fetch(&self, uri: &str) -> Result<Vec<u8>, String> {
                panic!("cannot reach {uri}")
            }
        }
        let config = LoaderConfig::default()
            .with_worker_threads(1)
            .with_fetcher(Arc::new(Exploding));
        let mut resolver = LayerSourceResolver::with_config(config).unwrap();
        resolver.fetch(JobKey { slot: 0, generation: 1 }, "far.png").unwrap();

        let completed = wait_one(&mut resolver);
        match completed.output {
            JobOutput::Resolved(Err(ViewerError::Load { uri, reason })) => {
                assert_eq!(uri, "far.png");
                assert!(reason.contains("cannot reach far.png"));
            }
            other => panic!("expected a load failure, got {other:?}"),
        }
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }

    #[test]
    fn test_too_many_pending() {
        let mut config = LoaderConfig::default().with_worker_threads(1);
        config.max_pending = 0;
        let mut resolver = LayerSourceResolver::with_config(config).unwrap();
        assert_eq!(
            resolver.fetch(JobKey { slot: 0, generation: 1 }, "a.png"),
            Err(ViewerError::TooManyPending(0))
        );
    }

    #[test]
    fn test_wait_when_idle_returns_immediately() {
        let mut resolver = resolver_with(&[]);
        assert!(resolver.wait(Instant::now() + Duration::from_secs(60)).is_empty());
        assert!(resolver.poll().is_empty());
    }
}
