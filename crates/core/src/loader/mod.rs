//! Asynchronous byte loads for target files and recorded sequences.
//!
//! A load either carries its bytes already or names a reference that is
//! fetched on a worker thread. `http://` and `https://` references go over
//! HTTP; anything else is read from the filesystem. Completed fetches are queued and handed to
//! the engine only when the owning pipeline drains the queue, at the start
//! of the next `advance()`. A load therefore never lands in the middle of a
//! frame. A failed fetch marks its [`LoadHandle`] as failed and leaves the
//! engine untouched.

use std::{
    cell::RefCell,
    fmt,
    rc::Rc,
    sync::{
        mpsc::{self, Receiver, TryRecvError},
        Arc, OnceLock,
    },
    thread,
    time::Duration,
};

use crate::{config::LoaderConfig, PipelineError, Result};

/// Where the bytes of a load come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Bytes(Vec<u8>),
    /// Resolved through the pipeline's [`Fetch`] implementation.
    Reference(String),
}

impl From<Vec<u8>> for DataSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for DataSource {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<&str> for DataSource {
    fn from(value: &str) -> Self {
        Self::Reference(value.to_string())
    }
}

impl From<String> for DataSource {
    fn from(value: String) -> Self {
        Self::Reference(value)
    }
}

/// Resolves a reference into bytes. Runs on a worker thread.
pub trait Fetch: Send + Sync {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>>;
}

/// Treats references as filesystem paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsFetcher;

impl Fetch for FsFetcher {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        std::fs::read(reference).map_err(|source| PipelineError::Fetch {
            reference: reference.to_string(),
            source,
        })
    }
}

/// Retrieves references with a blocking HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| PipelineError::msg(format!("could not build HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        self.client
            .get(reference)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .map(|body| body.to_vec())
            .map_err(|source| PipelineError::Http {
                reference: reference.to_string(),
                source,
            })
    }
}

/// Whether `reference` names an HTTP resource rather than a path.
pub fn is_remote(reference: &str) -> bool {
    let Some((scheme, _)) = reference.split_once("://") else {
        return false;
    };
    scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
}

/// Default fetcher: HTTP for remote references, the filesystem otherwise.
///
/// The HTTP client is built on the first remote fetch.
#[derive(Debug)]
pub struct ReferenceFetcher {
    timeout: Duration,
    http: OnceLock<std::result::Result<HttpFetcher, String>>,
}

impl ReferenceFetcher {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            timeout: config.fetch_timeout(),
            http: OnceLock::new(),
        }
    }
}

impl Default for ReferenceFetcher {
    fn default() -> Self {
        Self::new(&LoaderConfig::default())
    }
}

impl Fetch for ReferenceFetcher {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        if !is_remote(reference) {
            return FsFetcher.fetch(reference);
        }
        let http = self
            .http
            .get_or_init(|| HttpFetcher::new(self.timeout).map_err(|err| err.to_string()));
        match http {
            Ok(http) => http.fetch(reference),
            Err(err) => Err(PipelineError::msg(err.clone())),
        }
    }
}

#[derive(Debug, Clone)]
pub enum LoadState {
    Pending,
    Complete,
    Failed(Rc<PipelineError>),
}

/// Caller-side view of a submitted load.
///
/// Dropping the handle does not cancel the load.
#[derive(Debug, Clone)]
pub struct LoadHandle {
    state: Rc<RefCell<LoadState>>,
}

impl LoadHandle {
    fn new(state: LoadState) -> Self {
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn state(&self) -> LoadState {
        self.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.state.borrow(), LoadState::Pending)
    }

    pub fn is_complete(&self) -> bool {
        matches!(*self.state.borrow(), LoadState::Complete)
    }

    pub fn error(&self) -> Option<Rc<PipelineError>> {
        match &*self.state.borrow() {
            LoadState::Failed(err) => Some(Rc::clone(err)),
            _ => None,
        }
    }

    fn resolve(&self, state: LoadState) {
        *self.state.borrow_mut() = state;
    }
}

/// Hands loaded bytes to the engine object the load was issued for. An
/// error marks the load as failed.
pub(crate) type Apply<E> = Box<dyn FnOnce(&mut E, &[u8]) -> Result<()>>;

fn outcome(result: Result<()>) -> LoadState {
    match result {
        Ok(()) => LoadState::Complete,
        Err(err) => {
            tracing::warn!(%err, "load not applied");
            LoadState::Failed(Rc::new(err))
        }
    }
}

enum Inbox {
    Ready(Vec<u8>),
    Fetching {
        reference: String,
        receiver: Receiver<Result<Vec<u8>>>,
    },
}

struct PendingLoad<E> {
    inbox: Inbox,
    apply: Apply<E>,
    handle: LoadHandle,
}

pub(crate) struct LoadQueue<E> {
    fetcher: Arc<dyn Fetch>,
    pending: RefCell<Vec<PendingLoad<E>>>,
}

impl<E> LoadQueue<E> {
    pub(crate) fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            fetcher,
            pending: RefCell::new(Vec::new()),
        }
    }

    /// Queues a load. Bytes submitted while no frame is being processed are
    /// applied straight away.
    pub(crate) fn submit(
        &self,
        engine: &RefCell<E>,
        mid_frame: bool,
        source: DataSource,
        apply: Apply<E>,
    ) -> LoadHandle {
        match source {
            DataSource::Bytes(bytes) if !mid_frame => {
                LoadHandle::new(outcome(apply(&mut *engine.borrow_mut(), bytes.as_slice())))
            }
            DataSource::Bytes(bytes) => self.enqueue(Inbox::Ready(bytes), apply),
            DataSource::Reference(reference) => match self.spawn_fetch(&reference) {
                Ok(receiver) => self.enqueue(
                    Inbox::Fetching {
                        reference,
                        receiver,
                    },
                    apply,
                ),
                Err(err) => {
                    tracing::error!(%reference, %err, "could not start fetch");
                    LoadHandle::new(LoadState::Failed(Rc::new(err)))
                }
            },
        }
    }

    /// Applies every load whose bytes are available and keeps the rest.
    pub(crate) fn drain(&self, engine: &RefCell<E>) {
        if self.pending.borrow().is_empty() {
            return;
        }

        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        let mut still_pending = Vec::new();
        for load in pending {
            let PendingLoad {
                inbox,
                apply,
                handle,
            } = load;
            match inbox {
                Inbox::Ready(bytes) => {
                    handle.resolve(outcome(apply(&mut *engine.borrow_mut(), bytes.as_slice())));
                }
                Inbox::Fetching {
                    reference,
                    receiver,
                } => match receiver.try_recv() {
                    Ok(Ok(bytes)) => {
                        tracing::debug!(%reference, bytes = bytes.len(), "fetch complete");
                        handle.resolve(outcome(apply(&mut *engine.borrow_mut(), bytes.as_slice())));
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(%reference, %err, "fetch failed");
                        handle.resolve(LoadState::Failed(Rc::new(err)));
                    }
                    Err(TryRecvError::Empty) => still_pending.push(PendingLoad {
                        inbox: Inbox::Fetching {
                            reference,
                            receiver,
                        },
                        apply,
                        handle,
                    }),
                    Err(TryRecvError::Disconnected) => {
                        tracing::warn!(%reference, "fetch worker exited without a result");
                        handle.resolve(LoadState::Failed(Rc::new(
                            PipelineError::FetchAborted { reference },
                        )));
                    }
                },
            }
        }
        self.pending.borrow_mut().extend(still_pending);
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    fn enqueue(&self, inbox: Inbox, apply: Apply<E>) -> LoadHandle {
        let handle = LoadHandle::new(LoadState::Pending);
        self.pending.borrow_mut().push(PendingLoad {
            inbox,
            apply,
            handle: handle.clone(),
        });
        handle
    }

    fn spawn_fetch(&self, reference: &str) -> Result<Receiver<Result<Vec<u8>>>> {
        let (sender, receiver) = mpsc::channel();
        let fetcher = Arc::clone(&self.fetcher);
        let reference = reference.to_string();
        thread::Builder::new()
            .name("ar-pipeline-fetch".to_string())
            .spawn(move || {
                // The receiver may already be gone if the pipeline was dropped.
                let _ = sender.send(fetcher.fetch(&reference));
            })?;
        Ok(receiver)
    }
}

impl<E> fmt::Debug for LoadQueue<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadQueue")
            .field("pending", &self.len())
            .finish()
    }
}

/// Blocks until `ready` returns true, checking every `interval`.
///
/// There is no timeout; callers that need one should poll `ready` themselves.
pub fn poll_until(interval: Duration, mut ready: impl FnMut() -> bool) {
    let mut polls = 0_u64;
    while !ready() {
        polls += 1;
        thread::sleep(interval);
    }
    tracing::debug!(polls, "ready");
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl Fetch for Failing {
        fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
            Err(PipelineError::msg(format!("no such resource {reference}")))
        }
    }

    struct Echo;

    impl Fetch for Echo {
        fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
            Ok(reference.as_bytes().to_vec())
        }
    }

    fn push_bytes() -> Apply<Vec<Vec<u8>>> {
        Box::new(|engine: &mut Vec<Vec<u8>>, data: &[u8]| -> Result<()> {
            engine.push(data.to_vec());
            Ok(())
        })
    }

    fn drain_until_settled(queue: &LoadQueue<Vec<Vec<u8>>>, engine: &RefCell<Vec<Vec<u8>>>) {
        poll_until(Duration::from_millis(1), || {
            queue.drain(engine);
            queue.len() == 0
        });
    }

    #[test]
    fn bytes_outside_a_frame_apply_immediately() {
        let queue = LoadQueue::new(Arc::new(Echo));
        let engine = RefCell::new(Vec::new());

        let handle = queue.submit(&engine, false, vec![1, 2].into(), push_bytes());

        assert!(handle.is_complete());
        assert_eq!(*engine.borrow(), vec![vec![1, 2]]);
    }

    #[test]
    fn bytes_mid_frame_wait_for_the_next_drain() {
        let queue = LoadQueue::new(Arc::new(Echo));
        let engine = RefCell::new(Vec::new());

        let handle = queue.submit(&engine, true, vec![3].into(), push_bytes());
        assert!(handle.is_pending());
        assert!(engine.borrow().is_empty());

        queue.drain(&engine);
        assert!(handle.is_complete());
        assert_eq!(*engine.borrow(), vec![vec![3]]);
    }

    #[test]
    fn references_are_fetched_then_applied_on_drain() {
        let queue = LoadQueue::new(Arc::new(Echo));
        let engine = RefCell::new(Vec::new());

        let handle = queue.submit(&engine, false, "abc".into(), push_bytes());
        drain_until_settled(&queue, &engine);

        assert!(handle.is_complete());
        assert_eq!(*engine.borrow(), vec![b"abc".to_vec()]);
    }

    #[test]
    fn failed_fetch_rejects_without_touching_the_engine() {
        let queue = LoadQueue::new(Arc::new(Failing));
        let engine = RefCell::new(Vec::new());

        let handle = queue.submit(&engine, false, "missing".into(), push_bytes());
        drain_until_settled(&queue, &engine);

        let err = handle.error().expect("load should fail");
        assert!(format!("{err}").contains("missing"));
        assert!(engine.borrow().is_empty());
    }

    fn owner_released() -> Apply<Vec<Vec<u8>>> {
        Box::new(|_: &mut Vec<Vec<u8>>, _: &[u8]| -> Result<()> { Err(PipelineError::Released) })
    }

    #[test]
    fn rejected_apply_fails_the_load() {
        let queue = LoadQueue::new(Arc::new(Echo));
        let engine = RefCell::new(Vec::new());

        let now = queue.submit(&engine, false, vec![1].into(), owner_released());
        assert!(matches!(now.error().as_deref(), Some(PipelineError::Released)));

        let later = queue.submit(&engine, true, vec![2].into(), owner_released());
        queue.drain(&engine);
        assert!(matches!(later.error().as_deref(), Some(PipelineError::Released)));
        assert!(engine.borrow().is_empty());
    }

    #[test]
    fn remote_references_are_recognised_by_scheme() {
        assert!(is_remote("https://cdn.example.com/target.zpt"));
        assert!(is_remote("HTTP://example.com/seq.bin"));
        assert!(!is_remote("targets/target.zpt"));
        assert!(!is_remote("/abs/path/target.zpt"));
        assert!(!is_remote("file:///tmp/target.zpt"));
        assert!(!is_remote("httpsish.zpt"));
    }

    #[test]
    fn reference_fetcher_routes_by_scheme() {
        let path = std::env::temp_dir().join(format!(
            "ar-pipeline-loader-{}.bin",
            std::process::id()
        ));
        std::fs::write(&path, b"local").unwrap();
        let fetcher = ReferenceFetcher::new(&LoaderConfig {
            fetch_timeout_ms: 2_000,
            ..Default::default()
        });

        let local = fetcher.fetch(&path.display().to_string());
        std::fs::remove_file(&path).unwrap();
        assert_eq!(local.unwrap(), b"local".to_vec());

        let missing = fetcher.fetch("no/such/target.zpt").unwrap_err();
        assert!(matches!(missing, PipelineError::Fetch { .. }));

        // Nothing listens on port 1, so the request fails at connect time.
        let remote = fetcher.fetch("http://127.0.0.1:1/target.zpt").unwrap_err();
        assert!(matches!(remote, PipelineError::Http { .. }));
        assert!(format!("{remote}").contains("127.0.0.1:1"));
    }

    #[test]
    fn fs_fetcher_reports_the_reference() {
        let err = FsFetcher
            .fetch("/definitely/not/a/real/target.zpt")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { .. }));
        assert!(format!("{err}").contains("target.zpt"));
    }
}
