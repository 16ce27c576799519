//! Read-through with optional network refresh.
//!
//! A [`NetworkBoundResource`] is assembled from four closures and run once on
//! a worker thread. The caller gets a [`ResourceStream`] yielding `Loading`
//! followed by exactly one `Success` or `Error`; dropping the stream cancels
//! the pass at the next step boundary.

use crate::error_handler::ErrorHandler;
use keeper_core::{KeeperError, KeeperResult, Resource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::debug;

type FetchLocal<L> = Box<dyn FnMut() -> KeeperResult<L> + Send>;
type ShouldFetch<L> = Box<dyn FnOnce(&L) -> bool + Send>;
type FetchRemote<R> = Box<dyn FnOnce() -> KeeperResult<R> + Send>;
type SaveRemote<R> = Box<dyn FnOnce(R) -> KeeperResult<()> + Send>;

pub struct NetworkBoundResource<L, R> {
    name: &'static str,
    error_handler: Arc<dyn ErrorHandler>,
    fetch_local: FetchLocal<L>,
    should_fetch: ShouldFetch<L>,
    fetch_remote: FetchRemote<R>,
    save_remote: SaveRemote<R>,
}

impl<L, R> NetworkBoundResource<L, R>
where
    L: Send + 'static,
    R: Send + 'static,
{
    pub fn new(
        name: &'static str,
        error_handler: Arc<dyn ErrorHandler>,
        fetch_local: impl FnMut() -> KeeperResult<L> + Send + 'static,
        should_fetch: impl FnOnce(&L) -> bool + Send + 'static,
        fetch_remote: impl FnOnce() -> KeeperResult<R> + Send + 'static,
        save_remote: impl FnOnce(R) -> KeeperResult<()> + Send + 'static,
    ) -> Self {
        Self {
            name,
            error_handler,
            fetch_local: Box::new(fetch_local),
            should_fetch: Box::new(should_fetch),
            fetch_remote: Box::new(fetch_remote),
            save_remote: Box::new(save_remote),
        }
    }

    pub fn spawn(self) -> ResourceStream<L> {
        let name = self.name;
        spawn_worker(name, move |emitter| self.run(&emitter))
    }

    fn run(self, emitter: &Emitter<L>) {
        let Self {
            name,
            error_handler,
            mut fetch_local,
            should_fetch,
            fetch_remote,
            save_remote,
        } = self;

        if !emitter.emit(Resource::Loading) {
            return;
        }

        let local = match fetch_local() {
            Ok(local) => local,
            Err(error) => {
                emitter.emit(Resource::Error(error_handler.classify(error)));
                return;
            }
        };

        if !should_fetch(&local) {
            debug!(operation = name, "served from local cache");
            emitter.emit(Resource::Success(local));
            return;
        }

        if emitter.is_cancelled() {
            debug!(operation = name, "cancelled before remote call");
            return;
        }

        let remote = match fetch_remote() {
            Ok(remote) => remote,
            Err(error) => {
                debug!(operation = name, kind = ?error.kind, "remote call failed");
                emitter.emit(Resource::Error(error_handler.classify(error)));
                return;
            }
        };

        if emitter.is_cancelled() {
            debug!(operation = name, "cancelled before persisting remote result");
            return;
        }

        // Persist first so a read right after `Success` sees the new state.
        if let Err(error) = save_remote(remote) {
            emitter.emit(Resource::Error(error_handler.classify(error)));
            return;
        }

        match fetch_local() {
            Ok(fresh) => {
                debug!(operation = name, "remote result persisted");
                emitter.emit(Resource::Success(fresh));
            }
            Err(error) => {
                emitter.emit(Resource::Error(error_handler.classify(error)));
            }
        }
    }
}

/// Runs a remote mutation that has no local read step with the same
/// `Loading` then terminal protocol.
pub fn spawn_task<T, F>(
    name: &'static str,
    error_handler: Arc<dyn ErrorHandler>,
    job: F,
) -> ResourceStream<T>
where
    T: Send + 'static,
    F: FnOnce() -> KeeperResult<T> + Send + 'static,
{
    spawn_worker(name, move |emitter| {
        if !emitter.emit(Resource::Loading) {
            return;
        }

        match job() {
            Ok(value) => {
                emitter.emit(Resource::Success(value));
            }
            Err(error) => {
                debug!(operation = name, kind = ?error.kind, "task failed");
                emitter.emit(Resource::Error(error_handler.classify(error)));
            }
        }
    })
}

struct Emitter<T> {
    tx: Sender<Resource<T>>,
    cancelled: Arc<AtomicBool>,
}

impl<T> Emitter<T> {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn emit(&self, state: Resource<T>) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.tx.send(state).is_ok()
    }
}

fn spawn_worker<T, F>(name: &'static str, body: F) -> ResourceStream<T>
where
    T: Send + 'static,
    F: FnOnce(Emitter<T>) + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let cancelled = Arc::new(AtomicBool::new(false));
    let fallback = tx.clone();
    let emitter = Emitter {
        tx,
        cancelled: Arc::clone(&cancelled),
    };

    let spawned = thread::Builder::new()
        .name(format!("keeper-sync-{name}"))
        .spawn(move || body(emitter));

    if let Err(err) = spawned {
        let _ = fallback.send(Resource::Loading);
        let _ = fallback.send(Resource::Error(
            KeeperError::storage(format!("failed to start worker for {name}")).with_cause(err),
        ));
    }

    ResourceStream {
        receiver: rx,
        cancelled,
    }
}

/// States produced by one repository call. Iteration blocks until the next
/// state and ends after the terminal one.
#[derive(Debug)]
pub struct ResourceStream<T> {
    receiver: Receiver<Resource<T>>,
    cancelled: Arc<AtomicBool>,
}

impl<T> ResourceStream<T> {
    pub fn next_timeout(&self, timeout: Duration) -> Option<Resource<T>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(state) => Some(state),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Blocks until the terminal state and returns it as a `Result`.
    pub fn wait(self) -> KeeperResult<T> {
        while let Ok(state) = self.receiver.recv() {
            if let Some(result) = state.into_result() {
                return result;
            }
        }

        Err(KeeperError::storage(
            "worker stopped before producing a result",
        ))
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl<T> Iterator for ResourceStream<T> {
    type Item = Resource<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

impl<T> Drop for ResourceStream<T> {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handler::DefaultErrorHandler;
    use keeper_core::ErrorKind;
    use std::sync::Mutex;

    fn handler() -> Arc<dyn ErrorHandler> {
        Arc::new(DefaultErrorHandler)
    }

    fn journal() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn refresh_path_persists_before_success() {
        let steps = journal();
        let stored = Arc::new(Mutex::new(0u32));

        let (local_steps, local_value) = (Arc::clone(&steps), Arc::clone(&stored));
        let remote_steps = Arc::clone(&steps);
        let (save_steps, save_value) = (Arc::clone(&steps), Arc::clone(&stored));

        let states: Vec<_> = NetworkBoundResource::new(
            "test",
            handler(),
            move || {
                local_steps.lock().unwrap().push("local");
                Ok(*local_value.lock().unwrap())
            },
            |_| true,
            move || {
                remote_steps.lock().unwrap().push("remote");
                Ok(42u32)
            },
            move |remote| {
                save_steps.lock().unwrap().push("save");
                *save_value.lock().unwrap() = remote;
                Ok(())
            },
        )
        .spawn()
        .collect();

        assert_eq!(states, vec![Resource::Loading, Resource::Success(42)]);
        assert_eq!(
            *steps.lock().unwrap(),
            vec!["local", "remote", "save", "local"]
        );
    }

    #[test]
    fn cache_hit_skips_remote() {
        let steps = journal();
        let remote_steps = Arc::clone(&steps);

        let states: Vec<_> = NetworkBoundResource::new(
            "cached",
            handler(),
            || Ok(vec![1, 2]),
            |local: &Vec<i32>| local.is_empty(),
            move || {
                remote_steps.lock().unwrap().push("remote");
                Ok(Vec::<i32>::new())
            },
            |_| Ok(()),
        )
        .spawn()
        .collect();

        assert_eq!(states, vec![Resource::Loading, Resource::Success(vec![1, 2])]);
        assert!(steps.lock().unwrap().is_empty());
    }

    #[test]
    fn remote_failure_emits_one_classified_error_and_saves_nothing() {
        let steps = journal();
        let save_steps = Arc::clone(&steps);

        let states: Vec<_> = NetworkBoundResource::new(
            "failing",
            handler(),
            || Ok(0u8),
            |_| true,
            || Err::<u8, _>(KeeperError::network("could not connect to server")),
            move |_| {
                save_steps.lock().unwrap().push("save");
                Ok(())
            },
        )
        .spawn()
        .collect();

        assert_eq!(states.len(), 2);
        assert_eq!(states[0], Resource::Loading);
        let Resource::Error(error) = &states[1] else {
            panic!("expected error, got {:?}", states[1]);
        };
        assert_eq!(error.kind, ErrorKind::Network);
        assert!(error.cause.is_some());
        assert!(steps.lock().unwrap().is_empty());
    }

    #[test]
    fn local_read_failure_is_terminal() {
        let result = NetworkBoundResource::new(
            "broken-store",
            handler(),
            || Err::<u8, _>(KeeperError::storage("database locked")),
            |_| true,
            || Ok(1u8),
            |_| Ok(()),
        )
        .spawn()
        .wait();

        assert_eq!(result, Err(KeeperError::storage("database locked")));
    }

    #[test]
    fn dropping_the_stream_stops_before_persisting() {
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let (saved_tx, saved_rx) = mpsc::channel::<u8>();

        let mut stream = NetworkBoundResource::new(
            "cancelled",
            handler(),
            || Ok(0u8),
            |_| true,
            move || {
                let _ = gate_rx.recv();
                Ok(5u8)
            },
            move |remote| {
                let _ = saved_tx.send(remote);
                Ok(())
            },
        )
        .spawn();

        assert_eq!(stream.next(), Some(Resource::Loading));
        drop(stream);
        let _ = gate_tx.send(());

        // The sender lives in the save closure; it disconnects once the worker
        // finishes without ever calling it.
        assert!(saved_rx.recv().is_err());
    }

    #[test]
    fn task_follows_loading_then_terminal_protocol() {
        let ok: Vec<_> = spawn_task("ok", handler(), || Ok("done")).collect();
        assert_eq!(ok, vec![Resource::Loading, Resource::Success("done")]);

        let failed = spawn_task("failed", handler(), || {
            Err::<(), _>(KeeperError::session_expired("session has been expired"))
        })
        .wait()
        .expect_err("task error");
        assert_eq!(failed.kind, ErrorKind::SessionExpired);
        assert_eq!(failed.message, crate::SESSION_EXPIRED_MESSAGE);
    }
}
