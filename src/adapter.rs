//! Owns the SQLite connection and the single worker thread every
//! statement runs on (spec.md §4.5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::{Error, Result};

/// A unit of work submitted to the worker. Returns `true` when the worker
/// loop should stop after running it (used by [Adapter::close]).
type Job = Box<dyn FnOnce(&mut Option<Connection>) -> bool + Send>;

/// Adapter-level knobs applied via `PRAGMA` immediately after [Adapter::open]
/// succeeds.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    pub busy_timeout: Duration,
    pub enforce_foreign_keys: bool,
    /// Whether [crate::command::Command] logs SQL text at `trace` level
    /// before executing it. Defaults to the `GOM_LOG_SQL` environment
    /// variable (set and non-empty, not `"0"`) when not overridden.
    pub log_sql: bool,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            enforce_foreign_keys: true,
            log_sql: std::env::var("GOM_LOG_SQL")
                .map(|v| !v.is_empty() && v != "0")
                .unwrap_or(false),
        }
    }
}

fn apply_options(conn: &Connection, options: &AdapterOptions) -> Result<()> {
    conn.busy_timeout(options.busy_timeout)
        .map_err(|e| Error::sqlite(e, Some("PRAGMA busy_timeout")))?;
    if options.enforce_foreign_keys {
        conn.execute("PRAGMA foreign_keys = ON", [])
            .map_err(|e| Error::sqlite(e, Some("PRAGMA foreign_keys = ON")))?;
    }
    Ok(())
}

struct AdapterInner {
    sender: mpsc::Sender<Job>,
    worker: Mutex<Option<JoinHandle<()>>>,
    ever_opened: AtomicBool,
    log_sql: AtomicBool,
}

/// Owns exactly one worker thread and, through it, one SQLite connection
/// (spec.md §4.5, §5). Cheap to clone: clones share the same worker and
/// submission queue.
#[derive(Clone)]
pub struct Adapter(Arc<AdapterInner>);

impl Adapter {
    /// Spawns the worker thread, idle, with no connection open yet.
    pub fn new() -> Adapter {
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker = std::thread::spawn(move || {
            let mut conn: Option<Connection> = None;
            while let Ok(job) = receiver.recv() {
                if job(&mut conn) {
                    break;
                }
            }
            log::debug!("adapter worker thread exiting");
        });
        Adapter(Arc::new(AdapterInner {
            sender,
            worker: Mutex::new(Some(worker)),
            ever_opened: AtomicBool::new(false),
            log_sql: AtomicBool::new(false),
        }))
    }

    pub(crate) fn should_log_sql(&self) -> bool {
        self.0.log_sql.load(Ordering::Relaxed)
    }

    fn submit_job<T: Send + 'static>(
        &self,
        f: impl FnOnce(&mut Option<Connection>) -> (Result<T>, bool) + Send + 'static,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let job: Job = Box::new(move |conn| {
            let (result, stop) = f(conn);
            let _ = reply_tx.send(result);
            stop
        });
        self.0.sender.send(job).map_err(|_| Error::AdapterClosed)?;
        reply_rx.recv().map_err(|_| Error::AdapterClosed)?
    }

    /// Opens `uri` (a filesystem path or `:memory:`) on the worker thread
    /// and applies `options`. `AdapterAlreadyOpen` if a connection is
    /// already held.
    pub fn open(&self, uri: impl Into<String>, options: AdapterOptions) -> Result<()> {
        let uri = uri.into();
        let log_sql = options.log_sql;
        self.0.log_sql.store(log_sql, Ordering::Relaxed);
        let inner = Arc::clone(&self.0);
        log::debug!("opening adapter at {uri:?}");
        self.submit_job(move |conn_slot| {
            if conn_slot.is_some() {
                return (Err(Error::AdapterAlreadyOpen), false);
            }
            let opened = Connection::open(&uri)
                .map_err(|e| Error::AdapterOpenFailed(e.to_string()))
                .and_then(|conn| {
                    apply_options(&conn, &options).map_err(|e| Error::AdapterOpenFailed(e.to_string()))?;
                    Ok(conn)
                });
            match opened {
                Ok(conn) => {
                    *conn_slot = Some(conn);
                    inner.ever_opened.store(true, Ordering::SeqCst);
                    (Ok(()), false)
                }
                Err(e) => (Err(e), false),
            }
        })
    }

    /// Submits a close job that clears the connection and terminates the
    /// worker loop. Any work submitted after this call fails with
    /// `AdapterClosed` when the channel send itself fails (the worker has
    /// already exited). Returns `AdapterNotOpen` if this adapter was never
    /// opened; the worker still stops either way.
    pub fn close(&self) -> Result<()> {
        let ever_opened = self.0.ever_opened.load(Ordering::SeqCst);
        log::debug!("closing adapter");
        let result = self.submit_job(move |conn_slot| {
            *conn_slot = None;
            let result = if ever_opened {
                Ok(())
            } else {
                Err(Error::AdapterNotOpen)
            };
            (result, true)
        });
        if let Ok(mut worker) = self.0.worker.lock() {
            if let Some(handle) = worker.take() {
                let _ = handle.join();
            }
        }
        result
    }

    /// Runs `f` against the open connection on the worker and blocks until
    /// it completes. `AdapterNotOpen` if no connection is held.
    pub fn write<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit_job(move |conn_slot| {
            let result = match conn_slot {
                Some(conn) => f(conn),
                None => Err(Error::AdapterNotOpen),
            };
            (result, false)
        })
    }

    /// Same FIFO as [Self::write] — spec.md §4.5 keeps reads and writes on
    /// one queue rather than allowing reader/writer parallelism.
    pub fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.write(f)
    }

    /// Asynchronous write: returns immediately, invoking `on_complete` on
    /// the worker once `f` finishes.
    pub fn queue_write<F, T>(&self, f: F, on_complete: impl FnOnce(Result<T>) + Send + 'static)
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let job: Job = Box::new(move |conn_slot| {
            let result = match conn_slot {
                Some(conn) => f(conn),
                None => Err(Error::AdapterNotOpen),
            };
            on_complete(result);
            false
        });
        let _ = self.0.sender.send(job);
    }

    /// Asynchronous read, sharing [Self::queue_write]'s FIFO.
    pub fn queue_read<F, T>(&self, f: F, on_complete: impl FnOnce(Result<T>) + Send + 'static)
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.queue_write(f, on_complete)
    }
}

impl Default for Adapter {
    fn default() -> Self {
        Self::new()
    }
}
