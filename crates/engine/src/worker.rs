//! Background execution context for synchronous engine backends.
//!
//! The backend lives on a dedicated named thread. Connections are sessions
//! held by that thread; async callers talk to it over an unbounded channel and
//! get replies on oneshot channels. All statements are therefore executed in
//! arrival order, one at a time.

use std::collections::HashMap;
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::bootstrap::{EngineSettings, RuntimeBundle};
use crate::connection::{BoxFuture, Connection, Engine};
use crate::error::EngineError;
use crate::result::ResultTable;

/// A synchronous engine that can be driven from the worker thread.
pub trait Backend: Sized + 'static {
    type Session;

    /// Instantiate the engine. Runs on the worker thread.
    fn open(bundle: &RuntimeBundle, settings: &EngineSettings) -> Result<Self, EngineError>;

    fn connect(&mut self) -> Result<Self::Session, EngineError>;

    fn execute(session: &mut Self::Session, sql: &str) -> Result<(), EngineError>;

    fn query(session: &mut Self::Session, sql: &str) -> Result<ResultTable, EngineError>;
}

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

enum Request {
    Connect {
        reply: Reply<u64>,
    },
    Execute {
        session: u64,
        sql: String,
        reply: Reply<()>,
    },
    Query {
        session: u64,
        sql: String,
        reply: Reply<ResultTable>,
    },
    Close {
        session: u64,
        reply: Option<Reply<()>>,
    },
}

/// Start the worker thread and wait until the backend reports it is open.
pub async fn spawn<B: Backend>(
    bundle: RuntimeBundle,
    settings: EngineSettings,
) -> Result<WorkerEngine, EngineError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let (ready_tx, ready_rx) = oneshot::channel();

    thread::Builder::new()
        .name("engine-worker".to_string())
        .spawn(move || match B::open(&bundle, &settings) {
            Ok(backend) => {
                let _ = ready_tx.send(Ok(()));
                run_worker(backend, rx);
            }
            Err(err) => {
                let _ = ready_tx.send(Err(err));
            }
        })
        .map_err(|e| EngineError::Bootstrap(format!("failed to start worker thread: {e}")))?;

    ready_rx.await.map_err(|_| EngineError::WorkerGone)??;
    info!("engine worker started");
    Ok(WorkerEngine { tx })
}

fn run_worker<B: Backend>(mut backend: B, mut rx: mpsc::UnboundedReceiver<Request>) {
    let mut sessions: HashMap<u64, B::Session> = HashMap::new();
    let mut next_id: u64 = 1;

    while let Some(req) = rx.blocking_recv() {
        match req {
            Request::Connect { reply } => {
                let result = backend.connect().map(|session| {
                    let id = next_id;
                    next_id += 1;
                    sessions.insert(id, session);
                    id
                });
                let _ = reply.send(result);
            }
            Request::Execute {
                session,
                sql,
                reply,
            } => {
                let result = match sessions.get_mut(&session) {
                    Some(s) => B::execute(s, &sql),
                    None => Err(EngineError::Closed(session)),
                };
                let _ = reply.send(result);
            }
            Request::Query {
                session,
                sql,
                reply,
            } => {
                let result = match sessions.get_mut(&session) {
                    Some(s) => B::query(s, &sql),
                    None => Err(EngineError::Closed(session)),
                };
                let _ = reply.send(result);
            }
            Request::Close { session, reply } => {
                let removed = sessions.remove(&session).is_some();
                debug!(session, removed, "connection released");
                if let Some(reply) = reply {
                    let result = if removed {
                        Ok(())
                    } else {
                        Err(EngineError::Closed(session))
                    };
                    let _ = reply.send(result);
                }
            }
        }
    }

    if !sessions.is_empty() {
        warn!(open = sessions.len(), "engine worker stopping with open sessions");
    }
    info!("engine worker stopped");
}

/// Async front of a worker thread.
pub struct WorkerEngine {
    tx: mpsc::UnboundedSender<Request>,
}

impl WorkerEngine {
    async fn call<T>(
        tx: &mpsc::UnboundedSender<Request>,
        make: impl FnOnce(Reply<T>) -> Request,
    ) -> Result<T, EngineError> {
        let (reply, rx) = oneshot::channel();
        tx.send(make(reply)).map_err(|_| EngineError::WorkerGone)?;
        rx.await.map_err(|_| EngineError::WorkerGone)?
    }
}

impl Engine for WorkerEngine {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, EngineError>> {
        Box::pin(async move {
            let id = Self::call(&self.tx, |reply| Request::Connect { reply })
                .await
                .map_err(|e| match e {
                    EngineError::WorkerGone => e,
                    other => EngineError::Connect(other.to_string()),
                })?;
            debug!(session = id, "connection opened");
            Ok(Box::new(WorkerConnection {
                id,
                tx: self.tx.clone(),
                closed: false,
            }) as Box<dyn Connection>)
        })
    }
}

pub struct WorkerConnection {
    id: u64,
    tx: mpsc::UnboundedSender<Request>,
    closed: bool,
}

impl Connection for WorkerConnection {
    fn id(&self) -> u64 {
        self.id
    }

    fn execute<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<(), EngineError>> {
        let session = self.id;
        Box::pin(WorkerEngine::call(&self.tx, move |reply| Request::Execute {
            session,
            sql: sql.to_string(),
            reply,
        }))
    }

    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<ResultTable, EngineError>> {
        let session = self.id;
        Box::pin(WorkerEngine::call(&self.tx, move |reply| Request::Query {
            session,
            sql: sql.to_string(),
            reply,
        }))
    }

    fn close(mut self: Box<Self>) -> BoxFuture<'static, Result<(), EngineError>> {
        self.closed = true;
        let session = self.id;
        let tx = self.tx.clone();
        Box::pin(async move {
            WorkerEngine::call(&tx, move |reply| Request::Close {
                session,
                reply: Some(reply),
            })
            .await
        })
    }
}

impl Drop for WorkerConnection {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.tx.send(Request::Close {
                session: self.id,
                reply: None,
            });
        }
    }
}
