//! Request-scoped logging.
//!
//! The logger is registered once for the whole process but resolves the
//! active request on every call through a [`RequestContextAccessor`]. With no
//! active request it writes a context-free record.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::Level;

/// Identity of the request being handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub method: String,
    pub path: String,
}

impl RequestContext {
    pub fn new(
        request_id: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            method: method.into(),
            path: path.into(),
        }
    }
}

/// Something that can produce the active request, if any.
pub trait RequestContextAccessor: Send + Sync {
    fn current(&self) -> Option<RequestContext>;
}

tokio::task_local! {
    static CURRENT_REQUEST: RequestContext;
}

/// Accessor backed by a tokio task-local set by the HTTP layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskLocalRequestContext;

impl TaskLocalRequestContext {
    /// Run `fut` with `context` as the active request.
    pub async fn scope<F: Future>(context: RequestContext, fut: F) -> F::Output {
        CURRENT_REQUEST.scope(context, fut).await
    }

    /// Synchronous variant of [`scope`](Self::scope).
    pub fn sync_scope<R>(context: RequestContext, f: impl FnOnce() -> R) -> R {
        CURRENT_REQUEST.sync_scope(context, f)
    }
}

impl RequestContextAccessor for TaskLocalRequestContext {
    fn current(&self) -> Option<RequestContext> {
        CURRENT_REQUEST.try_with(RequestContext::clone).ok()
    }
}

/// One captured log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub category: String,
    pub message: String,
}

/// Recent log lines per request id.
#[derive(Debug)]
pub struct RequestLogStore {
    records: DashMap<String, VecDeque<LogRecord>>,
    order: Mutex<VecDeque<String>>,
    max_requests: usize,
    max_records: usize,
}

impl Default for RequestLogStore {
    fn default() -> Self {
        Self::new(256, 100)
    }
}

impl RequestLogStore {
    pub fn new(max_requests: usize, max_records: usize) -> Self {
        Self {
            records: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            max_requests: max_requests.max(1),
            max_records: max_records.max(1),
        }
    }

    pub fn append(&self, request_id: &str, record: LogRecord) {
        let first = match self.records.entry(request_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let lines = entry.get_mut();
                if lines.len() == self.max_records {
                    lines.pop_front();
                }
                lines.push_back(record);
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(VecDeque::from([record]));
                true
            }
        };
        // The shard lock is released here; tracking may evict from `records`.
        if first {
            self.track(request_id);
        }
    }

    /// Lines captured for `request_id`, oldest first.
    pub fn get(&self, request_id: &str) -> Vec<LogRecord> {
        self.records
            .get(request_id)
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn tracked_requests(&self) -> usize {
        self.records.len()
    }

    fn track(&self, request_id: &str) {
        let Ok(mut order) = self.order.lock() else {
            return;
        };
        order.push_back(request_id.to_string());
        while order.len() > self.max_requests {
            if let Some(evicted) = order.pop_front() {
                self.records.remove(&evicted);
            }
        }
    }
}

/// Creates [`RequestLogger`]s. Registered once per process.
#[derive(Clone)]
pub struct RequestLoggerProvider {
    accessor: Arc<dyn RequestContextAccessor>,
    store: Arc<RequestLogStore>,
}

impl RequestLoggerProvider {
    pub fn new(accessor: Arc<dyn RequestContextAccessor>, store: Arc<RequestLogStore>) -> Self {
        Self { accessor, store }
    }

    pub fn create_logger(&self, category: impl Into<String>) -> RequestLogger {
        RequestLogger {
            category: category.into(),
            accessor: self.accessor.clone(),
            store: self.store.clone(),
        }
    }

    pub fn store(&self) -> &Arc<RequestLogStore> {
        &self.store
    }
}

impl fmt::Debug for RequestLoggerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLoggerProvider").finish_non_exhaustive()
    }
}

macro_rules! event_at {
    ($level:expr, $($rest:tt)+) => {
        match $level {
            Level::ERROR => tracing::event!(Level::ERROR, $($rest)+),
            Level::WARN => tracing::event!(Level::WARN, $($rest)+),
            Level::INFO => tracing::event!(Level::INFO, $($rest)+),
            Level::DEBUG => tracing::event!(Level::DEBUG, $($rest)+),
            _ => tracing::event!(Level::TRACE, $($rest)+),
        }
    };
}

/// Logger whose records carry the request active at call time.
#[derive(Clone)]
pub struct RequestLogger {
    category: String,
    accessor: Arc<dyn RequestContextAccessor>,
    store: Arc<RequestLogStore>,
}

impl RequestLogger {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn log(&self, level: Level, message: impl fmt::Display) {
        let message = message.to_string();
        let category = self.category.as_str();

        match self.accessor.current() {
            Some(ctx) => {
                event_at!(
                    level,
                    request_id = %ctx.request_id,
                    method = %ctx.method,
                    path = %ctx.path,
                    category,
                    "{message}"
                );
                self.store.append(
                    &ctx.request_id,
                    LogRecord {
                        level,
                        category: self.category.clone(),
                        message,
                    },
                );
            }
            None => event_at!(level, category, "{message}"),
        }
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.log(Level::INFO, message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.log(Level::WARN, message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.log(Level::ERROR, message);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Level::DEBUG, message);
    }
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger")
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> RequestLoggerProvider {
        RequestLoggerProvider::new(
            Arc::new(TaskLocalRequestContext),
            Arc::new(RequestLogStore::default()),
        )
    }

    #[test]
    fn test_no_active_request_degrades() {
        let provider = provider();
        let logger = provider.create_logger("books");
        logger.info("background work");
        assert_eq!(provider.store().tracked_requests(), 0);
    }

    #[test]
    fn test_records_attach_to_active_request() {
        let provider = provider();
        let logger = provider.create_logger("books");

        TaskLocalRequestContext::sync_scope(RequestContext::new("req-1", "GET", "/"), || {
            logger.info("listing books");
            logger.warn("slow query");
        });
        TaskLocalRequestContext::sync_scope(RequestContext::new("req-2", "GET", "/x"), || {
            logger.error("boom");
        });
        logger.info("after requests");

        let first = provider.store().get("req-1");
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].message, "listing books");
        assert_eq!(first[1].level, Level::WARN);
        assert_eq!(provider.store().get("req-2").len(), 1);
        assert_eq!(provider.store().tracked_requests(), 2);
    }

    #[tokio::test]
    async fn test_context_resolved_lazily_per_call() {
        let provider = provider();
        let logger = provider.create_logger("books");

        let accessor = TaskLocalRequestContext;
        assert_eq!(accessor.current(), None);

        let inner = logger.clone();
        TaskLocalRequestContext::scope(RequestContext::new("req-9", "POST", "/orders"), async move {
            tokio::task::yield_now().await;
            assert_eq!(
                TaskLocalRequestContext.current().map(|c| c.request_id),
                Some("req-9".to_string())
            );
            inner.info("inside");
        })
        .await;

        assert_eq!(provider.store().get("req-9").len(), 1);
    }

    #[test]
    fn test_store_bounds() {
        let store = RequestLogStore::new(2, 3);
        let record = |m: &str| LogRecord {
            level: Level::INFO,
            category: "c".into(),
            message: m.into(),
        };

        for i in 0..5 {
            store.append("a", record(&i.to_string()));
        }
        let lines = store.get("a");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].message, "2");

        store.append("b", record("x"));
        store.append("c", record("y"));
        assert_eq!(store.tracked_requests(), 2);
        assert!(store.get("a").is_empty());
    }

    #[test]
    fn test_concurrent_first_appends_track_once() {
        let store = Arc::new(RequestLogStore::new(2, 16));
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    store.append(
                        "a",
                        LogRecord {
                            level: Level::INFO,
                            category: "c".into(),
                            message: i.to_string(),
                        },
                    );
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        store.append(
            "b",
            LogRecord {
                level: Level::INFO,
                category: "c".into(),
                message: "x".into(),
            },
        );

        assert_eq!(store.get("a").len(), 8);
        assert_eq!(store.tracked_requests(), 2);
    }
}
