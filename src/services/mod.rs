//! Application service layer.
//!
//! Registered through [`ServiceLayerModule`], the module-based registration
//! source loaded after the host's native registrations.

use std::sync::Arc;

use serde_json::Value;

use crate::di::{ServiceCollection, ServiceModule};
use crate::observability::{RequestLogger, RequestLoggerProvider};
use crate::storage::{StoreError, StoreHandle};

/// Collection holding the book catalog.
pub const BOOKS_COLLECTION: &str = "books";

/// Read access to the book catalog.
pub trait BookCatalog: Send + Sync {
    fn count(&self) -> Result<usize, StoreError>;

    fn list(&self) -> Result<Vec<Value>, StoreError>;
}

/// [`BookCatalog`] over the request's store handle.
#[derive(Debug)]
pub struct StoreBookCatalog {
    store: Arc<StoreHandle>,
    logger: RequestLogger,
}

impl StoreBookCatalog {
    pub fn new(store: Arc<StoreHandle>, logger: RequestLogger) -> Self {
        Self { store, logger }
    }
}

impl BookCatalog for StoreBookCatalog {
    fn count(&self) -> Result<usize, StoreError> {
        self.store.with_session(|s| s.count(BOOKS_COLLECTION))
    }

    fn list(&self) -> Result<Vec<Value>, StoreError> {
        let books = self.store.with_session(|s| s.list(BOOKS_COLLECTION))?;
        self.logger.debug(format_args!("Listed {} books", books.len()));
        Ok(books)
    }
}

/// Registers the service layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceLayerModule;

impl ServiceModule for ServiceLayerModule {
    fn name(&self) -> &'static str {
        "service-layer"
    }

    fn load(&self, services: &mut ServiceCollection) {
        services.add_scoped::<dyn BookCatalog, _>(|r| {
            let store = r.get::<StoreHandle>()?;
            let loggers = r.get::<RequestLoggerProvider>()?;
            Ok(Arc::new(StoreBookCatalog::new(
                store,
                loggers.create_logger("BookCatalog"),
            )))
        });
        services.add_transient::<RequestLogger, _>(|r| {
            let loggers = r.get::<RequestLoggerProvider>()?;
            Ok(Arc::new(loggers.create_logger("app")))
        });
    }
}

