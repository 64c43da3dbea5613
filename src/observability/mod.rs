//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     → logging.rs (subscriber, filter, format)
//!
//! Per request:
//!     http layer sets RequestContext (task-local)
//!     → RequestLogger::log resolves it lazily
//!     → tracing event with request_id / method / path
//!     → RequestLogStore (recent lines per request)
//!
//! Background work:
//!     → RequestLogger::log finds no context → plain event
//! ```

pub mod logging;
pub mod request_logger;

pub use logging::{default_directive, init_tracing, LogLevelReloader};
pub use request_logger::{
    LogRecord, RequestContext, RequestContextAccessor, RequestLogStore, RequestLogger,
    RequestLoggerProvider, TaskLocalRequestContext,
};
