//! Bookshelf host library: startup composition root and HTTP front.

pub mod composition;
pub mod config;
pub mod di;
pub mod hosting;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod services;
pub mod storage;

pub use composition::CompositionError;
pub use config::{ConfigResolver, Settings};
pub use hosting::HostEnvironment;
pub use http::HttpServer;
pub use lifecycle::{ReadyHost, Shutdown, StartupError};
