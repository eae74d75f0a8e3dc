pub mod bootstrap;
pub mod layers;
pub mod sink;
pub mod timer;
pub mod trace;

pub use bootstrap::{BootstrapOptions, LoggingBootstrap, LoggingContext, LoggingGuard, setup_logging};
