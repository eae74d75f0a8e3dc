#[cfg(feature = "cli")]
pub mod command;
pub mod config;
pub mod error;
pub mod logging;

// 重新导出主要的公共接口
#[cfg(feature = "cli")]
pub use command::cli::Cli;
pub use config::file::LoggingConfig;
pub use config::level::{Severity, resolve_level};
pub use error::{LogError, LogResult};
pub use logging::{BootstrapOptions, LoggingBootstrap, LoggingContext, LoggingGuard, setup_logging};

/// 库版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
