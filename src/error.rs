use std::path::PathBuf;

/// 定义日志相关的错误类型和结果类型
pub type LogResult<T> = std::result::Result<T, LogError>;

/// 日志初始化过程中可能出现的错误
///
/// 这些错误不会从 `setup_logging` 向调用方传播，而是记录为 trace 事件后回退到默认配置。
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("日志文件 I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("无法读取 {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("无法创建目录 {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML 解析错误: {0}")]
    Toml(#[from] toml::de::Error),

    #[cfg(feature = "json")]
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("日志配置错误: {0}")]
    Validation(String),

    #[error("日志初始化错误: {0}")]
    Init(String),
}

impl LogError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LogError::Validation(msg.into())
    }
}
