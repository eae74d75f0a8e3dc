use std::fs;

use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;

use crate::{
    config::{
        file::LoggingConfig,
        level::{Severity, resolve_level},
        source::{Bundle, ConfigOrigin, EnvVars, read_config},
    },
    error::{LogError, LogResult},
    logging::{
        layers::{Applied, apply_config, fallback_dispatch},
        sink::ConsoleSink,
        trace::{TraceBuffer, TraceEvent},
    },
};

/// 初始化参数
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// 环境变量未指定配置文件时使用的文件名
    pub default_config_filename: String,
    /// 环境变量未指定级别时使用的级别，可以为空
    pub default_level: Option<Severity>,
    pub env_key_level: String,
    pub env_key_config: String,
    pub env: EnvVars,
    pub bundle: Bundle,
    /// 把所有控制台输出重定向到这里
    pub console_override: Option<ConsoleSink>,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapOptions {
    pub fn new() -> Self {
        Self {
            default_config_filename: "logging.toml".to_string(),
            default_level: None,
            env_key_level: "LOG_LEVEL".to_string(),
            env_key_config: "LOG_CONFIG".to_string(),
            env: EnvVars::Process,
            bundle: Bundle::builtin(),
            console_override: None,
        }
    }

    pub fn set_default_config_filename(mut self, filename: &str) -> Self {
        self.default_config_filename = filename.to_string();
        self
    }

    pub fn set_default_level(mut self, level: Option<Severity>) -> Self {
        self.default_level = level;
        self
    }

    pub fn set_env_key_level(mut self, key: &str) -> Self {
        self.env_key_level = key.to_string();
        self
    }

    pub fn set_env_key_config(mut self, key: &str) -> Self {
        self.env_key_config = key.to_string();
        self
    }

    pub fn set_env(mut self, env: EnvVars) -> Self {
        self.env = env;
        self
    }

    pub fn set_bundle(mut self, bundle: Bundle) -> Self {
        self.bundle = bundle;
        self
    }

    pub fn set_console(mut self, sink: ConsoleSink) -> Self {
        self.console_override = Some(sink);
        self
    }
}

/// 初始化完成后的日志上下文
///
/// 持有构建好的 dispatcher 和文件写入 guard。可以只在局部作用域使用
/// （[`in_scope`](LoggingContext::in_scope)），也可以 [`install`](LoggingContext::install)
/// 为进程全局默认。
#[derive(Debug)]
pub struct LoggingContext {
    dispatch: Dispatch,
    guards: Vec<WorkerGuard>,
    resolved_level: Option<Severity>,
    fallback_level: Option<Severity>,
    origin: Option<ConfigOrigin>,
    trace: Vec<TraceEvent>,
}

impl LoggingContext {
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// 由环境变量或调用方默认值得到的级别
    pub fn resolved_level(&self) -> Option<Severity> {
        self.resolved_level
    }

    /// 使用默认配置时的控制台阈值，使用配置文件时为 `None`
    pub fn fallback_level(&self) -> Option<Severity> {
        self.fallback_level
    }

    pub fn used_defaults(&self) -> bool {
        self.origin.is_none()
    }

    pub fn config_origin(&self) -> Option<&ConfigOrigin> {
        self.origin.as_ref()
    }

    /// 已经输出过的初始化 trace
    pub fn trace(&self) -> &[TraceEvent] {
        &self.trace
    }

    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// 设置为进程全局默认 dispatcher，整个进程只能成功一次
    pub fn install(&self) -> LogResult<()> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| LogError::Init(format!("failed to set global subscriber: {e}")))
    }

    /// 交出文件写入 guard，guard 释放时会刷出剩余日志
    pub fn into_guard(self) -> LoggingGuard {
        LoggingGuard {
            _guards: self.guards,
        }
    }
}

/// 需要在 `main` 中一直持有，直到进程退出
#[derive(Debug)]
#[must_use = "dropping the guard stops file handlers from flushing"]
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

/// 日志初始化流程
#[derive(Debug, Clone, Default)]
pub struct LoggingBootstrap {
    options: BootstrapOptions,
}

impl LoggingBootstrap {
    pub fn new(options: BootstrapOptions) -> Self {
        Self { options }
    }

    /// 解析级别与配置、应用配置或回退到默认值，然后输出一次 trace
    ///
    /// 不会失败：任何错误都会记入 trace 并回退到控制台默认配置。
    pub fn run(&self) -> LoggingContext {
        let opts = &self.options;
        // 从这里开始，任何提前退出都会由 Drop 输出 trace
        let mut trace = TraceBuffer::new()
            .with_last_resort(opts.console_override.clone().unwrap_or(ConsoleSink::Stderr));

        trace.push(
            Severity::DEBUG,
            format!("looking for env. variable {}", opts.env_key_level),
        );
        let level = resolve_level(
            opts.env.get(&opts.env_key_level).as_deref(),
            opts.default_level,
        );

        trace.push(
            Severity::DEBUG,
            format!("looking for env. variable {}", opts.env_key_config),
        );
        let filename = opts
            .env
            .get(&opts.env_key_config)
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| opts.default_config_filename.clone());

        let mut origin = None;
        let mut applied = None;
        if let Some(source) = read_config(&filename, &opts.bundle, &mut trace) {
            match LoggingConfig::parse(&filename, &source.text) {
                Ok(config) => match self.apply(config, level, &mut trace) {
                    Ok(result) => {
                        applied = Some(result);
                        origin = Some(source.origin);
                    }
                    Err(e) => trace.push(Severity::ERROR, e.to_string()),
                },
                Err(e) => trace.push(
                    Severity::DEBUG,
                    format!("ignoring config {}: {e}", source.origin),
                ),
            }
        }

        let (dispatch, guards, fallback_level) = match applied {
            Some(Applied { dispatch, guards }) => (dispatch, guards, None),
            None => {
                let threshold = level.unwrap_or(Severity::WARNING);
                let sink = opts
                    .console_override
                    .clone()
                    .unwrap_or(ConsoleSink::Stderr);
                trace.push(threshold, "using defaults");
                (fallback_dispatch(threshold, sink), Vec::new(), Some(threshold))
            }
        };

        let trace = trace.flush_into(&dispatch);
        LoggingContext {
            dispatch,
            guards,
            resolved_level: level,
            fallback_level,
            origin,
            trace,
        }
    }

    fn apply(
        &self,
        mut config: LoggingConfig,
        level: Option<Severity>,
        trace: &mut TraceBuffer,
    ) -> LogResult<Applied> {
        if let Some(level) = level {
            config.override_logger_levels(level);
        }
        prepare_directories(&config, trace)?;
        let validated = config.validate()?;
        apply_config(&validated, self.options.console_override.as_ref())
    }
}

/// 为 file handler 创建缺失的父目录
fn prepare_directories(config: &LoggingConfig, trace: &mut TraceBuffer) -> LogResult<()> {
    for (_, filename) in config.handler_filenames() {
        let Some(dir) = filename.parent().filter(|d| !d.as_os_str().is_empty()) else {
            continue;
        };
        if dir.is_dir() {
            continue;
        }
        trace.push(
            Severity::INFO,
            format!("creating directory {}", dir.display()),
        );
        fs::create_dir_all(dir).map_err(|source| LogError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// 初始化日志并设为全局默认
///
/// 全局 dispatcher 已被设置时（例如同一进程内的多个测试）只在 stderr 提示，不会报错。
/// 返回的 guard 需要一直持有。
pub fn setup_logging(options: BootstrapOptions) -> LoggingGuard {
    let context = LoggingBootstrap::new(options).run();
    if let Err(error) = context.install() {
        eprintln!("{error} - was logging already initialized in this process?");
    }
    context.into_guard()
}
