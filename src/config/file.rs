use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path};
use tracing::Level;

use crate::{
    config::level::Severity,
    error::{LogError, LogResult},
};

/// 配置文件中的级别：名称或整数
///
/// 解析时保留原样，未知名称在 [`LoggingConfig::validate`] 阶段才报错。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LevelSpec {
    Number(u32),
    Name(String),
}

impl LevelSpec {
    pub fn severity(&self) -> LogResult<Severity> {
        match self {
            LevelSpec::Number(n) => Ok(Severity(*n)),
            LevelSpec::Name(name) => name.parse(),
        }
    }
}

impl From<Severity> for LevelSpec {
    fn from(severity: Severity) -> Self {
        LevelSpec::Number(severity.value())
    }
}

/// 日志格式
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatterConfig {
    /// 时间格式，chrono strftime 语法
    #[serde(default = "default_datefmt")]
    pub datefmt: String,
    #[serde(default = "default_true")]
    pub target: bool,
    #[serde(default)]
    pub thread_ids: bool,
    #[serde(default)]
    pub thread_names: bool,
    #[serde(default)]
    pub file: bool,
    #[serde(default)]
    pub line_number: bool,
    #[serde(default)]
    pub compact: bool,
}

fn default_datefmt() -> String {
    "%Y-%m-%d %H:%M:%S%.3f".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            datefmt: default_datefmt(),
            target: true,
            thread_ids: false,
            thread_names: false,
            file: false,
            line_number: false,
            compact: false,
        }
    }
}

impl FormatterConfig {
    pub fn set_datefmt(mut self, datefmt: &str) -> Self {
        self.datefmt = datefmt.to_string();
        self
    }

    pub fn set_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    #[default]
    Console,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    #[default]
    Stderr,
    Stdout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[default]
    Never,
    Minutely,
    Hourly,
    Daily,
}

/// 输出端（handler）配置
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerConfig {
    #[serde(default)]
    pub kind: HandlerKind,
    #[serde(default)]
    pub level: Option<LevelSpec>,
    #[serde(default)]
    pub formatter: Option<String>,
    /// 仅 console
    #[serde(default)]
    pub stream: Stream,
    /// 仅 file，父目录不存在时会自动创建
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub rotation: Rotation,
    /// 未设置时 console 启用颜色，file 不启用
    #[serde(default)]
    pub ansi: Option<bool>,
}

impl HandlerConfig {
    pub fn console() -> Self {
        Self::default()
    }

    pub fn file(filename: &str) -> Self {
        Self {
            kind: HandlerKind::File,
            filename: Some(filename.to_string()),
            ..Self::default()
        }
    }

    pub fn set_level(mut self, level: Severity) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn set_formatter(mut self, formatter: &str) -> Self {
        self.formatter = Some(formatter.to_string());
        self
    }
}

/// 命名 logger 配置，名称对应 tracing 的 target 前缀
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfig {
    #[serde(default)]
    pub level: Option<LevelSpec>,
    #[serde(default)]
    pub handlers: Vec<String>,
    #[serde(default = "default_true")]
    pub propagate: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: None,
            handlers: Vec::new(),
            propagate: true,
        }
    }
}

impl LoggerConfig {
    pub fn set_level(mut self, level: Severity) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn set_handlers(mut self, handlers: &[&str]) -> Self {
        self.handlers = handlers.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn set_propagate(mut self, propagate: bool) -> Self {
        self.propagate = propagate;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootConfig {
    #[serde(default)]
    pub level: Option<LevelSpec>,
    #[serde(default)]
    pub handlers: Vec<String>,
}

/// 声明式日志配置文件的顶层结构
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub root: RootConfig,
    #[serde(default)]
    pub formatters: BTreeMap<String, FormatterConfig>,
    #[serde(default)]
    pub handlers: BTreeMap<String, HandlerConfig>,
    #[serde(default)]
    pub loggers: BTreeMap<String, LoggerConfig>,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> LogResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| LogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&path.to_string_lossy(), &content)
    }

    pub fn from_toml_str(s: &str) -> LogResult<Self> {
        Ok(toml::from_str(s)?)
    }

    #[cfg(feature = "json")]
    pub fn from_json_str(s: &str) -> LogResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// 按文件扩展名选择格式：`.json` 走 JSON（需启用 `json` feature），其余按 TOML 解析
    #[cfg(feature = "json")]
    pub fn parse(filename: &str, s: &str) -> LogResult<Self> {
        if filename.to_ascii_lowercase().ends_with(".json") {
            Self::from_json_str(s)
        } else {
            Self::from_toml_str(s)
        }
    }

    #[cfg(not(feature = "json"))]
    pub fn parse(_filename: &str, s: &str) -> LogResult<Self> {
        Self::from_toml_str(s)
    }

    pub fn set_root(mut self, level: Option<Severity>, handlers: &[&str]) -> Self {
        self.root = RootConfig {
            level: level.map(LevelSpec::from),
            handlers: handlers.iter().map(|h| h.to_string()).collect(),
        };
        self
    }

    pub fn set_formatter(mut self, name: &str, formatter: FormatterConfig) -> Self {
        self.formatters.insert(name.to_string(), formatter);
        self
    }

    pub fn set_handler(mut self, name: &str, handler: HandlerConfig) -> Self {
        self.handlers.insert(name.to_string(), handler);
        self
    }

    pub fn set_logger(mut self, name: &str, logger: LoggerConfig) -> Self {
        self.loggers.insert(name.to_string(), logger);
        self
    }

    /// 用解析得到的级别覆盖每个 logger 的级别（root 保持不变）
    pub fn override_logger_levels(&mut self, level: Severity) {
        for logger in self.loggers.values_mut() {
            logger.level = Some(level.into());
        }
    }

    /// 所有 file handler 的输出文件路径
    pub fn handler_filenames(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.handlers.iter().filter_map(|(name, handler)| {
            handler
                .filename
                .as_deref()
                .map(|filename| (name.as_str(), Path::new(filename)))
        })
    }

    /// 一次性检查所有引用与级别，生成可直接应用的配置
    pub fn validate(&self) -> LogResult<ValidatedConfig> {
        match self.version {
            Some(version) if version != 1 => {
                return Err(LogError::validation(format!(
                    "不支持的配置版本: {version}"
                )));
            }
            _ => {}
        }

        let mut handlers = BTreeMap::new();
        for (name, handler) in &self.handlers {
            let level = match &handler.level {
                Some(level) => level
                    .severity()
                    .map_err(|e| in_context(&format!("handler {name}"), e))?,
                None => Severity::NOTSET,
            };
            let formatter = match &handler.formatter {
                Some(formatter) => self.formatters.get(formatter).cloned().ok_or_else(|| {
                    LogError::validation(format!(
                        "handler {name} 引用了未定义的 formatter: {formatter}"
                    ))
                })?,
                None => FormatterConfig::default(),
            };
            let output = match handler.kind {
                HandlerKind::Console => HandlerOutput::Console {
                    stream: handler.stream,
                },
                HandlerKind::File => {
                    let filename = handler
                        .filename
                        .as_deref()
                        .filter(|f| !f.is_empty())
                        .ok_or_else(|| {
                            LogError::validation(format!("file handler {name} 缺少 filename"))
                        })?;
                    if Path::new(filename).file_name().is_none() {
                        return Err(LogError::validation(format!(
                            "file handler {name} 的 filename 不是文件: {filename}"
                        )));
                    }
                    HandlerOutput::File {
                        filename: filename.into(),
                        rotation: handler.rotation,
                    }
                }
            };
            let ansi = handler
                .ansi
                .unwrap_or(matches!(handler.kind, HandlerKind::Console));
            handlers.insert(
                name.clone(),
                ValidatedHandler {
                    level,
                    formatter,
                    output,
                    ansi,
                },
            );
        }

        let check_refs = |owner: &str, refs: &[String]| -> LogResult<()> {
            match refs.iter().find(|h| !handlers.contains_key(h.as_str())) {
                Some(missing) => Err(LogError::validation(format!(
                    "{owner} 引用了未定义的 handler: {missing}"
                ))),
                None => Ok(()),
            }
        };

        check_refs("root", &self.root.handlers)?;
        let root_level = match &self.root.level {
            Some(level) => level
                .severity()
                .map_err(|e| in_context("root", e))?,
            None => Severity::WARNING,
        };

        let mut loggers = BTreeMap::new();
        for (name, logger) in &self.loggers {
            if name.is_empty() {
                return Err(LogError::validation("logger 名称不能为空"));
            }
            check_refs(&format!("logger {name}"), &logger.handlers)?;
            let level = match &logger.level {
                Some(level) => Some(
                    level
                        .severity()
                        .map_err(|e| in_context(&format!("logger {name}"), e))?,
                ),
                None => None,
            };
            loggers.insert(
                name.clone(),
                ValidatedLogger {
                    level,
                    handlers: logger.handlers.clone(),
                    propagate: logger.propagate,
                },
            );
        }

        Ok(ValidatedConfig {
            root_level,
            root_handlers: self.root.handlers.clone(),
            handlers,
            loggers,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutput {
    Console {
        stream: Stream,
    },
    File {
        filename: std::path::PathBuf,
        rotation: Rotation,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedHandler {
    pub level: Severity,
    pub formatter: FormatterConfig,
    pub output: HandlerOutput,
    pub ansi: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLogger {
    /// 未设置时继承 root 级别
    pub level: Option<Severity>,
    pub handlers: Vec<String>,
    pub propagate: bool,
}

/// 已校验的配置，所有级别都已解析、所有引用都存在
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedConfig {
    pub root_level: Severity,
    pub root_handlers: Vec<String>,
    pub handlers: BTreeMap<String, ValidatedHandler>,
    pub loggers: BTreeMap<String, ValidatedLogger>,
}

/// 给校验错误加上出处，不重复包装
fn in_context(owner: &str, err: LogError) -> LogError {
    match err {
        LogError::Validation(msg) => LogError::Validation(format!("{owner}: {msg}")),
        other => other,
    }
}

/// `name` 是否是 `target` 本身或其 `::` 分隔的祖先
fn is_ancestor_or_self(name: &str, target: &str) -> bool {
    target
        .strip_prefix(name)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

impl ValidatedConfig {
    /// 负责某个 target 的 logger：已声明的、按 `::` 边界匹配的最长名称
    pub fn owning_logger(&self, target: &str) -> Option<&str> {
        self.loggers
            .keys()
            .filter(|name| is_ancestor_or_self(name, target))
            .max_by_key(|name| name.len())
            .map(String::as_str)
    }

    /// 已声明的最近祖先 logger
    pub fn parent_logger(&self, logger: &str) -> Option<&str> {
        self.loggers
            .keys()
            .filter(|name| name.len() < logger.len() && is_ancestor_or_self(name, logger))
            .max_by_key(|name| name.len())
            .map(String::as_str)
    }

    /// 从 logger 往上找第一个设置了级别的祖先，都没有则用 root 级别
    pub fn effective_level(&self, logger: &str) -> Severity {
        let mut current = Some(logger);
        while let Some(name) = current {
            if let Some(level) = self.loggers.get(name).and_then(|l| l.level) {
                return level;
            }
            current = self.parent_logger(name);
        }
        self.root_level
    }

    /// handler 对 root（未匹配任何 logger 的事件）生效的阈值，`None` 表示不接收
    pub fn root_threshold(&self, handler: &str) -> Option<Severity> {
        let spec = self.handlers.get(handler)?;
        self.root_handlers
            .iter()
            .any(|h| h == handler)
            .then(|| self.root_level.stricter(spec.level))
    }

    /// handler 对某个 logger 生效的阈值，`None` 表示该 logger 的事件不会到达此 handler
    ///
    /// 事件沿祖先 logger 逐级传播直到 root，遇到 `propagate = false` 的 logger 就停止。
    pub fn logger_threshold(&self, handler: &str, logger: &str) -> Option<Severity> {
        let spec = self.handlers.get(handler)?;
        self.loggers.get(logger)?;

        let mut attached = false;
        let mut reaches_root = true;
        let mut current = Some(logger);
        while let Some(name) = current {
            let Some(entry) = self.loggers.get(name) else {
                break;
            };
            if entry.handlers.iter().any(|h| h == handler) {
                attached = true;
                break;
            }
            if !entry.propagate {
                reaches_root = false;
                break;
            }
            current = self.parent_logger(name);
        }
        let attached =
            attached || (reaches_root && self.root_handlers.iter().any(|h| h == handler));
        attached.then(|| self.effective_level(logger).stricter(spec.level))
    }

    /// 某个 target 上的事件在该 handler 生效的阈值
    pub fn target_threshold(&self, handler: &str, target: &str) -> Option<Severity> {
        match self.owning_logger(target) {
            Some(logger) => self.logger_threshold(handler, logger),
            None => self.root_threshold(handler),
        }
    }

    /// handler 是否接收 `target` 上 `level` 级别的事件
    pub fn accepts(&self, handler: &str, target: &str, level: &Level) -> bool {
        self.target_threshold(handler, target)
            .is_some_and(|threshold| *level <= threshold.level_filter())
    }
}
