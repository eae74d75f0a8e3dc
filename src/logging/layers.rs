use std::path::Path;
use std::sync::Arc;

use tracing::{Dispatch, Metadata};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::{
    Layer, Registry,
    filter::{FilterFn, filter_fn},
    fmt::{self, MakeWriter},
    layer::Filter,
    prelude::*,
};

use crate::{
    config::{
        file::{FormatterConfig, HandlerOutput, Rotation, ValidatedConfig},
        level::Severity,
    },
    error::{LogError, LogResult},
    logging::{sink::ConsoleSink, timer::LocalTimer},
};

pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// 由配置构建出的 dispatcher，以及需要保持存活的文件写入 guard
#[derive(Debug)]
pub struct Applied {
    pub dispatch: Dispatch,
    pub guards: Vec<WorkerGuard>,
}

/// 某个 handler 的逐 target 过滤规则：按 `::` 边界找到所属 logger，再沿祖先链传播
fn handler_filter(
    config: &Arc<ValidatedConfig>,
    handler: &str,
) -> FilterFn<impl Fn(&Metadata<'_>) -> bool + Send + Sync + 'static> {
    let config = Arc::clone(config);
    let handler = handler.to_string();
    filter_fn(move |meta: &Metadata<'_>| config.accepts(&handler, meta.target(), meta.level()))
}

fn format_layer<W, F>(writer: W, formatter: &FormatterConfig, ansi: bool, filter: F) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    F: Filter<Registry> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_timer(LocalTimer::new(&formatter.datefmt))
        .with_ansi(ansi)
        .with_target(formatter.target)
        .with_thread_ids(formatter.thread_ids)
        .with_thread_names(formatter.thread_names)
        .with_file(formatter.file)
        .with_line_number(formatter.line_number);

    if formatter.compact {
        layer.compact().with_filter(filter).boxed()
    } else {
        layer.with_filter(filter).boxed()
    }
}

fn file_appender(filename: &Path, rotation: Rotation) -> LogResult<RollingFileAppender> {
    let directory = match filename.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let prefix = filename
        .file_name()
        .ok_or_else(|| LogError::validation(format!("不是文件路径: {}", filename.display())))?
        .to_string_lossy()
        .into_owned();
    let rotation = match rotation {
        Rotation::Never => rolling::Rotation::NEVER,
        Rotation::Minutely => rolling::Rotation::MINUTELY,
        Rotation::Hourly => rolling::Rotation::HOURLY,
        Rotation::Daily => rolling::Rotation::DAILY,
    };

    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(prefix)
        .build(directory)
        .map_err(|e| LogError::Init(format!("无法打开日志文件 {}: {e}", filename.display())))
}

/// 把已校验的配置转换为 tracing 的 dispatcher
///
/// 每个 handler 对应一个 fmt layer，带有自己的逐 target 过滤。
/// `console_override` 存在时所有 console handler 都改写到该目标。
pub fn apply_config(
    config: &ValidatedConfig,
    console_override: Option<&ConsoleSink>,
) -> LogResult<Applied> {
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(config.handlers.len());
    let mut guards = Vec::new();
    let shared = Arc::new(config.clone());

    for (name, handler) in &config.handlers {
        let filter = handler_filter(&shared, name);
        match &handler.output {
            HandlerOutput::Console { stream } => {
                let sink = console_override
                    .cloned()
                    .unwrap_or_else(|| ConsoleSink::from(*stream));
                let ansi = handler.ansi && sink.supports_ansi();
                layers.push(format_layer(sink, &handler.formatter, ansi, filter));
            }
            HandlerOutput::File { filename, rotation } => {
                let appender = file_appender(filename, *rotation)?;
                let (writer, guard) = tracing_appender::non_blocking(appender);
                guards.push(guard);
                layers.push(format_layer(writer, &handler.formatter, handler.ansi, filter));
            }
        }
    }

    Ok(Applied {
        dispatch: Dispatch::new(Registry::default().with(layers)),
        guards,
    })
}

/// 默认配置：单个带颜色的控制台输出
pub fn fallback_dispatch(level: Severity, sink: ConsoleSink) -> Dispatch {
    let ansi = sink.supports_ansi();
    let layer = fmt::layer()
        .with_writer(sink)
        .with_timer(LocalTimer::new(&FormatterConfig::default().datefmt))
        .with_ansi(ansi)
        .with_target(true)
        .with_filter(level.level_filter());
    Dispatch::new(Registry::default().with(layer))
}
