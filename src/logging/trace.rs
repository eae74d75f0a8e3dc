use tracing::{Dispatch, Level, subscriber::NoSubscriber};

use crate::config::level::Severity;
use crate::logging::{layers::fallback_dispatch, sink::ConsoleSink};

/// 初始化过程自身的诊断事件都使用这个 target
pub const TRACE_TARGET: &str = "log_bootstrap::setup";

/// 初始化过程中记录的一条诊断事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub severity: Severity,
    pub message: String,
}

/// 只追加的 trace 缓冲区，保证恰好输出一次
///
/// 正常结束时由调用方显式 [`flush_into`](TraceBuffer::flush_into) 新建的 dispatcher；
/// 提前返回或 panic 展开时由 `Drop` 输出到当时的默认 dispatcher；
/// 若此时没有任何 dispatcher，则输出到 WARNING 级别的兜底控制台。
/// 已输出过的缓冲区再次 flush 不会产生任何事件。
#[derive(Debug)]
pub struct TraceBuffer {
    events: Vec<TraceEvent>,
    flushed: bool,
    last_resort: ConsoleSink,
}

impl Default for TraceBuffer {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            flushed: false,
            last_resort: ConsoleSink::Stderr,
        }
    }
}

impl TraceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置没有 dispatcher 时 `Drop` 使用的输出目标
    pub fn with_last_resort(mut self, sink: ConsoleSink) -> Self {
        self.last_resort = sink;
        self
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.events.push(TraceEvent {
            severity,
            message: message.into(),
        });
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// 输出到当前默认 dispatcher，返回已输出的事件
    pub fn flush(&mut self) -> Vec<TraceEvent> {
        if self.flushed {
            return Vec::new();
        }
        self.flushed = true;
        let events = std::mem::take(&mut self.events);
        events.iter().for_each(emit);
        events
    }

    pub fn flush_into(&mut self, dispatch: &Dispatch) -> Vec<TraceEvent> {
        tracing::dispatcher::with_default(dispatch, || self.flush())
    }
}

impl Drop for TraceBuffer {
    fn drop(&mut self) {
        if self.flushed {
            return;
        }
        let unset = tracing::dispatcher::get_default(|d| d.is::<NoSubscriber>());
        if unset {
            let dispatch = fallback_dispatch(Severity::WARNING, self.last_resort.clone());
            self.flush_into(&dispatch);
        } else {
            self.flush();
        }
    }
}

fn emit(event: &TraceEvent) {
    let message = &event.message;
    match event.severity.level() {
        Level::ERROR => tracing::error!(target: TRACE_TARGET, "setup_logging: {message}"),
        Level::WARN => tracing::warn!(target: TRACE_TARGET, "setup_logging: {message}"),
        Level::INFO => tracing::info!(target: TRACE_TARGET, "setup_logging: {message}"),
        Level::DEBUG => tracing::debug!(target: TRACE_TARGET, "setup_logging: {message}"),
        _ => tracing::trace!(target: TRACE_TARGET, "setup_logging: {message}"),
    }
}
