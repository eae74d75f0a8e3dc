use std::fmt;
use std::str::FromStr;

use tracing::Level;
use tracing::level_filters::LevelFilter;

use crate::error::LogError;

/// 日志严重级别阈值
///
/// 数值越大越严重：`CRITICAL > ERROR > WARNING > INFO > DEBUG`。
/// 保留原始整数，只在真正接入 tracing 时才映射到 [`LevelFilter`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Severity(pub u32);

impl Severity {
    pub const NOTSET: Severity = Severity(0);
    pub const TRACE: Severity = Severity(5);
    pub const DEBUG: Severity = Severity(10);
    pub const INFO: Severity = Severity(20);
    pub const WARNING: Severity = Severity(30);
    pub const WARN: Severity = Severity::WARNING;
    pub const ERROR: Severity = Severity(40);
    pub const CRITICAL: Severity = Severity(50);
    pub const FATAL: Severity = Severity::CRITICAL;

    /// 按名称查表（不区分大小写），未知名称返回 `None`
    pub fn from_name(name: &str) -> Option<Severity> {
        match name.to_ascii_uppercase().as_str() {
            "CRITICAL" | "FATAL" => Some(Severity::CRITICAL),
            "ERROR" => Some(Severity::ERROR),
            "WARN" | "WARNING" => Some(Severity::WARNING),
            "INFO" => Some(Severity::INFO),
            "DEBUG" => Some(Severity::DEBUG),
            "TRACE" => Some(Severity::TRACE),
            "NOTSET" => Some(Severity::NOTSET),
            _ => None,
        }
    }

    /// 纯数字字符串（仅 ASCII 数字）解析为整数级别，超出 u32 范围时取最大值
    fn from_digits(raw: &str) -> Option<Severity> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Severity(raw.parse().unwrap_or(u32::MAX)))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// 映射为 tracing 的过滤级别，低于 DEBUG 的一律视为 TRACE
    pub fn level_filter(self) -> LevelFilter {
        match self.0 {
            40.. => LevelFilter::ERROR,
            30..=39 => LevelFilter::WARN,
            20..=29 => LevelFilter::INFO,
            10..=19 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// 映射为发送事件时使用的级别，CRITICAL 以 ERROR 发出
    pub fn level(self) -> Level {
        match self.0 {
            40.. => Level::ERROR,
            30..=39 => Level::WARN,
            20..=29 => Level::INFO,
            10..=19 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    /// 两个阈值中更严格（更大）的一个
    pub fn stricter(self, other: Severity) -> Severity {
        self.max(other)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Severity::CRITICAL => "CRITICAL",
            Severity::ERROR => "ERROR",
            Severity::WARNING => "WARNING",
            Severity::INFO => "INFO",
            Severity::DEBUG => "DEBUG",
            Severity::TRACE => "TRACE",
            Severity::NOTSET => "NOTSET",
            Severity(n) => return write!(f, "Level {n}"),
        };
        f.write_str(name)
    }
}

impl FromStr for Severity {
    type Err = LogError;

    /// 严格解析：数字或已知名称，其余报错（用于配置文件和命令行参数）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::from_digits(s)
            .or_else(|| Severity::from_name(s))
            .ok_or_else(|| LogError::validation(format!("未知的日志级别: {s:?}")))
    }
}

/// 合并环境变量与调用方默认值，得到最终级别
///
/// 1. 纯数字字符串直接作为级别；
/// 2. 非空文本转大写后查表，未知名称视为 INFO；
/// 3. 否则使用 `default`（可能为空）。
///
/// 数字 0 被视为明确给出的级别（NOTSET，即全部输出），不会被当作“未设置”。
pub fn resolve_level(raw: Option<&str>, default: Option<Severity>) -> Option<Severity> {
    match raw {
        Some(raw) if !raw.is_empty() => {
            Some(Severity::from_digits(raw).unwrap_or_else(|| {
                Severity::from_name(raw).unwrap_or(Severity::INFO)
            }))
        }
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_strings_resolve_exactly() {
        for n in [0u32, 1, 10, 15, 20, 35, 50, 99, 4_000_000_000] {
            let raw = n.to_string();
            assert_eq!(resolve_level(Some(&raw), None), Some(Severity(n)));
        }
    }

    #[test]
    fn names_resolve_case_insensitively() {
        let cases = [
            ("critical", Severity::CRITICAL),
            ("Fatal", Severity::CRITICAL),
            ("ERROR", Severity::ERROR),
            ("warn", Severity::WARNING),
            ("Warning", Severity::WARNING),
            ("info", Severity::INFO),
            ("dEbUg", Severity::DEBUG),
        ];
        for (name, expected) in cases {
            assert_eq!(resolve_level(Some(name), None), Some(expected), "{name}");
        }
    }

    #[test]
    fn unknown_names_resolve_to_info() {
        assert_eq!(resolve_level(Some("verbose"), None), Some(Severity::INFO));
        assert_eq!(resolve_level(Some("-5"), Some(Severity::ERROR)), Some(Severity::INFO));
        assert_eq!(resolve_level(Some(" 10"), None), Some(Severity::INFO));
    }

    #[test]
    fn absent_or_empty_falls_back_to_default() {
        assert_eq!(resolve_level(None, Some(Severity::ERROR)), Some(Severity::ERROR));
        assert_eq!(resolve_level(Some(""), Some(Severity::DEBUG)), Some(Severity::DEBUG));
        assert_eq!(resolve_level(None, None), None);
    }

    #[test]
    fn level_filter_buckets() {
        assert_eq!(Severity::CRITICAL.level_filter(), LevelFilter::ERROR);
        assert_eq!(Severity(45).level_filter(), LevelFilter::ERROR);
        assert_eq!(Severity::WARNING.level_filter(), LevelFilter::WARN);
        assert_eq!(Severity(25).level_filter(), LevelFilter::INFO);
        assert_eq!(Severity::DEBUG.level_filter(), LevelFilter::DEBUG);
        assert_eq!(Severity::NOTSET.level_filter(), LevelFilter::TRACE);
        assert_eq!(Severity::CRITICAL.level(), Level::ERROR);
    }

    #[test]
    fn strict_parse_rejects_unknown_names() {
        assert_eq!("debug".parse::<Severity>().unwrap(), Severity::DEBUG);
        assert_eq!("42".parse::<Severity>().unwrap(), Severity(42));
        assert!("loud".parse::<Severity>().is_err());
    }

    #[test]
    fn oversized_numbers_saturate() {
        assert_eq!(
            resolve_level(Some("5000000000"), None),
            Some(Severity(u32::MAX))
        );
        assert_eq!(Severity(u32::MAX).level_filter(), LevelFilter::ERROR);
    }

    #[test]
    fn named_constants_round_trip_through_display() {
        for severity in [
            Severity::NOTSET,
            Severity::TRACE,
            Severity::DEBUG,
            Severity::INFO,
            Severity::WARNING,
            Severity::ERROR,
            Severity::CRITICAL,
        ] {
            assert_eq!(severity.to_string().parse::<Severity>().unwrap(), severity);
        }
        assert_eq!(Severity::from_name("notset"), Some(Severity::NOTSET));
    }

    #[test]
    fn display_uses_names_for_constants() {
        assert_eq!(Severity::WARNING.to_string(), "WARNING");
        assert_eq!(Severity(42).to_string(), "Level 42");
    }
}
