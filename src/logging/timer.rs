use chrono::Local;
use std::fmt::Write as _;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

/// 按 strftime 格式输出本地时间
#[derive(Debug, Clone)]
pub struct LocalTimer {
    datefmt: String,
}

impl LocalTimer {
    pub fn new(datefmt: &str) -> Self {
        Self {
            datefmt: datefmt.to_string(),
        }
    }
}

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        // 非法的格式串会让 chrono 在 Display 时返回错误，这里先写入 String 再退回默认格式
        let mut rendered = String::new();
        if write!(rendered, "{}", Local::now().format(&self.datefmt)).is_err() {
            rendered.clear();
            write!(rendered, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))?;
        }
        w.write_str(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_custom_pattern() {
        let timer = LocalTimer::new("%Y");
        let mut out = String::new();
        timer.format_time(&mut Writer::new(&mut out)).unwrap();
        assert_eq!(out, Local::now().format("%Y").to_string());
    }

    #[test]
    fn invalid_pattern_falls_back() {
        let timer = LocalTimer::new("%Q%");
        let mut out = String::new();
        timer.format_time(&mut Writer::new(&mut out)).unwrap();
        assert!(!out.is_empty());
    }
}
