use lazy_static::lazy_static;
use std::{collections::BTreeMap, fmt, fs, path::PathBuf};

use crate::{config::level::Severity, logging::trace::TraceBuffer};

lazy_static! {
    // 编译期打包进库的配置文件，按文件名查找
    static ref BUILTIN: BTreeMap<&'static str, &'static str> = {
        let mut resources = BTreeMap::new();
        resources.insert("logging.toml", include_str!("../resources/logging.toml"));
        resources
    };
}

/// 环境变量来源
#[derive(Debug, Clone, Default)]
pub enum EnvVars {
    /// 读取进程环境变量
    #[default]
    Process,
    /// 固定的键值表，便于嵌入和测试
    Fixed(BTreeMap<String, String>),
}

impl EnvVars {
    pub fn fixed<K: Into<String>, V: Into<String>>(vars: impl IntoIterator<Item = (K, V)>) -> Self {
        EnvVars::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            EnvVars::Process => std::env::var(key).ok(),
            EnvVars::Fixed(vars) => vars.get(key).cloned(),
        }
    }
}

/// 打包在组件内的文本资源
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    resources: BTreeMap<String, String>,
}

impl Bundle {
    /// 空资源包，只从文件系统读取配置
    pub fn empty() -> Self {
        Self::default()
    }

    /// 库自带的资源包（包含 `logging.toml`）
    pub fn builtin() -> Self {
        Self {
            resources: BUILTIN
                .iter()
                .map(|(name, text)| (name.to_string(), text.to_string()))
                .collect(),
        }
    }

    pub fn with(mut self, name: &str, text: &str) -> Self {
        self.resources.insert(name.to_string(), text.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.resources.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    Resource(String),
    File(PathBuf),
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOrigin::Resource(name) => write!(f, "resource:{name}"),
            ConfigOrigin::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// 读取到的配置原文及其来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,
    pub text: String,
}

fn read_from_bundle(
    filename: &str,
    bundle: &Bundle,
    trace: &mut TraceBuffer,
) -> Option<ConfigSource> {
    match bundle.get(filename) {
        Some(text) if !text.trim().is_empty() => {
            trace.push(Severity::DEBUG, format!("config from resource: {filename}"));
            Some(ConfigSource {
                origin: ConfigOrigin::Resource(filename.to_string()),
                text: text.to_string(),
            })
        }
        Some(_) => {
            trace.push(Severity::DEBUG, format!("resource {filename} is empty"));
            None
        }
        None => {
            trace.push(Severity::DEBUG, format!("no resource named {filename}"));
            None
        }
    }
}

fn read_from_filesystem(filename: &str, trace: &mut TraceBuffer) -> Option<ConfigSource> {
    match fs::read_to_string(filename) {
        Ok(text) if !text.trim().is_empty() => {
            trace.push(Severity::DEBUG, format!("config from file: {filename}"));
            Some(ConfigSource {
                origin: ConfigOrigin::File(PathBuf::from(filename)),
                text,
            })
        }
        Ok(_) => {
            trace.push(Severity::DEBUG, format!("config file {filename} is empty"));
            None
        }
        Err(e) => {
            trace.push(
                Severity::DEBUG,
                format!("cannot read config file {filename}: {e}"),
            );
            None
        }
    }
}

/// 先查打包资源，再查文件系统，第一个成功的来源胜出
///
/// 每一次尝试（成功或失败）都会记入 trace。
pub fn read_config(filename: &str, bundle: &Bundle, trace: &mut TraceBuffer) -> Option<ConfigSource> {
    read_from_bundle(filename, bundle, trace).or_else(|| read_from_filesystem(filename, trace))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn messages(trace: &TraceBuffer) -> Vec<String> {
        trace.events().iter().map(|e| e.message.clone()).collect()
    }

    #[test]
    fn builtin_bundle_contains_default_config() {
        let bundle = Bundle::builtin();
        let text = bundle.get("logging.toml").unwrap();
        assert!(text.contains("[root]"));
    }

    #[test]
    fn resource_wins_over_filesystem() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[root]\nlevel = \"ERROR\"\n").unwrap();
        let name = file.path().to_string_lossy().to_string();

        let bundle = Bundle::empty().with(&name, "[root]\nlevel = \"DEBUG\"\n");
        let mut trace = TraceBuffer::new();
        let source = read_config(&name, &bundle, &mut trace).unwrap();

        assert_eq!(source.origin, ConfigOrigin::Resource(name.clone()));
        assert!(source.text.contains("DEBUG"));
        assert_eq!(messages(&trace), vec![format!("config from resource: {name}")]);
    }

    #[test]
    fn filesystem_used_when_resource_missing() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[root]\n").unwrap();
        let name = file.path().to_string_lossy().to_string();

        let mut trace = TraceBuffer::new();
        let source = read_config(&name, &Bundle::empty(), &mut trace).unwrap();

        assert_eq!(source.origin, ConfigOrigin::File(file.path().to_path_buf()));
        assert_eq!(trace.events().len(), 2);
        assert!(trace.events()[1].message.starts_with("config from file:"));
    }

    #[test]
    fn both_misses_are_recorded() {
        let mut trace = TraceBuffer::new();
        assert!(read_config("/nonexistent.yaml", &Bundle::empty(), &mut trace).is_none());

        let msgs = messages(&trace);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0], "no resource named /nonexistent.yaml");
        assert!(msgs[1].starts_with("cannot read config file /nonexistent.yaml"));
    }

    #[test]
    fn empty_content_counts_as_missing() {
        let file = NamedTempFile::new().unwrap();
        let name = file.path().to_string_lossy().to_string();
        let bundle = Bundle::empty().with(&name, "   \n");

        let mut trace = TraceBuffer::new();
        assert!(read_config(&name, &bundle, &mut trace).is_none());
        assert_eq!(trace.events().len(), 2);
    }

    #[test]
    fn fixed_env_vars() {
        let env = EnvVars::fixed([("LOG_LEVEL", "debug")]);
        assert_eq!(env.get("LOG_LEVEL").as_deref(), Some("debug"));
        assert_eq!(env.get("LOG_CONFIG"), None);
    }
}
