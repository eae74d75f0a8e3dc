use clap::{Parser, Subcommand};
use std::io::{self, Write};
use tracing::{debug, error, info, warn};

use crate::{
    config::level::Severity, error::LogResult, logging::bootstrap::BootstrapOptions,
};

/// 具名 logger 示例使用的 target
pub const NAMED_TARGET: &str = "main";

#[derive(Parser, Debug)]
#[command(name = crate::NAME)]
#[command(about = crate::DESCRIPTION, long_about = None)]
#[command(version = crate::VERSION)]
pub struct Cli {
    /// 日志配置文件（环境变量 LOG_CONFIG 优先）
    #[arg(long, global = true, value_name = "FILE", default_value = "logging.toml")]
    pub log_config: String,

    /// 默认日志级别，名称或整数（环境变量 LOG_LEVEL 优先）
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<Severity>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// 在每个级别各输出一条日志（默认 target 和 `main` logger 各一组）
    ShowLogs,
    /// 打印问候语
    Hello {
        name: String,
    },
}

impl Cli {
    pub fn bootstrap_options(&self) -> BootstrapOptions {
        BootstrapOptions::new()
            .set_default_config_filename(&self.log_config)
            .set_default_level(self.log_level)
    }

    pub fn invoke(self) -> LogResult<()> {
        self.command.invoke(&mut io::stdout())
    }
}

impl Command {
    pub fn invoke(self, out: &mut impl Write) -> LogResult<()> {
        match self {
            Command::ShowLogs => show_logs(),
            Command::Hello { name } => writeln!(out, "Hello {name}")?,
        }
        Ok(())
    }
}

fn show_logs() {
    debug!("logging: debug message");
    info!("logging: info message");
    warn!("logging: warn message");
    error!("logging: error message");
    error!(critical = true, "logging: critical message");

    debug!(target: NAMED_TARGET, "specific logger: debug message");
    info!(target: NAMED_TARGET, "specific logger: info message");
    warn!(target: NAMED_TARGET, "specific logger: warn message");
    error!(target: NAMED_TARGET, "specific logger: error message");
    error!(target: NAMED_TARGET, critical = true, "specific logger: critical message");
}
