use clap::Parser;
use log_bootstrap::{Cli, error::LogError, setup_logging};

fn main() -> Result<(), LogError> {
    let cli = Cli::parse();

    // guard 必须持有到进程退出，否则文件 handler 的缓冲内容会丢失
    let _logging = setup_logging(cli.bootstrap_options());
    tracing::debug!(command = ?cli.command, "日志初始化完成");

    cli.invoke()
}
