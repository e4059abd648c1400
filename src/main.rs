use anyhow::Result;
use clap::{Parser, Subcommand};
use ftpmirror_lib::commands;
use ftpmirror_lib::config::MirrorConfig;
use ftpmirror_lib::logging::{get_log_dir, LogConfig, SizeRotatingWriter};
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

/// FTP 站点镜像部署工具
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径（默认 ./ftpmirror.json）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 覆盖配置中的 FTP 用户名
    #[arg(long)]
    user: Option<String>,

    /// 覆盖配置中的 FTP 密码
    #[arg(long, env = "FTPMIRROR_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 比较本地与远端文件树，只打印差异
    Compare {
        /// 相对两侧根目录的子路径
        path: Option<String>,
    },
    /// 镜像同步：上传新增/变更文件并删除远端多余文件
    Mirror {
        /// 相对两侧根目录的子路径
        path: Option<String>,
        /// 只打印将要执行的动作，不做修改
        #[arg(long)]
        dry_run: bool,
    },
    /// 部署：仅上传新增/变更文件，不删除远端文件
    Deploy {
        /// 只打印将要执行的动作，不做修改
        #[arg(long)]
        dry_run: bool,
    },
    /// 上传单个文件或目录
    Upload {
        /// 本地路径（必须位于 localRoot 内）
        local_path: String,
        /// 远端目标路径，省略时按相对位置推算
        remote_path: Option<String>,
    },
    /// 下载远端文件
    Download {
        remote_path: String,
        local_path: String,
    },
    /// 列出远端目录（单层）
    List { path: Option<String> },
    /// 递归删除远端目录下的全部内容
    DeleteAll {
        path: Option<String>,
        /// 确认执行删除
        #[arg(long)]
        yes: bool,
    },
}

/// 初始化日志：控制台始终输出，文件日志按配置启用
fn init_logging(config: &LogConfig) {
    let level = config.tracing_level();
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("opendal=warn".parse().unwrap())
        .add_directive("suppaftp=warn".parse().unwrap());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    if config.enabled {
        let log_dir = get_log_dir();
        if let Ok(file_writer) = SizeRotatingWriter::new(&log_dir, config.max_size_mb) {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false);

            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .with(file_layer);
            let _ = tracing::subscriber::set_global_default(subscriber);
            return;
        }
    }

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = MirrorConfig::load(cli.config.as_deref())?;

    // 凭据只在这里解析一次：命令行 / 环境变量 > 配置文件
    if let Some(user) = cli.user {
        config.username = user;
    }
    if let Some(password) = cli.password {
        config.password = Some(password);
    }

    init_logging(&config.log);

    match cli.command {
        Command::Compare { path } => commands::sync::compare(&config, path.as_deref()).await,
        Command::Mirror { path, dry_run } => {
            commands::sync::mirror(&config, path.as_deref(), dry_run).await
        }
        Command::Deploy { dry_run } => commands::sync::deploy(&config, dry_run).await,
        Command::Upload {
            local_path,
            remote_path,
        } => commands::transfer::upload(&config, &local_path, remote_path.as_deref()).await,
        Command::Download {
            remote_path,
            local_path,
        } => commands::transfer::download(&config, &remote_path, &local_path).await,
        Command::List { path } => commands::transfer::list(&config, path.as_deref()).await,
        Command::DeleteAll { path, yes } => {
            commands::transfer::delete_all(&config, path.as_deref(), yes).await
        }
    }
}
