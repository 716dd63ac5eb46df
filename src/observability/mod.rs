//! 可观测性：控制台 + 每次运行一个日志文件
//!
//! 级别默认取配置中的 logging.level，RUST_LOG 可覆盖。控制台输出到 stderr（compact），
//! 文件为 `<log_dir>/run_YYYY-MM-DD_HH-MM-SS.log`（无 ANSI）。

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingSection;

/// 本次运行的日志文件路径
pub fn log_file_path(log_dir: &Path, now: chrono::DateTime<chrono::Local>) -> PathBuf {
    log_dir.join(format!("run_{}.log", now.format("%Y-%m-%d_%H-%M-%S")))
}

/// 初始化全局 subscriber，返回日志文件路径；重复初始化返回错误
pub fn init(cfg: &LoggingSection) -> io::Result<PathBuf> {
    std::fs::create_dir_all(&cfg.log_dir)?;
    let path = log_file_path(&cfg.log_dir, chrono::Local::now());
    let file = Arc::new(File::create(&path)?);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).compact())
        .with(fmt::layer().with_writer(file).with_ansi(false))
        .try_init()
        .map_err(io::Error::other)?;

    tracing::info!(log_file = %path.display(), "logging initialized");
    Ok(path)
}
