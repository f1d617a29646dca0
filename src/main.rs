use std::path::Path;

use anyhow::Result;
use tracing::{error, info, warn};

use pycode_worker::utils::{instance_lock, logging};
use pycode_worker::{Config, TaskLoop};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let secret = match args.as_slice() {
        [secret] => secret.clone(),
        _ => {
            eprintln!("bad params: usage: worker <secret>");
            std::process::exit(2);
        }
    };

    // 加载配置
    let config = match std::env::var("WORKER_CONFIG") {
        Ok(path) => Config::load(Path::new(&path))?,
        Err(_) => Config::from_env()?,
    };

    // 初始化日志
    logging::init(&config.log_filter);
    if let Some(log_file) = &config.log_file {
        logging::init_log_file(log_file)?;
    }
    logging::log_startup(&config.controller_url);

    let lock = if config.use_instance_lock {
        match instance_lock::lock(&config.lock_name) {
            Ok(Some(lock)) => Some(lock),
            Ok(None) => {
                error!("❌ 已有实例在运行: {}", config.lock_name);
                return Ok(());
            }
            Err(e) => {
                warn!("⚠️ 获取单实例锁失败，继续运行: {}", e);
                None
            }
        }
    } else {
        None
    };

    let stats = TaskLoop::new(&config).run(&secret).await;
    logging::print_final_stats(stats.processed, stats.errors);

    if let Some(lock) = lock {
        instance_lock::unlock(lock);
    }
    info!("👋 退出");

    Ok(())
}
