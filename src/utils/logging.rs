/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use std::fs;

use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 输出
///
/// `RUST_LOG` 优先，否则使用配置中的过滤规则
pub fn init(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> anyhow::Result<()> {
    let log_header = format!(
        "{}\n任务执行日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `controller_url`: 控制器地址
pub fn log_startup(controller_url: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 任务执行模式");
    info!("📡 控制器: {}", controller_url);
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `processed`: 已处理任务数
/// - `errors`: 失败任务数
pub fn print_final_stats(processed: usize, errors: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 已处理: {}", processed);
    info!("❌ 失败: {}", errors);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("一二三四五", 3), "一二三...");
    }

    #[test]
    fn test_init_log_file_writes_header() {
        let path = std::env::temp_dir().join(format!("pycode_worker_log_{}.txt", std::process::id()));
        let path_str = path.to_string_lossy().to_string();

        init_log_file(&path_str).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("任务执行日志"));

        let _ = fs::remove_file(&path);
    }
}
