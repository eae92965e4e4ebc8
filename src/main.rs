//! # LexGate 主程序

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use lex_gate::{
    AppContext, Result, api, config, lerror, linfo,
    logging::{self, LogComponent, LogStage},
};

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "lex-gate", version, about = "LexVeritas authentication and access gateway")]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 配置错误时同样需要日志输出
    let app_config = match config::load_config(cli.config.as_deref()) {
        Ok(app_config) => app_config,
        Err(e) => {
            logging::init_logging(None);
            lerror!(
                "system",
                LogStage::Startup,
                LogComponent::Config,
                "config_invalid",
                &format!("配置加载失败，拒绝启动: {e}")
            );
            std::process::exit(1);
        }
    };
    logging::init_logging(Some(&app_config.log.level));

    if let Err(e) = run(app_config).await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "service_start_failed",
            &format!("服务启动失败: {e:?}")
        );
        std::process::exit(1);
    }

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
}

async fn run(app_config: config::AppConfig) -> Result<()> {
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_starting",
        &format!("服务启动: listen={}", app_config.listen_addr())
    );

    let context = AppContext::build(app_config).await?;
    api::serve(Arc::new(context)).await
}
