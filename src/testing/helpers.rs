//! # 测试辅助函数

use std::sync::{Arc, Once};

use crate::app::AppContext;
use crate::cache::{MemoryStore, SessionStore};
use crate::config::{AppConfig, DatabaseConfig};
use crate::error::Result;
use crate::testing::mocks::RecordingEmailSender;

static INIT: Once = Once::new();

/// 测试用签名密钥
pub const TEST_JWT_SECRET: &str = "lex-gate-test-secret-0123456789abcdef";

/// 初始化测试日志
pub fn init_test_env() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("warn")
            .with_test_writer()
            .try_init();
    });
}

/// 测试配置：低 bcrypt 成本，限流默认关闭
#[must_use]
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.jwt.secret = TEST_JWT_SECRET.to_string();
    config.auth.bcrypt_cost = 4;
    config.rate_limit.enabled = false;
    config
}

/// 测试上下文
pub struct TestContext {
    pub context: Arc<AppContext>,
    pub mailer: Arc<RecordingEmailSender>,
    pub store: Arc<dyn SessionStore>,
}

impl TestContext {
    /// 以内存 sqlite 与内存存储构建上下文
    ///
    /// 内存数据库只能有一个连接，否则每个连接看到的是不同的库
    pub async fn new(config: AppConfig) -> Result<Self> {
        init_test_env();
        let db = crate::database::init_database(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            connect_timeout: 5,
        })
        .await?;

        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new(10_000));
        let mailer = Arc::new(RecordingEmailSender::new());
        let context = AppContext::assemble(config, db, store.clone(), mailer.clone())?;

        Ok(Self {
            context: Arc::new(context),
            mailer,
            store,
        })
    }
}
