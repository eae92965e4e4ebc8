//! # 数据库模块
//!
//! 数据库连接和迁移管理

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

use crate::config::DatabaseConfig;
use crate::error::{GateError, Result};
use crate::{lerror, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 初始化数据库连接并执行迁移
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    config.ensure_database_path()?;

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .map_err(|e| GateError::database_with_source("数据库连接失败", e))?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Database,
        "db_connected",
        "数据库连接成功"
    );

    run_migrations(&db).await?;
    Ok(db)
}

/// 运行数据库迁移
pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    let pending = ::migration::Migrator::get_pending_migrations(db).await?;
    if !pending.is_empty() {
        lwarn!(
            "system",
            LogStage::Startup,
            LogComponent::Database,
            "pending_migrations",
            &format!("有 {} 个待应用的迁移", pending.len())
        );
    }

    ::migration::Migrator::up(db, None).await.map_err(|e| {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Database,
            "migration_failed",
            &format!("数据库迁移失败: {e}")
        );
        GateError::database_with_source("数据库迁移失败", e)
    })?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Database,
        "migrated",
        "数据库迁移完成"
    );
    Ok(())
}
