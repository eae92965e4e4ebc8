//! Sea-ORM 凭证仓库实现

use async_trait::async_trait;
use chrono::Utc;
use entity::users;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set, SqlErr,
};

use super::{
    Counter, Credential, CredentialRepository, CredentialUpdate, NewCredential, QuotaDeduction,
    QuotaSnapshot,
};
use crate::error::{GateError, Result};

/// 基于 Sea-ORM 的凭证仓库
#[derive(Clone)]
pub struct SeaOrmCredentialRepository {
    db: DatabaseConnection,
}

impl SeaOrmCredentialRepository {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_one(&self, filter: sea_orm::Condition) -> Result<Option<Credential>> {
        users::Entity::find()
            .filter(filter)
            .one(&self.db)
            .await?
            .map(Credential::try_from)
            .transpose()
    }
}

fn map_insert_error(err: DbErr) -> GateError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) if message.contains("phone") => {
            GateError::invalid_param("手机号已被使用")
        }
        Some(SqlErr::UniqueConstraintViolation(_)) => GateError::EmailExists,
        _ => GateError::database_with_source("创建用户失败", err),
    }
}

const fn counter_column(counter: Counter) -> users::Column {
    match counter {
        Counter::TokenUsed => users::Column::TokenUsed,
        Counter::TokenQuota => users::Column::TokenQuota,
    }
}

#[async_trait]
impl CredentialRepository for SeaOrmCredentialRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Credential>> {
        users::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .map(Credential::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>> {
        self.find_one(sea_orm::Condition::all().add(users::Column::Email.eq(email)))
            .await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Credential>> {
        self.find_one(sea_orm::Condition::all().add(users::Column::Phone.eq(phone)))
            .await
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        let count = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn create(&self, new: NewCredential) -> Result<Credential> {
        let now = Utc::now();
        let model = users::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            email: Set(new.email),
            phone: Set(new.phone),
            password_hash: Set(new.password_hash),
            name: Set(new.name),
            role: Set(new.role.as_str().to_string()),
            status: Set(new.status.as_str().to_string()),
            token_quota: Set(new.token_quota),
            token_used: Set(0),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&self.db).await.map_err(map_insert_error)?;
        Credential::try_from(created)
    }

    async fn update_fields(&self, id: &str, update: CredentialUpdate) -> Result<()> {
        let mut query = users::Entity::update_many()
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id));

        if let Some(hash) = update.password_hash {
            query = query.col_expr(users::Column::PasswordHash, Expr::value(hash));
        }
        if let Some(name) = update.name {
            query = query.col_expr(users::Column::Name, Expr::value(name));
        }
        if let Some(role) = update.role {
            query = query.col_expr(users::Column::Role, Expr::value(role.as_str()));
        }
        if let Some(status) = update.status {
            query = query.col_expr(users::Column::Status, Expr::value(status.as_str()));
        }
        if let Some(quota) = update.token_quota {
            query = query.col_expr(users::Column::TokenQuota, Expr::value(quota));
        }
        if let Some(at) = update.last_login_at {
            query = query.col_expr(users::Column::LastLoginAt, Expr::value(at));
        }

        let result = query.exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(GateError::UserNotFound);
        }
        Ok(())
    }

    async fn increment_field(&self, id: &str, counter: Counter, amount: i64) -> Result<()> {
        let column = counter_column(counter);
        let result = users::Entity::update_many()
            .col_expr(column, Expr::col(column).add(amount))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(GateError::UserNotFound);
        }
        Ok(())
    }

    async fn get_quota(&self, id: &str) -> Result<QuotaSnapshot> {
        let user = users::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .ok_or(GateError::UserNotFound)?;
        Ok(QuotaSnapshot {
            quota: user.token_quota,
            used: user.token_used,
        })
    }

    async fn consume_quota(&self, id: &str, amount: i64) -> Result<QuotaDeduction> {
        // 条件更新保证额度耗尽后不会再被扣减
        let result = users::Entity::update_many()
            .col_expr(
                users::Column::TokenUsed,
                Expr::col(users::Column::TokenUsed).add(amount),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id))
            .filter(Expr::col(users::Column::TokenUsed).lt(Expr::col(users::Column::TokenQuota)))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            // 区分用户不存在与额度耗尽
            self.get_quota(id).await?;
            return Ok(QuotaDeduction::Exhausted);
        }

        Ok(QuotaDeduction::Applied(self.get_quota(id).await?))
    }
}
