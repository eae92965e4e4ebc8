//! # 实体定义测试

use crate::users;
use sea_orm::{EntityName, Set};

#[test]
fn test_user_active_model() {
    let user = users::ActiveModel {
        id: Set("4f1c7a8e-0000-4000-8000-000000000001".to_string()),
        email: Set("test@example.com".to_string()),
        phone: Set(None),
        role: Set("user".to_string()),
        status: Set("active".to_string()),
        token_quota: Set(100_000),
        token_used: Set(0),
        ..Default::default()
    };

    assert_eq!(user.email.as_ref(), "test@example.com");
    assert_eq!(user.token_quota.as_ref(), &100_000);
    assert!(user.phone.as_ref().is_none());
}

#[test]
fn test_table_name() {
    assert_eq!(users::Entity.table_name(), "users");
}

#[test]
fn test_password_hash_not_serialized() {
    let now = chrono::Utc::now();
    let model = users::Model {
        id: "u-1".to_string(),
        email: "a@b.com".to_string(),
        phone: None,
        password_hash: "$2b$12$secret".to_string(),
        name: "Alice".to_string(),
        role: "user".to_string(),
        status: "active".to_string(),
        token_quota: 100_000,
        token_used: 0,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    };

    let json = serde_json::to_string(&model).unwrap();
    assert!(!json.contains("secret"));
    assert!(json.contains("a@b.com"));
}
