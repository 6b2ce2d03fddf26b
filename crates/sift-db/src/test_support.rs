//! Shared test utilities for sift-db unit tests.

pub(crate) mod helpers {
    use serde_json::json;
    use sift_core::entities::AccountDisplay;
    use sift_core::enums::Provider;

    use crate::SiftDb;
    use crate::repos::account::NewAccount;

    /// Create an in-memory database with migrations applied.
    pub async fn test_db() -> SiftDb {
        SiftDb::open_local(":memory:").await.unwrap()
    }

    pub fn new_account(provider: Provider, user_id: &str, external_id: &str) -> NewAccount {
        NewAccount {
            provider,
            user_id: user_id.into(),
            external_id: external_id.into(),
            credentials: json!({"token": "secret"}),
            display: AccountDisplay {
                name: Some(external_id.to_string()),
                ..AccountDisplay::default()
            },
        }
    }
}
