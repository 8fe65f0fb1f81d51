use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::prelude::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;
use vidtube_db::entities::users;
use vidtube_session::{Identity, IdentityStore, SessionRecord, StoreError};

type IdentityRow = (Uuid, String, String, String);
type SessionRow = (Uuid, String, String, String, Option<String>);

/// [`IdentityStore`] over the `users` table. The refresh token lives in
/// `users.refresh_token`; the swap is a conditional `UPDATE`.
///
/// Reads select only the identity columns, never the password hash.
pub struct DbIdentityStore {
    db: Arc<DatabaseConnection>,
}

impl DbIdentityStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn identity_from((id, username, email, full_name): IdentityRow) -> Identity {
    Identity {
        id,
        username,
        email,
        full_name,
    }
}

#[async_trait]
impl IdentityStore for DbIdentityStore {
    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let row: Option<IdentityRow> = users::Entity::find_by_id(id)
            .select_only()
            .columns([
                users::Column::Id,
                users::Column::Username,
                users::Column::Email,
                users::Column::FullName,
            ])
            .into_tuple()
            .one(&*self.db)
            .await
            .map_err(StoreError::new)?;
        Ok(row.map(identity_from))
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        let row: Option<SessionRow> = users::Entity::find_by_id(id)
            .select_only()
            .columns([
                users::Column::Id,
                users::Column::Username,
                users::Column::Email,
                users::Column::FullName,
                users::Column::RefreshToken,
            ])
            .into_tuple()
            .one(&*self.db)
            .await
            .map_err(StoreError::new)?;
        Ok(row.map(|(id, username, email, full_name, refresh_token)| SessionRecord {
            identity: identity_from((id, username, email, full_name)),
            refresh_token,
        }))
    }

    async fn store_refresh_token(&self, id: Uuid, token: &str) -> Result<bool, StoreError> {
        let res = users::Entity::update_many()
            .col_expr(users::Column::RefreshToken, Expr::value(token))
            .filter(users::Column::Id.eq(id))
            .exec(&*self.db)
            .await
            .map_err(StoreError::new)?;
        Ok(res.rows_affected == 1)
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> Result<bool, StoreError> {
        let res = users::Entity::update_many()
            .col_expr(users::Column::RefreshToken, Expr::value(next))
            .filter(users::Column::Id.eq(id))
            .filter(users::Column::RefreshToken.eq(expected))
            .exec(&*self.db)
            .await
            .map_err(StoreError::new)?;
        Ok(res.rows_affected == 1)
    }

    async fn clear_refresh_token(&self, id: Uuid) -> Result<(), StoreError> {
        users::Entity::update_many()
            .col_expr(users::Column::RefreshToken, Expr::value(Option::<String>::None))
            .filter(users::Column::Id.eq(id))
            .exec(&*self.db)
            .await
            .map_err(StoreError::new)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult, Statement, Value};

    use super::*;

    #[test]
    fn row_maps_onto_identity() {
        let id = Uuid::new_v4();
        let identity = identity_from((
            id,
            "ada".into(),
            "ada@example.com".into(),
            "Ada Lovelace".into(),
        ));
        assert_eq!(identity.id, id);
        assert_eq!(identity.username, "ada");
        assert_eq!(identity.full_name, "Ada Lovelace");
    }

    fn store_over(db: MockDatabase) -> (DbIdentityStore, Arc<DatabaseConnection>) {
        let db = Arc::new(db.into_connection());
        (DbIdentityStore::new(db.clone()), db)
    }

    fn postgres() -> MockDatabase {
        MockDatabase::new(DatabaseBackend::Postgres)
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn statements(store: DbIdentityStore, db: Arc<DatabaseConnection>) -> Vec<Statement> {
        drop(store);
        Arc::into_inner(db)
            .expect("store released the connection")
            .into_transaction_log()
            .iter()
            .flat_map(|t| t.statements().to_vec())
            .collect()
    }

    #[tokio::test]
    async fn swap_is_conditional_on_the_expected_token() {
        let id = Uuid::new_v4();
        let (store, db) = store_over(postgres().append_exec_results([exec(1), exec(0)]));

        assert!(store.swap_refresh_token(id, "current", "next").await.unwrap());
        assert!(!store.swap_refresh_token(id, "current", "later").await.unwrap());

        let log = statements(store, db);
        assert_eq!(log.len(), 2);
        let swap = &log[0];
        assert!(swap.sql.starts_with(r#"UPDATE "users" SET "refresh_token" = $1"#), "{}", swap.sql);
        assert!(
            swap.sql
                .ends_with(r#"WHERE "users"."id" = $2 AND "users"."refresh_token" = $3"#),
            "{}",
            swap.sql
        );
        let values = swap.values.as_ref().map(|v| v.0.clone()).unwrap_or_default();
        assert_eq!(
            values,
            vec![Value::from("next"), Value::from(id), Value::from("current")]
        );
    }

    #[tokio::test]
    async fn store_reports_whether_the_row_exists() {
        let (store, _db) = store_over(postgres().append_exec_results([exec(1), exec(0)]));
        assert!(store.store_refresh_token(Uuid::new_v4(), "t").await.unwrap());
        assert!(!store.store_refresh_token(Uuid::new_v4(), "t").await.unwrap());
    }

    #[tokio::test]
    async fn session_lookup_never_selects_the_password_hash() {
        let id = Uuid::new_v4();
        // Tuple rows decode by position, so keys sort in select order.
        let row = BTreeMap::from([
            ("c0", Value::from(id)),
            ("c1", Value::from("ada")),
            ("c2", Value::from("ada@example.com")),
            ("c3", Value::from("Ada Lovelace")),
            ("c4", Value::from("refresh-1")),
        ]);
        let (store, db) = store_over(postgres().append_query_results([vec![row]]));

        let record = store.find_session(id).await.unwrap().expect("row");
        assert_eq!(record.identity.id, id);
        assert_eq!(record.identity.email, "ada@example.com");
        assert_eq!(record.refresh_token.as_deref(), Some("refresh-1"));

        let log = statements(store, db);
        assert!(log[0].sql.contains(r#""refresh_token""#));
        assert!(!log[0].sql.contains("password_hash"), "{}", log[0].sql);
    }

    #[tokio::test]
    async fn database_errors_surface_as_store_errors() {
        let (store, _db) = store_over(
            postgres()
                .append_query_errors([DbErr::Custom("connection reset".into())])
                .append_exec_errors([DbErr::Custom("connection reset".into())]),
        );
        let err = store.find_identity(Uuid::new_v4()).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"), "{err}");
        assert!(store.clear_refresh_token(Uuid::new_v4()).await.is_err());
    }
}
