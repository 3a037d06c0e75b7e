//! User repository
//!
//! Plain statements only. Username uniqueness is enforced by the
//! `users.user_name` unique index; callers map the violation.

use crate::db::{DbContext, Value};
use crate::error::DbResult;
use crate::models::user::{User, USERS_TABLE, WRITABLE_COLUMNS};

/// User repository
pub struct UserRepo<'a> {
    ctx: &'a DbContext,
}

fn writable_values(user: &User) -> [Value; 6] {
    [
        Value::from(&user.user_name),
        Value::from(&user.first_name),
        Value::from(&user.last_name),
        Value::from(&user.email),
        Value::from(&user.user_status),
        Value::from(&user.department),
    ]
}

impl<'a> UserRepo<'a> {
    pub fn new(ctx: &'a DbContext) -> Self {
        Self { ctx }
    }

    /// Every user, in backend order
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let stmt = self.ctx.sql().select(["*"]).from(USERS_TABLE).build()?;
        let rows = self.ctx.db().fetch_all(&stmt).await?;
        rows.iter().map(User::from_row).collect()
    }

    pub async fn find_by_username(&self, user_name: &str) -> DbResult<Option<User>> {
        let stmt = self
            .ctx
            .sql()
            .select(["*"])
            .from(USERS_TABLE)
            .where_eq("user_name", user_name)
            .build()?;
        match self.ctx.db().fetch_optional(&stmt).await? {
            Some(row) => User::from_row(&row).map(Some),
            None => Ok(None),
        }
    }

    /// Insert `user`, returning the id assigned by the database.
    ///
    /// `user.user_id` is ignored.
    pub async fn insert(&self, user: &User) -> DbResult<i64> {
        let stmt = self
            .ctx
            .sql()
            .insert(USERS_TABLE)
            .columns(WRITABLE_COLUMNS)
            .values(writable_values(user))
            .suffix("RETURNING user_id")
            .build()?;
        let row = self.ctx.db().fetch_one(&stmt).await?;
        row.get_i64(0)
    }

    /// Overwrite every writable column of `user_id`; returns rows affected
    pub async fn update(&self, user_id: i64, user: &User) -> DbResult<u64> {
        let builder = WRITABLE_COLUMNS
            .into_iter()
            .zip(writable_values(user))
            .fold(self.ctx.sql().update(USERS_TABLE), |b, (column, value)| {
                b.set(column, value)
            });
        let stmt = builder.where_eq("user_id", user_id).build()?;
        self.ctx.db().execute(&stmt).await
    }

    /// Remove `user_id`; returns rows affected (0 when absent)
    pub async fn delete(&self, user_id: i64) -> DbResult<u64> {
        let stmt = self
            .ctx
            .sql()
            .delete(USERS_TABLE)
            .where_eq("user_id", user_id)
            .build()?;
        self.ctx.db().execute(&stmt).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::mock::{ArgMatcher, Expectation};
    use crate::db::{MockDatabase, Row};
    use crate::error::DbError;

    fn alice() -> User {
        User {
            user_id: 0,
            user_name: "alice".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            email: "a@b.com".into(),
            user_status: "A".into(),
            department: "Eng".into(),
        }
    }

    fn alice_row(id: i64) -> Row {
        [
            Value::Int(id),
            "alice".into(),
            "A".into(),
            "B".into(),
            "a@b.com".into(),
            "A".into(),
            "Eng".into(),
        ]
        .into_iter()
        .collect()
    }

    fn context(mock: &MockDatabase) -> DbContext {
        DbContext::new(Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn list_decodes_rows() {
        let mock = MockDatabase::new();
        mock.expect(
            Expectation::query_exact("SELECT * FROM users")
                .returning_rows(vec![alice_row(1), alice_row(2)]),
        );
        let ctx = context(&mock);

        let users = UserRepo::new(&ctx).list().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].user_id, 2);
        mock.expectations_were_met().unwrap();
    }

    #[tokio::test]
    async fn list_empty_table() {
        let mock = MockDatabase::new();
        mock.expect(Expectation::query("^SELECT \\* FROM users$").returning_rows(vec![]));
        let ctx = context(&mock);

        assert!(UserRepo::new(&ctx).list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_by_username_binds_name() {
        let mock = MockDatabase::new();
        mock.expect(
            Expectation::query_exact("SELECT * FROM users WHERE user_name = $1")
                .with_values(["alice"])
                .returning_rows(vec![alice_row(4)]),
        );
        mock.expect(
            Expectation::query_exact("SELECT * FROM users WHERE user_name = $1")
                .with_values(["bob"])
                .returning_rows(vec![]),
        );
        let ctx = context(&mock);
        let repo = UserRepo::new(&ctx);

        assert_eq!(repo.find_by_username("alice").await.unwrap().unwrap().user_id, 4);
        assert!(repo.find_by_username("bob").await.unwrap().is_none());
        mock.expectations_were_met().unwrap();
    }

    #[tokio::test]
    async fn insert_returns_new_id() {
        let mock = MockDatabase::new();
        mock.expect(
            Expectation::query_exact(
                "INSERT INTO users (user_name, first_name, last_name, email, user_status, department) \
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING user_id",
            )
            .with_values(["alice", "A", "B", "a@b.com", "A", "Eng"])
            .returning_rows(vec![Row::new(vec![Value::Int(42)])]),
        );
        let ctx = context(&mock);

        let user = User {
            user_id: 999,
            ..alice()
        };
        assert_eq!(UserRepo::new(&ctx).insert(&user).await.unwrap(), 42);
        mock.expectations_were_met().unwrap();
    }

    #[tokio::test]
    async fn insert_surfaces_backend_error() {
        let mock = MockDatabase::new();
        mock.expect(
            Expectation::query("^INSERT INTO users").returning_error(DbError::query_with_code(
                "duplicate key value violates unique constraint \"users_user_name_key\"",
                "23505",
            )),
        );
        let ctx = context(&mock);

        let err = UserRepo::new(&ctx).insert(&alice()).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn update_binds_id_last() {
        let mock = MockDatabase::new();
        mock.expect(
            Expectation::exec_exact(
                "UPDATE users SET user_name = $1, first_name = $2, last_name = $3, email = $4, \
                 user_status = $5, department = $6 WHERE user_id = $7",
            )
            .with_args([
                ArgMatcher::exact("alice"),
                ArgMatcher::Any,
                ArgMatcher::Any,
                ArgMatcher::Any,
                ArgMatcher::exact("A"),
                ArgMatcher::Any,
                ArgMatcher::exact(7_i64),
            ])
            .returning_affected(1),
        );
        let ctx = context(&mock);

        assert_eq!(UserRepo::new(&ctx).update(7, &alice()).await.unwrap(), 1);
        mock.expectations_were_met().unwrap();
    }

    #[tokio::test]
    async fn delete_missing_id_affects_nothing() {
        let mock = MockDatabase::new();
        mock.expect(
            Expectation::exec_exact("DELETE FROM users WHERE user_id = $1")
                .with_values([99_i64])
                .returning_affected(0),
        );
        let ctx = context(&mock);

        assert_eq!(UserRepo::new(&ctx).delete(99).await.unwrap(), 0);
    }

    // Run with: DATABASE_URL=postgres://... cargo test -p userbase-server -- --ignored

    #[tokio::test]
    #[ignore = "requires database"]
    async fn update_and_delete_read_back() {
        use crate::db::{Initializer, PostgresConnector};

        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/migrations");
        let ctx = Initializer::new(PostgresConnector::new(dir))
            .run()
            .await
            .expect("init failed");
        let repo = UserRepo::new(&ctx);

        let bob = User {
            user_name: "bob".into(),
            email: "bob@example.com".into(),
            ..alice()
        };
        let alice_id = repo.insert(&alice()).await.expect("insert alice failed");
        let bob_id = repo.insert(&bob).await.expect("insert bob failed");
        assert_ne!(alice_id, bob_id);
        let before = repo.list().await.expect("list failed");
        assert_eq!(before.len(), 2);

        let changed = User {
            department: "Sales".into(),
            user_status: "I".into(),
            ..alice()
        };
        assert_eq!(repo.update(alice_id, &changed).await.expect("update failed"), 1);
        let once = repo.list().await.expect("list failed");
        // Same update again is a no-op on state.
        repo.update(alice_id, &changed).await.expect("second update failed");
        let twice = repo.list().await.expect("list failed");

        let find = |users: &[User], id: i64| users.iter().find(|u| u.user_id == id).cloned();
        let updated = find(&once, alice_id).expect("alice missing");
        assert_eq!(updated.department, "Sales");
        assert_eq!(updated.user_status, "I");
        assert_eq!(find(&once, bob_id), find(&before, bob_id));
        assert_eq!(find(&twice, alice_id), Some(updated));
        assert_eq!(find(&twice, bob_id), find(&before, bob_id));
        assert_eq!(twice.len(), 2);

        repo.delete(alice_id).await.expect("delete failed");
        let after = repo.list().await.expect("list failed");
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].user_id, bob_id);
        assert_eq!(after[0].user_name, "bob");

        ctx.close().await;
    }
}
