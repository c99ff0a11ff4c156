//! Repository layer for member table operations

use async_trait::async_trait;
use sqlx::Any;
use sqlx::any::AnyArguments;
use sqlx::query::Query;
use tracing::{error, info};

use super::models::Member;
use crate::db::{DataAccessError, Database, DbContext};

const SQL_INSERT: &str = "insert into member(member_id, money) values ($1, $2)";
const SQL_FIND_BY_ID: &str = "select * from member where member_id = $1";
const SQL_UPDATE_MONEY: &str = "update member set money=$1 where member_id=$2";
const SQL_DELETE: &str = "delete from member where member_id=$1";

/// CRUD over the member table.
///
/// Every operation takes the [`DbContext`] it runs in, so the same calls work
/// standalone or inside a transaction. Errors are always one of the
/// [`DataAccessError`] kinds.
#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn save(
        &self,
        ctx: &mut DbContext<'_>,
        member: &Member,
    ) -> Result<Member, DataAccessError>;

    async fn find_by_id(
        &self,
        ctx: &mut DbContext<'_>,
        member_id: &str,
    ) -> Result<Member, DataAccessError>;

    /// Set `money`. Zero matched rows is not an error; the count is returned.
    async fn update(
        &self,
        ctx: &mut DbContext<'_>,
        member_id: &str,
        money: i64,
    ) -> Result<u64, DataAccessError>;

    /// Remove the row if present. Returns the affected row count.
    async fn delete(&self, ctx: &mut DbContext<'_>, member_id: &str)
    -> Result<u64, DataAccessError>;
}

/// SQL implementation on top of the pooled [`Database`]
#[derive(Clone)]
pub struct SqlMemberRepository {
    db: Database,
}

impl SqlMemberRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn translate(&self, task: &'static str, err: sqlx::Error) -> DataAccessError {
        let err = self.db.translator().translate(task, err);
        error!(task = task, code = err.code(), error = %err, "db error");
        err
    }

    /// Acquire, execute, release, translate. Returns rows affected.
    async fn execute_update<'q>(
        &self,
        ctx: &mut DbContext<'_>,
        task: &'static str,
        query: Query<'q, Any, AnyArguments<'q>>,
    ) -> Result<u64, DataAccessError> {
        let mut lease = ctx.acquire(&self.db).await?;
        let result = query.execute(lease.connection()).await;
        lease.release();
        result
            .map(|done| done.rows_affected())
            .map_err(|e| self.translate(task, e))
    }

    /// Acquire, fetch at most one row, release, translate, map.
    async fn query_optional<'q>(
        &self,
        ctx: &mut DbContext<'_>,
        task: &'static str,
        query: Query<'q, Any, AnyArguments<'q>>,
    ) -> Result<Option<Member>, DataAccessError> {
        let mut lease = ctx.acquire(&self.db).await?;
        let result = query.fetch_optional(lease.connection()).await;
        lease.release();
        let row = result.map_err(|e| self.translate(task, e))?;
        row.as_ref()
            .map(Member::from_row)
            .transpose()
            .map_err(|e| self.translate(task, e))
    }
}

#[async_trait]
impl MemberRepository for SqlMemberRepository {
    async fn save(
        &self,
        ctx: &mut DbContext<'_>,
        member: &Member,
    ) -> Result<Member, DataAccessError> {
        let query = sqlx::query(SQL_INSERT)
            .bind(member.member_id.as_str())
            .bind(member.money);
        self.execute_update(ctx, "save", query).await?;
        Ok(member.clone())
    }

    async fn find_by_id(
        &self,
        ctx: &mut DbContext<'_>,
        member_id: &str,
    ) -> Result<Member, DataAccessError> {
        let query = sqlx::query(SQL_FIND_BY_ID).bind(member_id);
        self.query_optional(ctx, "findById", query)
            .await?
            .ok_or_else(|| DataAccessError::NotFound(member_id.to_string()))
    }

    async fn update(
        &self,
        ctx: &mut DbContext<'_>,
        member_id: &str,
        money: i64,
    ) -> Result<u64, DataAccessError> {
        let query = sqlx::query(SQL_UPDATE_MONEY).bind(money).bind(member_id);
        let rows = self.execute_update(ctx, "update", query).await?;
        info!(member_id = member_id, rows = rows, "resultSize={}", rows);
        Ok(rows)
    }

    async fn delete(
        &self,
        ctx: &mut DbContext<'_>,
        member_id: &str,
    ) -> Result<u64, DataAccessError> {
        let query = sqlx::query(SQL_DELETE).bind(member_id);
        let rows = self.execute_update(ctx, "delete", query).await?;
        info!(member_id = member_id, rows = rows, "member deleted");
        Ok(rows)
    }
}
