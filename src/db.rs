use chrono::Utc;
use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbProcedure, DbProcedureUser, DbUser, Procedure, ProcedureUser, User};
use crate::query::{ListParams, OrderKey, Page};

pub const PROCEDURE_COLUMNS: &[&str] =
    &["ProcedureId", "ProcedureTitle", "CreateDate", "UpdateDate"];
pub const PROCEDURE_USER_COLUMNS: &[&str] =
    &["ProcedureId", "UserId", "CreateDate", "UpdateDate"];
pub const USER_COLUMNS: &[&str] = &["UserId", "Name", "CreateDate", "UpdateDate"];
pub const PROCEDURE_USER_RELATIONS: &[&str] = &["User"];

#[instrument(skip(conn))]
pub async fn get_procedure(
    conn: &mut SqliteConnection,
    procedure_id: i64,
) -> Result<Procedure, AppError> {
    info!("Fetching procedure by ID");
    let row = sqlx::query_as::<_, DbProcedure>(
        "SELECT ProcedureId, ProcedureTitle, CreateDate, UpdateDate
         FROM Procedures WHERE ProcedureId = ?",
    )
    .bind(procedure_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(procedure) => Ok(Procedure::from(procedure)),
        _ => Err(AppError::NotFound(format!(
            "ProcedureId: {} not found",
            procedure_id
        ))),
    }
}

#[instrument(skip(conn))]
pub async fn get_user(conn: &mut SqliteConnection, user_id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT UserId, Name, CreateDate, UpdateDate FROM Users WHERE UserId = ?",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!("UserId: {} not found", user_id))),
    }
}

/// Returns the subset of `user_ids` that name existing users.
#[instrument(skip(conn))]
pub async fn existing_user_ids(
    conn: &mut SqliteConnection,
    user_ids: &[i64],
) -> Result<Vec<i64>, AppError> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new("SELECT UserId FROM Users WHERE UserId IN (");
    let mut separated = qb.separated(", ");
    for id in user_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY UserId");

    let ids = qb
        .build_query_scalar::<i64>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(ids)
}

#[instrument(skip(conn))]
pub async fn get_procedure_user_ids(
    conn: &mut SqliteConnection,
    procedure_id: i64,
) -> Result<Vec<i64>, AppError> {
    info!("Getting procedure members");
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT UserId FROM ProcedureUsers WHERE ProcedureId = ? ORDER BY UserId",
    )
    .bind(procedure_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}

/// Returns `false` when the association already existed.
#[instrument(skip(conn))]
pub async fn insert_procedure_user(
    conn: &mut SqliteConnection,
    procedure_id: i64,
    user_id: i64,
) -> Result<bool, AppError> {
    let now = Utc::now().naive_utc();
    let res = sqlx::query(
        "INSERT OR IGNORE INTO ProcedureUsers (ProcedureId, UserId, CreateDate, UpdateDate)
         VALUES (?, ?, ?, ?)",
    )
    .bind(procedure_id)
    .bind(user_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(res.rows_affected() > 0)
}

/// Returns `false` when there was no such association.
#[instrument(skip(conn))]
pub async fn delete_procedure_user(
    conn: &mut SqliteConnection,
    procedure_id: i64,
    user_id: i64,
) -> Result<bool, AppError> {
    let res = sqlx::query("DELETE FROM ProcedureUsers WHERE ProcedureId = ? AND UserId = ?")
        .bind(procedure_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    Ok(res.rows_affected() > 0)
}

#[instrument(skip(conn))]
pub async fn delete_procedure_users(
    conn: &mut SqliteConnection,
    procedure_id: i64,
) -> Result<u64, AppError> {
    let res = sqlx::query("DELETE FROM ProcedureUsers WHERE ProcedureId = ?")
        .bind(procedure_id)
        .execute(&mut *conn)
        .await?;

    Ok(res.rows_affected())
}

fn push_order(qb: &mut QueryBuilder<'_, Sqlite>, prefix: &str, keys: &[OrderKey], default: &str) {
    qb.push(" ORDER BY ");
    if keys.is_empty() {
        qb.push(prefix).push(default);
        return;
    }

    let mut separated = qb.separated(", ");
    for key in keys {
        separated.push(format!("{}{} {}", prefix, key.column, key.dir.as_sql()));
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Sqlite>, page: Page) {
    // SQLite only accepts OFFSET after a LIMIT; -1 means no limit.
    qb.push(" LIMIT ").push_bind(page.limit.unwrap_or(-1));
    qb.push(" OFFSET ").push_bind(page.offset);
}

#[instrument(skip(pool))]
pub async fn list_procedures(
    pool: &Pool<Sqlite>,
    params: &ListParams,
) -> Result<Vec<Procedure>, AppError> {
    info!("Listing procedures");
    if params.user_id.is_some() {
        return Err(AppError::Validation(
            "userId is not a procedure field".to_string(),
        ));
    }
    params.expansions(&[])?;
    let order = params.order(PROCEDURE_COLUMNS)?;
    let page = params.page()?;

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT p.ProcedureId, p.ProcedureTitle, p.CreateDate, p.UpdateDate
         FROM Procedures p WHERE 1 = 1",
    );
    if let Some(procedure_id) = params.procedure_id {
        qb.push(" AND p.ProcedureId = ").push_bind(procedure_id);
    }
    push_order(&mut qb, "p.", &order, "ProcedureId");
    push_page(&mut qb, page);

    let rows = qb.build_query_as::<DbProcedure>().fetch_all(pool).await?;

    Ok(rows.into_iter().map(Procedure::from).collect())
}

#[instrument(skip(pool))]
pub async fn list_procedure_users(
    pool: &Pool<Sqlite>,
    params: &ListParams,
) -> Result<Vec<ProcedureUser>, AppError> {
    info!("Listing procedure users");
    let expand = params.expansions(PROCEDURE_USER_RELATIONS)?;
    let order = params.order(PROCEDURE_USER_COLUMNS)?;
    let page = params.page()?;

    let mut qb = if expand.contains(&"User") {
        QueryBuilder::<Sqlite>::new(
            "SELECT pu.ProcedureId, pu.UserId, pu.CreateDate, pu.UpdateDate, u.Name AS UserName
             FROM ProcedureUsers pu JOIN Users u ON u.UserId = pu.UserId WHERE 1 = 1",
        )
    } else {
        QueryBuilder::<Sqlite>::new(
            "SELECT pu.ProcedureId, pu.UserId, pu.CreateDate, pu.UpdateDate
             FROM ProcedureUsers pu WHERE 1 = 1",
        )
    };
    if let Some(procedure_id) = params.procedure_id {
        qb.push(" AND pu.ProcedureId = ").push_bind(procedure_id);
    }
    if let Some(user_id) = params.user_id {
        qb.push(" AND pu.UserId = ").push_bind(user_id);
    }
    push_order(&mut qb, "pu.", &order, "ProcedureId, pu.UserId");
    push_page(&mut qb, page);

    let rows = qb.build_query_as::<DbProcedureUser>().fetch_all(pool).await?;

    Ok(rows.into_iter().map(ProcedureUser::from).collect())
}

#[instrument(skip(pool))]
pub async fn list_users(pool: &Pool<Sqlite>, params: &ListParams) -> Result<Vec<User>, AppError> {
    info!("Listing users");
    if params.procedure_id.is_some() {
        return Err(AppError::Validation(
            "procedureId is not a user field".to_string(),
        ));
    }
    params.expansions(&[])?;
    let order = params.order(USER_COLUMNS)?;
    let page = params.page()?;

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT u.UserId, u.Name, u.CreateDate, u.UpdateDate FROM Users u WHERE 1 = 1",
    );
    if let Some(user_id) = params.user_id {
        qb.push(" AND u.UserId = ").push_bind(user_id);
    }
    push_order(&mut qb, "u.", &order, "UserId");
    push_page(&mut qb, page);

    let rows = qb.build_query_as::<DbUser>().fetch_all(pool).await?;

    Ok(rows.into_iter().map(User::from).collect())
}
