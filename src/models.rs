use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

fn to_utc(dt: NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: i64,
    pub name: String,
    pub create_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbUser {
    #[sqlx(rename = "UserId")]
    pub user_id: Option<i64>,
    #[sqlx(rename = "Name")]
    pub name: Option<String>,
    // Timestamp columns are NOT NULL.
    #[sqlx(rename = "CreateDate")]
    pub create_date: NaiveDateTime,
    #[sqlx(rename = "UpdateDate")]
    pub update_date: NaiveDateTime,
}

impl From<DbUser> for User {
    fn from(db: DbUser) -> Self {
        Self {
            user_id: db.user_id.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
            create_date: to_utc(db.create_date),
            update_date: to_utc(db.update_date),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    pub procedure_id: i64,
    pub procedure_title: String,
    pub create_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbProcedure {
    #[sqlx(rename = "ProcedureId")]
    pub procedure_id: Option<i64>,
    #[sqlx(rename = "ProcedureTitle")]
    pub procedure_title: Option<String>,
    #[sqlx(rename = "CreateDate")]
    pub create_date: NaiveDateTime,
    #[sqlx(rename = "UpdateDate")]
    pub update_date: NaiveDateTime,
}

impl From<DbProcedure> for Procedure {
    fn from(db: DbProcedure) -> Self {
        Self {
            procedure_id: db.procedure_id.unwrap_or_default(),
            procedure_title: db.procedure_title.unwrap_or_default(),
            create_date: to_utc(db.create_date),
            update_date: to_utc(db.update_date),
        }
    }
}

/// Minimal user projection embedded in association rows on `$expand=User`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: i64,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureUser {
    pub procedure_id: i64,
    pub user_id: i64,
    pub create_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user: Option<UserSummary>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbProcedureUser {
    #[sqlx(rename = "ProcedureId")]
    pub procedure_id: Option<i64>,
    #[sqlx(rename = "UserId")]
    pub user_id: Option<i64>,
    #[sqlx(rename = "CreateDate")]
    pub create_date: NaiveDateTime,
    #[sqlx(rename = "UpdateDate")]
    pub update_date: NaiveDateTime,
    // Only populated when the query joins Users.
    #[sqlx(rename = "UserName", default)]
    pub user_name: Option<String>,
}

impl From<DbProcedureUser> for ProcedureUser {
    fn from(db: DbProcedureUser) -> Self {
        let user_id = db.user_id.unwrap_or_default();
        Self {
            procedure_id: db.procedure_id.unwrap_or_default(),
            user_id,
            create_date: to_utc(db.create_date),
            update_date: to_utc(db.update_date),
            user: db.user_name.map(|name| UserSummary { user_id, name }),
        }
    }
}
