use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Once;

use chrono::Utc;
use rocket::local::asynchronous::Client;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::error::AppError;
use crate::init_rocket;

static INIT: Once = Once::new();

#[derive(Default)]
pub struct TestDbBuilder {
    users: Vec<TestUser>,
    procedures: Vec<TestProcedure>,
    memberships: Vec<(String, String)>,
}

pub struct TestUser {
    pub id: Option<i64>,
    pub name: String,
}

pub struct TestProcedure {
    pub id: Option<i64>,
    pub title: String,
}

impl TestDbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, name: &str) -> Self {
        self.users.push(TestUser {
            id: None,
            name: name.to_string(),
        });
        self
    }

    pub fn user_with_id(mut self, id: i64, name: &str) -> Self {
        self.users.push(TestUser {
            id: Some(id),
            name: name.to_string(),
        });
        self
    }

    pub fn procedure(mut self, title: &str) -> Self {
        self.procedures.push(TestProcedure {
            id: None,
            title: title.to_string(),
        });
        self
    }

    pub fn procedure_with_id(mut self, id: i64, title: &str) -> Self {
        self.procedures.push(TestProcedure {
            id: Some(id),
            title: title.to_string(),
        });
        self
    }

    /// Associates a user (by name) with a procedure (by title).
    pub fn member(mut self, procedure_title: &str, user_name: &str) -> Self {
        self.memberships
            .push((procedure_title.to_string(), user_name.to_string()));
        self
    }

    pub async fn build(self) -> Result<TestDb, AppError> {
        INIT.call_once(|| {
            let _ = env_logger::builder()
                .parse_filters("debug")
                .is_test(true)
                .try_init();
        });

        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // A single long-lived connection: every connection to `:memory:` is a
        // separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let now = Utc::now().naive_utc();
        let mut user_id_map: HashMap<String, i64> = HashMap::new();
        let mut procedure_id_map: HashMap<String, i64> = HashMap::new();

        for user in &self.users {
            let res = sqlx::query(
                "INSERT INTO Users (UserId, Name, CreateDate, UpdateDate) VALUES (?, ?, ?, ?)",
            )
            .bind(user.id)
            .bind(&user.name)
            .bind(now)
            .bind(now)
            .execute(&pool)
            .await?;

            user_id_map.insert(user.name.clone(), res.last_insert_rowid());
        }

        for procedure in &self.procedures {
            let res = sqlx::query(
                "INSERT INTO Procedures (ProcedureId, ProcedureTitle, CreateDate, UpdateDate)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(procedure.id)
            .bind(&procedure.title)
            .bind(now)
            .bind(now)
            .execute(&pool)
            .await?;

            procedure_id_map.insert(procedure.title.clone(), res.last_insert_rowid());
        }

        for (procedure_title, user_name) in &self.memberships {
            let procedure_id = procedure_id_map.get(procedure_title).copied().ok_or_else(|| {
                AppError::NotFound(format!("Test procedure {} not declared", procedure_title))
            })?;
            let user_id = user_id_map.get(user_name).copied().ok_or_else(|| {
                AppError::NotFound(format!("Test user {} not declared", user_name))
            })?;

            sqlx::query(
                "INSERT INTO ProcedureUsers (ProcedureId, UserId, CreateDate, UpdateDate)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(procedure_id)
            .bind(user_id)
            .bind(now)
            .bind(now)
            .execute(&pool)
            .await?;
        }

        Ok(TestDb {
            pool,
            user_id_map,
            procedure_id_map,
        })
    }
}

pub struct TestDb {
    pub pool: Pool<Sqlite>,
    pub user_id_map: HashMap<String, i64>,
    pub procedure_id_map: HashMap<String, i64>,
}

impl TestDb {
    pub fn user_id(&self, name: &str) -> Option<i64> {
        self.user_id_map.get(name).copied()
    }

    pub fn procedure_id(&self, title: &str) -> Option<i64> {
        self.procedure_id_map.get(title).copied()
    }

    pub async fn member_ids(&self, procedure_id: i64) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT UserId FROM ProcedureUsers WHERE ProcedureId = ? ORDER BY UserId",
        )
        .bind(procedure_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn association_count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ProcedureUsers")
            .fetch_one(&self.pool)
            .await
    }
}

/// Procedure 35 with users 69 and 70 as members; user 71 exists but is not
/// assigned.
pub async fn create_standard_test_db() -> TestDb {
    TestDbBuilder::new()
        .user_with_id(69, "Alice")
        .user_with_id(70, "Bob")
        .user_with_id(71, "Carol")
        .procedure_with_id(35, "Knee Arthroscopy")
        .procedure_with_id(36, "Hip Replacement")
        .member("Knee Arthroscopy", "Alice")
        .member("Knee Arthroscopy", "Bob")
        .build()
        .await
        .expect("Failed to build test database")
}

pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
    let client = Client::tracked(init_rocket(test_db.pool.clone()))
        .await
        .expect("valid rocket instance");

    (client, test_db)
}
