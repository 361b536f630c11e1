use rocket::State;
use rocket::http::Status;
use rocket::serde::json::{self, Json};
use rocket::serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::commands::{
    AddUserToProcedure, RemoveUserFromProcedure, SetProcedureUsers, add_user_to_procedure,
    remove_user_from_procedure, set_procedure_users,
};
use crate::db::{list_procedure_users, list_procedures, list_users};
use crate::error::AppError;
use crate::models::{Procedure, ProcedureUser, User};
use crate::query::ListParams;

/// `userId` in an add request: one id, or the complete desired membership.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum UserSelection {
    One(i64),
    Many(Vec<i64>),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AddUserToProcedureRequest {
    pub procedure_id: i64,
    pub user_id: UserSelection,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RemoveUserFromProcedureRequest {
    pub procedure_id: i64,
    pub user_id: i64,
}

/// Unwraps a JSON body, turning a missing field or wrong type into a 400.
fn request_body<T>(body: Result<Json<T>, json::Error<'_>>) -> Result<T, AppError> {
    body.map(Json::into_inner)
        .map_err(|e| AppError::Validation(format!("Malformed request body: {}", e)))
}

#[get("/procedures?<params..>")]
pub async fn api_get_procedures(
    params: ListParams,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Procedure>>, AppError> {
    let procedures = list_procedures(db, &params).await?;
    Ok(Json(procedures))
}

#[get("/procedureusers?<params..>")]
pub async fn api_get_procedure_users(
    params: ListParams,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<ProcedureUser>>, AppError> {
    let procedure_users = list_procedure_users(db, &params).await?;
    Ok(Json(procedure_users))
}

#[get("/users?<params..>")]
pub async fn api_get_users(
    params: ListParams,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<User>>, AppError> {
    let users = list_users(db, &params).await?;
    Ok(Json(users))
}

#[post("/procedures/AddUserToProcedure", data = "<request>")]
pub async fn api_add_user_to_procedure(
    request: Result<Json<AddUserToProcedureRequest>, json::Error<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, AppError> {
    let request = request_body(request)?;

    match request.user_id {
        UserSelection::One(user_id) => {
            add_user_to_procedure(
                db,
                AddUserToProcedure {
                    procedure_id: request.procedure_id,
                    user_id,
                },
            )
            .await?;
        }
        UserSelection::Many(user_ids) => {
            let diff = set_procedure_users(
                db,
                SetProcedureUsers {
                    procedure_id: request.procedure_id,
                    user_ids,
                },
            )
            .await?;

            if diff.is_empty() {
                info!(
                    procedure_id = request.procedure_id,
                    "Procedure membership already up to date"
                );
            }
        }
    }

    Ok(Status::Ok)
}

#[post("/procedures/RemoveUserFromProcedure", data = "<request>")]
pub async fn api_remove_user_from_procedure(
    request: Result<Json<RemoveUserFromProcedureRequest>, json::Error<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, AppError> {
    let request = request_body(request)?;

    remove_user_from_procedure(
        db,
        RemoveUserFromProcedure {
            procedure_id: request.procedure_id,
            user_id: request.user_id,
        },
    )
    .await?;

    Ok(Status::Ok)
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
