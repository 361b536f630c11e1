//! Write-side operations on procedure membership.
//!
//! Every command validates its input, then runs inside a single transaction:
//! load the procedure, mutate its associations, commit. Dropping the future
//! before the commit rolls the transaction back.

use std::collections::BTreeSet;

use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};
use validator::Validate;

use crate::db::{
    delete_procedure_user, delete_procedure_users, existing_user_ids, get_procedure,
    get_procedure_user_ids, get_user, insert_procedure_user,
};
use crate::error::AppError;

/// `userId` sentinel for [`RemoveUserFromProcedure`] that clears every member.
pub const REMOVE_ALL_USERS: i64 = -1;

/// Adds one user to a procedure. Re-adding an existing member is a no-op.
#[derive(Debug, Clone, Validate)]
pub struct AddUserToProcedure {
    #[validate(range(min = 1, message = "Invalid ProcedureId"))]
    pub procedure_id: i64,
    pub user_id: i64,
}

/// Replaces the membership of a procedure with `user_ids`. Ids that do not
/// name an existing user are skipped.
#[derive(Debug, Clone, Validate)]
pub struct SetProcedureUsers {
    #[validate(range(min = 1, message = "Invalid ProcedureId"))]
    pub procedure_id: i64,
    pub user_ids: Vec<i64>,
}

/// Removes one member, or all of them when `user_id` is [`REMOVE_ALL_USERS`].
/// Removing a non-member succeeds.
#[derive(Debug, Clone, Validate)]
pub struct RemoveUserFromProcedure {
    #[validate(range(min = 1, message = "Invalid ProcedureId"))]
    pub procedure_id: i64,
    pub user_id: i64,
}

/// Additions and removals that turn the current membership into the target.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MembershipDiff {
    pub added: Vec<i64>,
    pub removed: Vec<i64>,
}

impl MembershipDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Both outputs are sorted and free of duplicates.
pub fn reconcile(current: &[i64], target: &[i64]) -> MembershipDiff {
    let current: BTreeSet<i64> = current.iter().copied().collect();
    let target: BTreeSet<i64> = target.iter().copied().collect();

    MembershipDiff {
        added: target.difference(&current).copied().collect(),
        removed: current.difference(&target).copied().collect(),
    }
}

#[instrument(skip(pool))]
pub async fn add_user_to_procedure(
    pool: &Pool<Sqlite>,
    command: AddUserToProcedure,
) -> Result<(), AppError> {
    command.validate()?;

    let mut tx = pool.begin().await?;

    let procedure = get_procedure(&mut tx, command.procedure_id).await?;
    let user = get_user(&mut tx, command.user_id).await?;

    if insert_procedure_user(&mut tx, procedure.procedure_id, user.user_id).await? {
        info!(
            procedure_id = procedure.procedure_id,
            user_id = user.user_id,
            "Added user to procedure"
        );
    }

    tx.commit().await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn set_procedure_users(
    pool: &Pool<Sqlite>,
    command: SetProcedureUsers,
) -> Result<MembershipDiff, AppError> {
    command.validate()?;

    let mut tx = pool.begin().await?;

    let procedure = get_procedure(&mut tx, command.procedure_id).await?;
    let current = get_procedure_user_ids(&mut tx, procedure.procedure_id).await?;
    let target = existing_user_ids(&mut tx, &command.user_ids).await?;

    let diff = reconcile(&current, &target);

    for user_id in &diff.added {
        insert_procedure_user(&mut tx, procedure.procedure_id, *user_id).await?;
        info!(
            procedure_id = procedure.procedure_id,
            user_id = *user_id,
            "Added user to procedure"
        );
    }

    for user_id in &diff.removed {
        delete_procedure_user(&mut tx, procedure.procedure_id, *user_id).await?;
        info!(
            procedure_id = procedure.procedure_id,
            user_id = *user_id,
            "Removed user from procedure"
        );
    }

    tx.commit().await?;

    Ok(diff)
}

#[instrument(skip(pool))]
pub async fn remove_user_from_procedure(
    pool: &Pool<Sqlite>,
    command: RemoveUserFromProcedure,
) -> Result<(), AppError> {
    command.validate()?;

    let mut tx = pool.begin().await?;

    let procedure = get_procedure(&mut tx, command.procedure_id).await?;

    if command.user_id == REMOVE_ALL_USERS {
        let removed = delete_procedure_users(&mut tx, procedure.procedure_id).await?;
        info!(
            procedure_id = procedure.procedure_id,
            removed, "Cleared all users from procedure"
        );
    } else if delete_procedure_user(&mut tx, procedure.procedure_id, command.user_id).await? {
        info!(
            procedure_id = procedure.procedure_id,
            user_id = command.user_id,
            "Removed user from procedure"
        );
    }

    tx.commit().await?;

    Ok(())
}
