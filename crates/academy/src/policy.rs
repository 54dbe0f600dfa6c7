//! Who may create, edit and delete administrator accounts.
//!
//! Everything here is a pure function of the acting session and the target
//! row; handlers load the rows and apply the verdicts.

use crate::auth::session::SessionData;
use crate::error::AppError;
use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i32,
    pub role: Role,
}

impl Actor {
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

impl From<&SessionData> for Actor {
    fn from(session: &SessionData) -> Self {
        Actor {
            id: session.user_id,
            role: session.role().unwrap_or(Role::Admin),
        }
    }
}

/// Existing account an update applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub id: i32,
    pub role: Role,
}

/// Only a super_admin may create accounts.
pub fn require_create(actor: &Actor) -> Result<(), AppError> {
    if actor.is_super_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "user {} may not create accounts",
            actor.id
        )))
    }
}

/// Role stored for a submitted value.
///
/// Unknown values become `admin`, and so does `super_admin` when the actor
/// is not a super_admin. Neither case is an error.
pub fn assignable_role(actor: &Actor, requested: &str) -> Role {
    match Role::parse(requested) {
        Some(Role::SuperAdmin) if actor.is_super_admin() => Role::SuperAdmin,
        _ => Role::Admin,
    }
}

/// Role a new account is created with.
pub fn role_for_create(actor: &Actor, requested: &str) -> Role {
    assignable_role(actor, requested)
}

/// Role an existing account keeps after an update.
///
/// A super_admin target is pinned. A regular admin editing themself keeps
/// their role whatever they submit.
pub fn role_for_update(actor: &Actor, target: &Target, requested: &str) -> Role {
    if target.role == Role::SuperAdmin {
        return Role::SuperAdmin;
    }
    if !actor.is_super_admin() && actor.id == target.id {
        return target.role;
    }
    assignable_role(actor, requested)
}

/// A regular admin may edit only their own account.
pub fn require_edit(actor: &Actor, target_id: i32) -> Result<(), AppError> {
    if actor.is_super_admin() || actor.id == target_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "user {} may not edit user {}",
            actor.id, target_id
        )))
    }
}

/// Nobody deletes themself; only a super_admin deletes anyone else.
pub fn require_delete(actor: &Actor, target_id: i32) -> Result<(), AppError> {
    if actor.id == target_id {
        return Err(AppError::Forbidden(format!(
            "user {} may not delete their own account",
            actor.id
        )));
    }
    if !actor.is_super_admin() {
        return Err(AppError::Forbidden(format!(
            "user {} may not delete user {}",
            actor.id, target_id
        )));
    }
    Ok(())
}
