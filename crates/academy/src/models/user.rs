use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Administrator account.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    pub name: String,

    #[serde(skip_serializing)]
    pub password_hash: String,

    /// `admin` or `super_admin`; read through [`Model::role`].
    pub role: String,

    /// Token of the only browser allowed to stay signed in, if any.
    #[serde(skip_serializing)]
    pub session_token: Option<String>,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::evaluation::Entity")]
    Evaluations,
}

impl Related<super::evaluation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Evaluations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Stored role, unknown values read as `Admin`.
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "admin" => Some(Role::Admin),
            "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row shown in the user list and edit form.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
    pub name: String,
    pub role: String,
    pub created_at: NaiveDateTime,
}

impl From<Model> for UserSummary {
    fn from(user: Model) -> Self {
        UserSummary {
            id: user.id,
            role: user.role().as_str().to_string(),
            username: user.username,
            name: user.name,
            created_at: user.created_at,
        }
    }
}
