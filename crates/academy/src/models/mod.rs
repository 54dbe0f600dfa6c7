pub mod evaluation;
pub mod student;
pub mod user;

pub use user::Role;
