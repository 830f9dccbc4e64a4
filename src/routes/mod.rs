mod auth;
mod health_check;
mod users;

pub use auth::{change_password, get_current_user, login, logout, refresh};
pub use health_check::health_check;
pub use users::register;
