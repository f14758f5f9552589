//! API handlers organized by resource type.
//!
//! Every handler binds its input, makes one service call and maps the outcome to a
//! response; error conversion lives in [`super::error`].

mod articles;
mod comments;
mod profiles;
mod tags;
mod users;

pub use articles::*;
pub use comments::*;
pub use profiles::*;
pub use tags::*;
pub use users::*;

use axum::extract::Extension;

use crate::application::auth::AuthPrincipal;
use crate::domain::entities::UserId;

/// Viewer id on routes where authentication is optional.
fn viewer(principal: Option<Extension<AuthPrincipal>>) -> Option<UserId> {
    principal.map(|Extension(principal)| principal.user_id)
}
