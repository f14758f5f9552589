use std::sync::Arc;

use crate::application::articles::ArticleService;
use crate::application::auth::TokenService;
use crate::application::comments::CommentService;
use crate::application::users::UserService;

#[derive(Clone)]
pub struct ApiState {
    pub users: Arc<UserService>,
    pub articles: Arc<ArticleService>,
    pub comments: Arc<CommentService>,
    pub tokens: Arc<TokenService>,
}
