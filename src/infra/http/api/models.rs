use email_address::EmailAddress;
use serde::{Deserialize, Serialize, Serializer};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::application::articles::{CreateArticleCommand, UpdateArticleCommand};
use crate::application::users::{SignUpCommand, UpdateUserCommand, UserSession};
use crate::domain::entities::{ArticlePage, ArticleRecord, CommentRecord, ProfileRecord};

use super::error::ApiError;

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

/// Millisecond precision, always rendered in UTC.
pub fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .to_offset(UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_default()
}

fn serialize_timestamp<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_timestamp(*value))
}

// ----- Validation -----

/// Declarative per-field checks run after the body has been bound.
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

fn required(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(field, "required"));
    }
    Ok(())
}

fn email(field: &str, value: &str) -> Result<(), ApiError> {
    if !EmailAddress::is_valid(value) {
        return Err(ApiError::validation(field, "email"));
    }
    Ok(())
}

/// An empty string counts as "not provided" for partial updates.
fn provided(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

/// Body wrapper such as `{"user": {...}}`; a missing wrapper fails validation.
fn unwrap_required<'a, T>(field: &str, value: &'a Option<T>) -> Result<&'a T, ApiError> {
    value
        .as_ref()
        .ok_or_else(|| ApiError::validation(field, "required"))
}

// ----- Users -----

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    #[serde(default)]
    pub user: Option<SignUpUser>,
}

#[derive(Debug, Deserialize)]
pub struct SignUpUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Validate for SignUpRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let user = unwrap_required("User", &self.user)?;
        required("Username", &user.username)?;
        required("Email", &user.email)?;
        email("Email", &user.email)?;
        required("Password", &user.password)
    }
}

impl SignUpRequest {
    pub fn into_command(self) -> Result<SignUpCommand, ApiError> {
        self.validate()?;
        let user = self
            .user
            .ok_or_else(|| ApiError::validation("User", "required"))?;
        Ok(SignUpCommand {
            username: user.username,
            email: user.email,
            password: user.password,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub user: Option<SignInUser>,
}

#[derive(Debug, Deserialize)]
pub struct SignInUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Validate for SignInRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let user = unwrap_required("User", &self.user)?;
        required("Email", &user.email)?;
        email("Email", &user.email)?;
        required("Password", &user.password)
    }
}

impl SignInRequest {
    pub fn into_credentials(self) -> Result<SignInUser, ApiError> {
        self.validate()?;
        self.user
            .ok_or_else(|| ApiError::validation("User", "required"))
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub user: Option<UpdateUser>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let user = unwrap_required("User", &self.user)?;
        if let Some(value) = user.email.as_deref()
            && !value.is_empty()
        {
            email("Email", value)?;
        }
        Ok(())
    }
}

impl UpdateUserRequest {
    pub fn into_command(self) -> Result<UpdateUserCommand, ApiError> {
        self.validate()?;
        let user = self.user.unwrap_or_default();
        Ok(UpdateUserCommand {
            username: provided(user.username),
            email: provided(user.email),
            password: provided(user.password),
            bio: provided(user.bio),
            image: provided(user.image),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: UserBody,
}

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub email: String,
    pub token: String,
    pub username: String,
    pub bio: String,
    pub image: String,
}

impl From<UserSession> for UserResponse {
    fn from(session: UserSession) -> Self {
        Self {
            user: UserBody {
                email: session.user.email,
                token: session.token,
                username: session.user.username,
                bio: session.user.bio,
                image: session.user.image,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: ProfileBody,
}

#[derive(Debug, Serialize)]
pub struct ProfileBody {
    pub username: String,
    pub bio: String,
    pub image: String,
    pub following: bool,
}

impl From<ProfileRecord> for ProfileBody {
    fn from(profile: ProfileRecord) -> Self {
        Self {
            username: profile.username,
            bio: profile.bio,
            image: profile.image,
            following: profile.following,
        }
    }
}

impl From<ProfileRecord> for ProfileResponse {
    fn from(profile: ProfileRecord) -> Self {
        Self {
            profile: profile.into(),
        }
    }
}

// ----- Articles -----

#[derive(Debug, Default, Deserialize)]
pub struct ArticleListQuery {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateArticleRequest {
    #[serde(default)]
    pub article: Option<CreateArticle>,
}

#[derive(Debug, Deserialize)]
pub struct CreateArticle {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, rename = "tagList")]
    pub tag_list: Vec<String>,
}

impl Validate for CreateArticleRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let article = unwrap_required("Article", &self.article)?;
        required("Title", &article.title)?;
        required("Description", &article.description)?;
        required("Body", &article.body)
    }
}

impl CreateArticleRequest {
    pub fn into_command(self) -> Result<CreateArticleCommand, ApiError> {
        self.validate()?;
        let article = self
            .article
            .ok_or_else(|| ApiError::validation("Article", "required"))?;
        Ok(CreateArticleCommand {
            title: article.title,
            description: article.description,
            body: article.body,
            tags: article.tag_list,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateArticleRequest {
    #[serde(default)]
    pub article: Option<UpdateArticle>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

impl Validate for UpdateArticleRequest {
    fn validate(&self) -> Result<(), ApiError> {
        unwrap_required("Article", &self.article).map(|_| ())
    }
}

impl UpdateArticleRequest {
    pub fn into_command(self) -> Result<UpdateArticleCommand, ApiError> {
        self.validate()?;
        let article = self.article.unwrap_or_default();
        Ok(UpdateArticleCommand {
            title: provided(article.title),
            description: provided(article.description),
            body: provided(article.body),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleBody {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(serialize_with = "serialize_timestamp")]
    pub updated_at: OffsetDateTime,
    pub favorited: bool,
    pub favorites_count: i64,
    pub author: ProfileBody,
}

impl From<ArticleRecord> for ArticleBody {
    fn from(article: ArticleRecord) -> Self {
        Self {
            slug: article.slug,
            title: article.title,
            description: article.description,
            body: article.body,
            tag_list: article.tags,
            created_at: article.created_at,
            updated_at: article.updated_at,
            favorited: article.favorited,
            favorites_count: article.favorites_count,
            author: article.author.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    pub article: ArticleBody,
}

impl From<ArticleRecord> for ArticleResponse {
    fn from(article: ArticleRecord) -> Self {
        Self {
            article: article.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlesResponse {
    pub articles: Vec<ArticleBody>,
    pub articles_count: i64,
}

impl From<ArticlePage> for ArticlesResponse {
    fn from(page: ArticlePage) -> Self {
        Self {
            articles: page.articles.into_iter().map(ArticleBody::from).collect(),
            articles_count: page.total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

// ----- Comments -----

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub comment: Option<CreateComment>,
}

#[derive(Debug, Deserialize)]
pub struct CreateComment {
    #[serde(default)]
    pub body: String,
}

impl Validate for CreateCommentRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let comment = unwrap_required("Comment", &self.comment)?;
        required("Body", &comment.body)
    }
}

impl CreateCommentRequest {
    pub fn into_body(self) -> Result<String, ApiError> {
        self.validate()?;
        self.comment
            .map(|comment| comment.body)
            .ok_or_else(|| ApiError::validation("Comment", "required"))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentBody {
    pub id: i64,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(serialize_with = "serialize_timestamp")]
    pub updated_at: OffsetDateTime,
    pub body: String,
    pub author: ProfileBody,
}

impl From<CommentRecord> for CommentBody {
    fn from(comment: CommentRecord) -> Self {
        Self {
            id: comment.id,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            body: comment.body,
            author: comment.author.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub comment: CommentBody,
}

#[derive(Debug, Serialize)]
pub struct CommentsResponse {
    pub comments: Vec<CommentBody>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    pub fn deleted() -> Self {
        Self { status: "deleted" }
    }
}
