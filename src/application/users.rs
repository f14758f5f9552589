//! Account and profile use cases.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::auth::{
    PasswordError, TokenError, TokenService, hash_password, verify_password,
};
use crate::application::repos::{NewUser, RepoError, UsersRepo};
use crate::domain::entities::{ProfileRecord, UserId, UserRecord};

#[derive(Debug, Error)]
pub enum UserServiceError {
    #[error("duplicate email: {0}")]
    DuplicateEmail(String),
    #[error("duplicate username: {0}")]
    DuplicateUsername(String),
    #[error("user({0}) not found")]
    NotFound(String),
    #[error("password mismatch")]
    PasswordMismatch,
    #[error("user already following {0}")]
    AlreadyFollowing(String),
    #[error("user already unfollowing user({0})")]
    NotFollowing(String),
    #[error(transparent)]
    Password(PasswordError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<PasswordError> for UserServiceError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Mismatch => Self::PasswordMismatch,
            other => Self::Password(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignUpCommand {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserCommand {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

/// A user together with a freshly issued session token.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub user: UserRecord,
    pub token: String,
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UsersRepo>,
    tokens: Arc<TokenService>,
}

impl UserService {
    pub fn new(users: Arc<dyn UsersRepo>, tokens: Arc<TokenService>) -> Self {
        Self { users, tokens }
    }

    pub async fn sign_up(&self, command: SignUpCommand) -> Result<UserSession, UserServiceError> {
        let password_hash = hash_password(&command.password)?;
        let user = self
            .users
            .save(NewUser {
                email: command.email.clone(),
                username: command.username.clone(),
                password_hash,
            })
            .await
            .map_err(|err| duplicate_to_error(err, &command.email, &command.username))?;

        info!(
            target = "realworld::application::users",
            user_id = user.id,
            "registered user"
        );
        self.session(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserSession, UserServiceError> {
        let user = self
            .users
            .find_by_email(email)
            .await
            .map_err(|err| not_found_as(err, email))?;

        if let Err(err) = verify_password(&user.password_hash, password) {
            warn!(
                target = "realworld::application::users",
                user_id = user.id,
                "sign in rejected: wrong password"
            );
            return Err(err.into());
        }

        self.session(user)
    }

    pub async fn current(&self, user_id: UserId) -> Result<UserSession, UserServiceError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(|err| not_found_as(err, &user_id.to_string()))?;
        self.session(user)
    }

    pub async fn update(
        &self,
        user_id: UserId,
        command: UpdateUserCommand,
    ) -> Result<UserSession, UserServiceError> {
        let mut user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(|err| not_found_as(err, &user_id.to_string()))?;

        if let Some(username) = command.username {
            user.username = username;
        }
        if let Some(email) = command.email {
            user.email = email;
        }
        if let Some(password) = command.password {
            user.password_hash = hash_password(&password)?;
        }
        if let Some(bio) = command.bio {
            user.bio = bio;
        }
        if let Some(image) = command.image {
            user.image = image;
        }

        let updated = self
            .users
            .update(&user)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => UserServiceError::NotFound(user_id.to_string()),
                other => duplicate_to_error(other, &user.email, &user.username),
            })?;

        self.session(updated)
    }

    pub async fn profile(
        &self,
        viewer: Option<UserId>,
        username: &str,
    ) -> Result<ProfileRecord, UserServiceError> {
        let user = self.find_by_name(username).await?;

        let following = match viewer {
            Some(viewer) if viewer != user.id => self.users.is_follow(viewer, user.id).await?,
            _ => false,
        };

        Ok(user.profile(following))
    }

    pub async fn follow(
        &self,
        viewer: UserId,
        username: &str,
    ) -> Result<ProfileRecord, UserServiceError> {
        let user = self.find_by_name(username).await?;

        self.users
            .follow(viewer, user.id)
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => {
                    UserServiceError::AlreadyFollowing(user.username.clone())
                }
                RepoError::ForeignKey { .. } => UserServiceError::NotFound(username.to_string()),
                other => other.into(),
            })?;

        Ok(user.profile(true))
    }

    /// Unfollowing a pair that is not followed is an error, not a no-op.
    pub async fn unfollow(
        &self,
        viewer: UserId,
        username: &str,
    ) -> Result<ProfileRecord, UserServiceError> {
        let user = self.find_by_name(username).await?;

        self.users
            .unfollow(viewer, user.id)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => UserServiceError::NotFollowing(username.to_string()),
                other => other.into(),
            })?;

        Ok(user.profile(false))
    }

    async fn find_by_name(&self, username: &str) -> Result<UserRecord, UserServiceError> {
        self.users
            .find_by_name(username)
            .await
            .map_err(|err| not_found_as(err, username))
    }

    fn session(&self, user: UserRecord) -> Result<UserSession, UserServiceError> {
        let token = self.tokens.issue(user.id)?;
        Ok(UserSession { user, token })
    }
}

/// Set `following` on every profile from one batched lookup.
pub(crate) async fn apply_following<'a, I>(
    users: &dyn UsersRepo,
    viewer: UserId,
    profiles: I,
) -> Result<(), RepoError>
where
    I: IntoIterator<Item = &'a mut ProfileRecord>,
{
    let mut profiles: Vec<&mut ProfileRecord> = profiles.into_iter().collect();
    if profiles.is_empty() {
        return Ok(());
    }

    let mut ids: Vec<UserId> = profiles.iter().map(|profile| profile.id).collect();
    ids.sort_unstable();
    ids.dedup();

    let follows = users.is_follows(viewer, &ids).await?;
    for profile in profiles.iter_mut() {
        profile.following = follows.get(&profile.id).copied().unwrap_or(false);
    }
    Ok(())
}

fn not_found_as(err: RepoError, key: &str) -> UserServiceError {
    match err {
        RepoError::NotFound => UserServiceError::NotFound(key.to_string()),
        other => other.into(),
    }
}

fn duplicate_to_error(err: RepoError, email: &str, username: &str) -> UserServiceError {
    match err {
        RepoError::Duplicate { constraint } if constraint.contains("username") => {
            UserServiceError::DuplicateUsername(username.to_string())
        }
        RepoError::Duplicate { .. } => UserServiceError::DuplicateEmail(email.to_string()),
        other => other.into(),
    }
}
