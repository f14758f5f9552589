use crate::application::repos::RepoError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const QUERY_CANCELED: &str = "57014";

/// Translate a driver error into the repository taxonomy.
///
/// Every store funnels its failures through here; no other code inspects SQLSTATE codes.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) => {
            let constraint = || db.constraint().unwrap_or("unknown").to_string();
            match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => RepoError::Duplicate {
                    constraint: constraint(),
                },
                Some(FOREIGN_KEY_VIOLATION) => RepoError::ForeignKey {
                    constraint: constraint(),
                },
                Some(QUERY_CANCELED) => RepoError::Timeout,
                _ => RepoError::from_persistence(db.message()),
            }
        }
        other => RepoError::from_persistence(other),
    }
}
