//! Predicate builder for the article listing statements.
//!
//! Every listing reads from `live_articles`, so soft-deleted rows are excluded before any
//! predicate applies.

use sqlx::{Postgres, QueryBuilder};

use crate::application::pagination::PageRequest;
use crate::application::repos::ArticleQueryFilter;
use crate::domain::entities::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ArticlePredicate {
    /// Tagged with this tag name.
    Tag(String),
    /// Written by the user with this username.
    AuthorName(String),
    /// Favorited by the user with this username.
    FavoritedBy(String),
    /// Written by any of these users.
    AuthorIn(Vec<UserId>),
}

impl ArticlePredicate {
    fn push_join(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::Tag(_) => {
                qb.push(
                    " INNER JOIN article_tags at ON at.article_id = a.id \
                     INNER JOIN tags t ON t.id = at.tag_id",
                );
            }
            Self::AuthorName(_) => {
                qb.push(" INNER JOIN users au ON au.id = a.author_id");
            }
            Self::FavoritedBy(_) => {
                qb.push(
                    " INNER JOIN article_favorites af ON af.article_id = a.id \
                     INNER JOIN users fu ON fu.id = af.user_id",
                );
            }
            Self::AuthorIn(_) => {}
        }
    }

    fn push_condition(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::Tag(name) => {
                qb.push("t.name = ");
                qb.push_bind(name.clone());
            }
            Self::AuthorName(name) => {
                qb.push("au.username = ");
                qb.push_bind(name.clone());
            }
            Self::FavoritedBy(name) => {
                qb.push("fu.username = ");
                qb.push_bind(name.clone());
            }
            Self::AuthorIn(ids) => {
                qb.push("a.author_id = ANY(");
                qb.push_bind(ids.clone());
                qb.push(")");
            }
        }
    }
}

/// Explicit list of predicates; an empty list matches every live article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ArticleFilter {
    predicates: Vec<ArticlePredicate>,
}

impl ArticleFilter {
    pub(crate) fn from_query(filter: &ArticleQueryFilter) -> Self {
        let mut predicates = Vec::new();
        if let Some(tag) = non_blank(filter.tag.as_deref()) {
            predicates.push(ArticlePredicate::Tag(tag.to_string()));
        }
        if let Some(author) = non_blank(filter.author.as_deref()) {
            predicates.push(ArticlePredicate::AuthorName(author.to_string()));
        }
        if let Some(user) = non_blank(filter.favorited_by.as_deref()) {
            predicates.push(ArticlePredicate::FavoritedBy(user.to_string()));
        }
        Self { predicates }
    }

    pub(crate) fn by_authors(author_ids: &[UserId]) -> Self {
        Self {
            predicates: vec![ArticlePredicate::AuthorIn(author_ids.to_vec())],
        }
    }

    pub(crate) fn predicates(&self) -> &[ArticlePredicate] {
        &self.predicates
    }

    /// Distinct ids of the requested page, newest first.
    pub(crate) fn page_ids_query(&self, page: PageRequest) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT a.id FROM live_articles a");
        self.push_body(&mut qb);
        qb.push(" GROUP BY a.id, a.created_at ORDER BY a.created_at DESC, a.id DESC LIMIT ");
        qb.push_bind(page.limit);
        qb.push(" OFFSET ");
        qb.push_bind(page.offset);
        qb
    }

    /// Number of distinct matches, ignoring pagination.
    pub(crate) fn count_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(DISTINCT a.id) FROM live_articles a");
        self.push_body(&mut qb);
        qb
    }

    fn push_body(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        for predicate in &self.predicates {
            predicate.push_join(qb);
        }
        for (index, predicate) in self.predicates.iter().enumerate() {
            qb.push(if index == 0 { " WHERE " } else { " AND " });
            predicate.push_condition(qb);
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
