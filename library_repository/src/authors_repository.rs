use crate::api::{Author, AuthorDetails, AuthorId, AuthorPatch};
use crate::validation::ValidationError;

mod in_memory_authors_repository;
mod postgres_authors_repository;

#[derive(thiserror::Error, Debug)]
pub enum AuthorsRepositoryError {
    #[error("Invalid author: {0}")]
    Validation(#[from] ValidationError),

    #[error("Author {0} not found")]
    NotFound(AuthorId),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

#[async_trait::async_trait]
pub trait AuthorsRepository: Send + Sync {
    async fn add_author(&self, details: AuthorDetails) -> Result<Author, AuthorsRepositoryError>;
    async fn get_author(&self, author_id: AuthorId) -> Result<Author, AuthorsRepositoryError>;
    async fn list_authors(&self) -> Result<Vec<Author>, AuthorsRepositoryError>;
    /// Removes the author and drops it from every book, returns false if it did not exist
    async fn delete_author(&self, author_id: AuthorId) -> Result<bool, AuthorsRepositoryError>;
    async fn update_author(
        &self,
        author_id: AuthorId,
        patch: AuthorPatch,
    ) -> Result<Author, AuthorsRepositoryError>;
}
