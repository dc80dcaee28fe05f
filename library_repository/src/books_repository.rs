use crate::api::{AuthorId, Book, BookDetails, BookId, BookPatch};
use crate::validation::ValidationError;

mod in_memory_books_repository;
mod postgres_books_repository;

#[derive(thiserror::Error, Debug)]
pub enum BooksRepositoryError {
    #[error("Invalid book: {0}")]
    Validation(#[from] ValidationError),

    #[error("Book {0} not found")]
    NotFound(BookId),

    #[error("Author {0} not found")]
    AuthorNotFound(AuthorId),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

#[async_trait::async_trait]
pub trait BooksRepository: Send + Sync {
    /// Adds book to repository together with its authors, all of which must already exist
    async fn add_book(&self, details: BookDetails) -> Result<Book, BooksRepositoryError>;
    /// Retrieves the book with its current stock count
    async fn get_book(&self, book_id: BookId) -> Result<Book, BooksRepositoryError>;
    /// Lists all books in the repository ordered by id
    async fn list_books(&self) -> Result<Vec<Book>, BooksRepositoryError>;
    /// Removes the book together with all of its orders, returns false if it did not exist
    async fn delete_book(&self, book_id: BookId) -> Result<bool, BooksRepositoryError>;
    /// Applies the valid part of the patch and persists the book
    async fn update_book(
        &self,
        book_id: BookId,
        patch: BookPatch,
    ) -> Result<Book, BooksRepositoryError>;
    /// Set union with the current authors, already present ids are ignored
    async fn add_authors(
        &self,
        book_id: BookId,
        author_ids: &[AuthorId],
    ) -> Result<Book, BooksRepositoryError>;
    /// Set difference with the current authors, absent ids are ignored
    async fn remove_authors(
        &self,
        book_id: BookId,
        author_ids: &[AuthorId],
    ) -> Result<Book, BooksRepositoryError>;
}
