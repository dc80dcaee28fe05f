use itertools::Itertools;

use crate::api::{AuthorId, Book, BookDetails, BookId, BookPatch, DEFAULT_BOOK_COUNT};
use crate::books_repository::{BooksRepository, BooksRepositoryError};
use crate::library_store::InMemoryLibraryStore;

#[async_trait::async_trait]
impl BooksRepository for InMemoryLibraryStore {
    async fn add_book(&self, details: BookDetails) -> Result<Book, BooksRepositoryError> {
        details.validate()?;

        let mut tables = self.tables.write();
        if let Some(missing) = tables.missing_author(&details.authors) {
            return Err(BooksRepositoryError::AuthorNotFound(missing));
        }

        let book = Book {
            id: self.next_book_id(),
            name: details.name,
            description: details.description,
            count: details.count.unwrap_or(DEFAULT_BOOK_COUNT),
            authors: details.authors.into_iter().collect(),
        };
        tables.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn get_book(&self, book_id: BookId) -> Result<Book, BooksRepositoryError> {
        self.tables
            .read()
            .books
            .get(&book_id)
            .cloned()
            .ok_or(BooksRepositoryError::NotFound(book_id))
    }

    async fn list_books(&self) -> Result<Vec<Book>, BooksRepositoryError> {
        Ok(self
            .tables
            .read()
            .books
            .values()
            .sorted_by_key(|book| book.id)
            .cloned()
            .collect())
    }

    async fn delete_book(&self, book_id: BookId) -> Result<bool, BooksRepositoryError> {
        let mut tables = self.tables.write();
        if tables.books.remove(&book_id).is_none() {
            return Ok(false);
        }
        // The book is gone, so its outstanding copies have nowhere to return to
        let removed_orders = tables
            .remove_orders_where(|order| order.book_id == book_id)
            .map_err(|e| BooksRepositoryError::Other(e.to_string()))?;
        tracing::info!("Deleted book {} with {} orders", book_id, removed_orders);
        Ok(true)
    }

    async fn update_book(
        &self,
        book_id: BookId,
        patch: BookPatch,
    ) -> Result<Book, BooksRepositoryError> {
        let mut tables = self.tables.write();
        let book = tables
            .books
            .get_mut(&book_id)
            .ok_or(BooksRepositoryError::NotFound(book_id))?;
        patch.apply_to(book);
        Ok(book.clone())
    }

    async fn add_authors(
        &self,
        book_id: BookId,
        author_ids: &[AuthorId],
    ) -> Result<Book, BooksRepositoryError> {
        let mut tables = self.tables.write();
        if let Some(missing) = tables.missing_author(author_ids) {
            return Err(BooksRepositoryError::AuthorNotFound(missing));
        }
        let book = tables
            .books
            .get_mut(&book_id)
            .ok_or(BooksRepositoryError::NotFound(book_id))?;
        book.authors.extend(author_ids.iter().copied());
        Ok(book.clone())
    }

    async fn remove_authors(
        &self,
        book_id: BookId,
        author_ids: &[AuthorId],
    ) -> Result<Book, BooksRepositoryError> {
        let mut tables = self.tables.write();
        let book = tables
            .books
            .get_mut(&book_id)
            .ok_or(BooksRepositoryError::NotFound(book_id))?;
        for author_id in author_ids {
            book.authors.remove(author_id);
        }
        Ok(book.clone())
    }
}
