use std::collections::BTreeSet;

use tokio_postgres::{GenericClient, Row, Transaction};

use crate::api::{AuthorId, Book, BookDetails, BookId, BookPatch, DEFAULT_BOOK_COUNT};
use crate::books_repository::{BooksRepository, BooksRepositoryError};
use crate::library_store::PostgresLibraryStore;

const BOOK_SELECT: &str = "SELECT b.id, b.name, b.description, b.count, \
     COALESCE(array_agg(ba.author_id) FILTER (WHERE ba.author_id IS NOT NULL), '{}') AS authors \
     FROM books b LEFT JOIN book_authors ba ON ba.book_id = b.id";

fn row_to_book(row: &Row) -> Result<Book, BooksRepositoryError> {
    let authors: Vec<AuthorId> = row.try_get("authors")?;
    Ok(Book {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        count: row.try_get("count")?,
        authors: authors.into_iter().collect(),
    })
}

async fn fetch_book<C>(client: &C, book_id: BookId) -> Result<Book, BooksRepositoryError>
where
    C: GenericClient + Sync,
{
    let row = client
        .query_opt(
            &format!("{BOOK_SELECT} WHERE b.id = $1 GROUP BY b.id"),
            &[&book_id],
        )
        .await?
        .ok_or(BooksRepositoryError::NotFound(book_id))?;
    row_to_book(&row)
}

/// Locks the book row until the end of the transaction
async fn lock_book(
    transaction: &Transaction<'_>,
    book_id: BookId,
) -> Result<(), BooksRepositoryError> {
    transaction
        .query_opt("SELECT id FROM books WHERE id = $1 FOR UPDATE", &[&book_id])
        .await?
        .ok_or(BooksRepositoryError::NotFound(book_id))?;
    Ok(())
}

async fn check_authors_exist(
    transaction: &Transaction<'_>,
    author_ids: &[AuthorId],
) -> Result<(), BooksRepositoryError> {
    let rows = transaction
        .query(
            "SELECT id FROM authors WHERE id = ANY($1) FOR SHARE",
            &[&author_ids],
        )
        .await?;
    let found = rows
        .iter()
        .map(|row| row.try_get(0))
        .collect::<Result<BTreeSet<AuthorId>, _>>()?;
    match author_ids.iter().find(|author_id| !found.contains(*author_id)) {
        Some(missing) => Err(BooksRepositoryError::AuthorNotFound(*missing)),
        None => Ok(()),
    }
}

async fn link_authors(
    transaction: &Transaction<'_>,
    book_id: BookId,
    author_ids: &[AuthorId],
) -> Result<(), BooksRepositoryError> {
    transaction
        .execute(
            "INSERT INTO book_authors (book_id, author_id) \
             SELECT $1, unnest($2::INTEGER[]) ON CONFLICT DO NOTHING",
            &[&book_id, &author_ids],
        )
        .await?;
    Ok(())
}

#[async_trait::async_trait]
impl BooksRepository for PostgresLibraryStore {
    async fn add_book(&self, details: BookDetails) -> Result<Book, BooksRepositoryError> {
        details.validate()?;

        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;
        check_authors_exist(&transaction, &details.authors).await?;

        let count = details.count.unwrap_or(DEFAULT_BOOK_COUNT);
        let rows = transaction
            .query(
                "INSERT INTO books (name, description, count) VALUES ($1, $2, $3) RETURNING id",
                &[&details.name, &details.description, &count],
            )
            .await?;
        let book_id: BookId = rows
            .first()
            .ok_or_else(|| BooksRepositoryError::Other("Id not returned".to_string()))?
            .try_get(0)?;

        link_authors(&transaction, book_id, &details.authors).await?;
        let book = fetch_book(&transaction, book_id).await?;
        transaction.commit().await?;
        Ok(book)
    }

    async fn get_book(&self, book_id: BookId) -> Result<Book, BooksRepositoryError> {
        let client = self.client.lock().await;
        fetch_book(&*client, book_id).await
    }

    async fn list_books(&self) -> Result<Vec<Book>, BooksRepositoryError> {
        let client = self.client.lock().await;
        let rows = client
            .query(&format!("{BOOK_SELECT} GROUP BY b.id ORDER BY b.id"), &[])
            .await?;
        rows.iter().map(row_to_book).collect()
    }

    async fn delete_book(&self, book_id: BookId) -> Result<bool, BooksRepositoryError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;

        let removed_orders = transaction
            .execute("DELETE FROM orders WHERE book_id = $1", &[&book_id])
            .await?;
        let removed_books = transaction
            .execute("DELETE FROM books WHERE id = $1", &[&book_id])
            .await?;

        transaction.commit().await?;
        if removed_books > 0 {
            tracing::info!("Deleted book {} with {} orders", book_id, removed_orders);
        }
        Ok(removed_books > 0)
    }

    async fn update_book(
        &self,
        book_id: BookId,
        patch: BookPatch,
    ) -> Result<Book, BooksRepositoryError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;

        lock_book(&transaction, book_id).await?;
        let mut book = fetch_book(&transaction, book_id).await?;
        patch.apply_to(&mut book);

        transaction
            .execute(
                "UPDATE books SET name = $2, description = $3, count = $4 WHERE id = $1",
                &[&book_id, &book.name, &book.description, &book.count],
            )
            .await?;
        transaction.commit().await?;
        Ok(book)
    }

    async fn add_authors(
        &self,
        book_id: BookId,
        author_ids: &[AuthorId],
    ) -> Result<Book, BooksRepositoryError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;

        lock_book(&transaction, book_id).await?;
        check_authors_exist(&transaction, author_ids).await?;
        link_authors(&transaction, book_id, author_ids).await?;

        let book = fetch_book(&transaction, book_id).await?;
        transaction.commit().await?;
        Ok(book)
    }

    async fn remove_authors(
        &self,
        book_id: BookId,
        author_ids: &[AuthorId],
    ) -> Result<Book, BooksRepositoryError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;

        lock_book(&transaction, book_id).await?;
        transaction
            .execute(
                "DELETE FROM book_authors WHERE book_id = $1 AND author_id = ANY($2)",
                &[&book_id, &author_ids],
            )
            .await?;

        let book = fetch_book(&transaction, book_id).await?;
        transaction.commit().await?;
        Ok(book)
    }
}
