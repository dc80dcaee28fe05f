use tokio_postgres::Row;

use crate::api::{Author, AuthorDetails, AuthorId, AuthorPatch};
use crate::authors_repository::{AuthorsRepository, AuthorsRepositoryError};
use crate::library_store::PostgresLibraryStore;

fn row_to_author(row: &Row) -> Result<Author, AuthorsRepositoryError> {
    Ok(Author {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        surname: row.try_get("surname")?,
        patronymic: row.try_get("patronymic")?,
    })
}

#[async_trait::async_trait]
impl AuthorsRepository for PostgresLibraryStore {
    async fn add_author(&self, details: AuthorDetails) -> Result<Author, AuthorsRepositoryError> {
        details.validate()?;

        let client = self.client.lock().await;
        let rows = client
            .query(
                "INSERT INTO authors (name, surname, patronymic) VALUES ($1, $2, $3) \
                 RETURNING id, name, surname, patronymic",
                &[&details.name, &details.surname, &details.patronymic],
            )
            .await?;

        row_to_author(
            rows.first()
                .ok_or_else(|| AuthorsRepositoryError::Other("Author not returned".to_string()))?,
        )
    }

    async fn get_author(&self, author_id: AuthorId) -> Result<Author, AuthorsRepositoryError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                "SELECT id, name, surname, patronymic FROM authors WHERE id = $1",
                &[&author_id],
            )
            .await?
            .ok_or(AuthorsRepositoryError::NotFound(author_id))?;
        row_to_author(&row)
    }

    async fn list_authors(&self) -> Result<Vec<Author>, AuthorsRepositoryError> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT id, name, surname, patronymic FROM authors ORDER BY id",
                &[],
            )
            .await?;
        rows.iter().map(row_to_author).collect()
    }

    async fn delete_author(&self, author_id: AuthorId) -> Result<bool, AuthorsRepositoryError> {
        // book_authors rows go with it through ON DELETE CASCADE
        let client = self.client.lock().await;
        let removed = client
            .execute("DELETE FROM authors WHERE id = $1", &[&author_id])
            .await?;
        Ok(removed > 0)
    }

    async fn update_author(
        &self,
        author_id: AuthorId,
        patch: AuthorPatch,
    ) -> Result<Author, AuthorsRepositoryError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;

        let row = transaction
            .query_opt(
                "SELECT id, name, surname, patronymic FROM authors WHERE id = $1 FOR UPDATE",
                &[&author_id],
            )
            .await?
            .ok_or(AuthorsRepositoryError::NotFound(author_id))?;
        let mut author = row_to_author(&row)?;
        patch.apply_to(&mut author);

        transaction
            .execute(
                "UPDATE authors SET name = $2, surname = $3, patronymic = $4 WHERE id = $1",
                &[
                    &author_id,
                    &author.name,
                    &author.surname,
                    &author.patronymic,
                ],
            )
            .await?;
        transaction.commit().await?;
        Ok(author)
    }
}
