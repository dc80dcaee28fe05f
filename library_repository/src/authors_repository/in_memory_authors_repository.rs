use itertools::Itertools;

use crate::api::{Author, AuthorDetails, AuthorId, AuthorPatch};
use crate::authors_repository::{AuthorsRepository, AuthorsRepositoryError};
use crate::library_store::InMemoryLibraryStore;

#[async_trait::async_trait]
impl AuthorsRepository for InMemoryLibraryStore {
    async fn add_author(&self, details: AuthorDetails) -> Result<Author, AuthorsRepositoryError> {
        details.validate()?;
        let author = Author {
            id: self.next_author_id(),
            name: details.name,
            surname: details.surname,
            patronymic: details.patronymic,
        };
        self.tables.write().authors.insert(author.id, author.clone());
        Ok(author)
    }

    async fn get_author(&self, author_id: AuthorId) -> Result<Author, AuthorsRepositoryError> {
        self.tables
            .read()
            .authors
            .get(&author_id)
            .cloned()
            .ok_or(AuthorsRepositoryError::NotFound(author_id))
    }

    async fn list_authors(&self) -> Result<Vec<Author>, AuthorsRepositoryError> {
        Ok(self
            .tables
            .read()
            .authors
            .values()
            .sorted_by_key(|author| author.id)
            .cloned()
            .collect())
    }

    async fn delete_author(&self, author_id: AuthorId) -> Result<bool, AuthorsRepositoryError> {
        let mut tables = self.tables.write();
        if tables.authors.remove(&author_id).is_none() {
            return Ok(false);
        }
        for book in tables.books.values_mut() {
            book.authors.remove(&author_id);
        }
        Ok(true)
    }

    async fn update_author(
        &self,
        author_id: AuthorId,
        patch: AuthorPatch,
    ) -> Result<Author, AuthorsRepositoryError> {
        let mut tables = self.tables.write();
        let author = tables
            .authors
            .get_mut(&author_id)
            .ok_or(AuthorsRepositoryError::NotFound(author_id))?;
        patch.apply_to(author);
        Ok(author.clone())
    }
}

#[cfg(test)]
mod tests_in_memory_authors_repository {
    use crate::api::BookDetails;
    use crate::books_repository::BooksRepository;

    use super::*;

    fn tolstoy() -> AuthorDetails {
        AuthorDetails {
            name: "Lev".to_string(),
            surname: "Tolstoy".to_string(),
            patronymic: "Nikolayevich".to_string(),
        }
    }

    #[tokio::test]
    /// 1. Adds author and gets it back
    /// 2. Author with too long name is not stored
    /// 3. Lists authors
    /// 4. Gets unknown author
    async fn test_author_management() {
        let repository = InMemoryLibraryStore::default();

        let author = repository.add_author(tolstoy()).await.unwrap();
        assert_eq!(repository.get_author(author.id).await.unwrap(), author);

        let too_long = AuthorDetails {
            name: "x".repeat(11),
            ..tolstoy()
        };
        assert!(matches!(
            repository.add_author(too_long).await,
            Err(AuthorsRepositoryError::Validation(..))
        ));

        // no uniqueness constraint on authors
        let same_name = repository.add_author(tolstoy()).await.unwrap();
        assert_eq!(
            repository.list_authors().await.unwrap(),
            vec![author.clone(), same_name.clone()]
        );

        assert!(matches!(
            repository.get_author(same_name.id + 1).await,
            Err(AuthorsRepositoryError::NotFound(..))
        ));
    }

    #[tokio::test]
    /// Too long surname is skipped, other fields from the same patch still apply
    async fn test_update_author_skips_invalid_field() {
        let repository = InMemoryLibraryStore::default();
        let author = repository.add_author(tolstoy()).await.unwrap();

        let updated = repository
            .update_author(
                author.id,
                AuthorPatch {
                    name: Some("Leo".to_string()),
                    surname: Some("x".repeat(21)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.surname, "Tolstoy");
        assert_eq!(updated.name, "Leo");
        assert_eq!(repository.get_author(author.id).await.unwrap(), updated);

        assert!(matches!(
            repository
                .update_author(author.id + 1, AuthorPatch::default())
                .await,
            Err(AuthorsRepositoryError::NotFound(..))
        ));
    }

    #[tokio::test]
    async fn test_delete_author_removes_it_from_books() {
        let repository = InMemoryLibraryStore::default();
        let tolstoy = repository.add_author(tolstoy()).await.unwrap();
        let book = repository
            .add_book(BookDetails {
                name: "War and Peace".to_string(),
                description: "Long".to_string(),
                count: None,
                authors: vec![tolstoy.id],
            })
            .await
            .unwrap();

        assert!(repository.delete_author(tolstoy.id).await.unwrap());
        assert!(!repository.delete_author(tolstoy.id).await.unwrap());
        assert!(repository
            .get_book(book.id)
            .await
            .unwrap()
            .authors
            .is_empty());
    }
}
