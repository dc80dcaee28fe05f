use chrono::Utc;
use itertools::Itertools;

use crate::api::{User, UserDetails, UserId, UserPatch};
use crate::library_store::InMemoryLibraryStore;
use crate::users_repository::{UsersRepository, UsersRepositoryError};

#[async_trait::async_trait]
impl UsersRepository for InMemoryLibraryStore {
    async fn add_user(&self, details: UserDetails) -> Result<User, UsersRepositoryError> {
        details.validate()?;

        let mut tables = self.tables.write();
        if tables.users.values().any(|user| user.email == details.email) {
            return Err(UsersRepositoryError::EmailTaken(details.email));
        }

        let now = Utc::now();
        let user = User {
            id: self.next_user_id(),
            email: details.email,
            password: details.password,
            first_name: details.first_name,
            middle_name: details.middle_name,
            last_name: details.last_name,
            role: Default::default(),
            is_active: false,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: UserId) -> Result<User, UsersRepositoryError> {
        self.tables
            .read()
            .users
            .get(&user_id)
            .cloned()
            .ok_or(UsersRepositoryError::NotFound(user_id))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, UsersRepositoryError> {
        self.tables
            .read()
            .users
            .values()
            .find(|user| user.email == email)
            .cloned()
            .ok_or_else(|| UsersRepositoryError::EmailNotFound(email.to_string()))
    }

    async fn list_users(&self) -> Result<Vec<User>, UsersRepositoryError> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .sorted_by_key(|user| user.id)
            .cloned()
            .collect())
    }

    async fn delete_user(&self, user_id: UserId) -> Result<bool, UsersRepositoryError> {
        let mut tables = self.tables.write();
        if !tables.users.contains_key(&user_id) {
            return Ok(false);
        }
        let removed_orders = tables
            .remove_orders_where(|order| order.user_id == user_id)
            .map_err(|e| UsersRepositoryError::Other(e.to_string()))?;
        tables.users.remove(&user_id);
        tracing::info!("Deleted user {} with {} orders", user_id, removed_orders);
        Ok(true)
    }

    async fn update_user(
        &self,
        user_id: UserId,
        patch: UserPatch,
    ) -> Result<User, UsersRepositoryError> {
        let mut tables = self.tables.write();
        let mut user = tables
            .users
            .get(&user_id)
            .cloned()
            .ok_or(UsersRepositoryError::NotFound(user_id))?;

        patch.apply_to(&mut user);

        if tables
            .users
            .values()
            .any(|other| other.id != user_id && other.email == user.email)
        {
            return Err(UsersRepositoryError::EmailTaken(user.email));
        }

        user.updated_at = Utc::now().max(user.updated_at);
        tables.users.insert(user_id, user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests_in_memory_users_repository {
    use crate::api::Role;
    use crate::validation::ValidationError;

    use super::*;

    fn user_details(email: &str) -> UserDetails {
        UserDetails {
            email: email.to_string(),
            password: "password".to_string(),
            first_name: "Anna".to_string(),
            middle_name: None,
            last_name: "Karenina".to_string(),
        }
    }

    #[tokio::test]
    /// Simple test to cover user management
    /// Combined into big unit test to avoid duplicate setup
    /// 1. Gets all users - expects empty
    /// 2. Creates user, checks defaults
    /// 3. Gets user by id and by email
    /// 4. Creates second user, lists both
    /// 5. Gets user not existing in store to get not found
    async fn test_user_management() {
        let repository = InMemoryLibraryStore::default();
        assert_eq!(repository.list_users().await.unwrap(), Vec::<User>::default());

        let user = repository
            .add_user(user_details("anna@example.com"))
            .await
            .unwrap();
        assert_eq!(user.role, Role::Visitor);
        assert!(!user.is_active);
        assert!(user.created_at <= user.updated_at);

        assert_eq!(repository.get_user(user.id).await.unwrap(), user);
        assert_eq!(
            repository
                .get_user_by_email("anna@example.com")
                .await
                .unwrap(),
            user
        );

        let user_2 = repository
            .add_user(user_details("vronsky@example.com"))
            .await
            .unwrap();
        assert_eq!(
            repository.list_users().await.unwrap(),
            vec![user.clone(), user_2.clone()]
        );

        let unknown_user_id = user_2.id + 1;
        assert!(matches!(
            repository.get_user(unknown_user_id).await,
            Err(UsersRepositoryError::NotFound(..))
        ));
        assert!(matches!(
            repository.get_user_by_email("nobody@example.com").await,
            Err(UsersRepositoryError::EmailNotFound(..))
        ));
    }

    #[tokio::test]
    /// Invalid users are never stored
    async fn test_add_user_rejects_invalid_details() {
        let repository = InMemoryLibraryStore::default();

        let too_long_name = UserDetails {
            last_name: "x".repeat(21),
            ..user_details("anna@example.com")
        };
        assert!(matches!(
            repository.add_user(too_long_name).await,
            Err(UsersRepositoryError::Validation(ValidationError::TooLong { .. }))
        ));

        let too_long_middle_name = UserDetails {
            middle_name: Some("x".repeat(21)),
            ..user_details("anna@example.com")
        };
        assert!(repository.add_user(too_long_middle_name).await.is_err());

        assert!(matches!(
            repository.add_user(user_details("anna.example.com")).await,
            Err(UsersRepositoryError::Validation(
                ValidationError::InvalidEmail(..)
            ))
        ));
        assert!(repository.list_users().await.unwrap().is_empty());

        repository
            .add_user(user_details("anna@example.com"))
            .await
            .unwrap();
        assert!(matches!(
            repository.add_user(user_details("anna@example.com")).await,
            Err(UsersRepositoryError::EmailTaken(..))
        ));
        assert_eq!(repository.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    /// 1. Updates with one invalid and several valid fields - only valid ones apply
    /// 2. Updates with an empty patch - still persists and keeps timestamps ordered
    /// 3. Updates email to one that is taken - conflict, nothing changes
    /// 4. Updates unknown user - not found
    async fn test_update_user() {
        let repository = InMemoryLibraryStore::default();
        let user = repository
            .add_user(user_details("anna@example.com"))
            .await
            .unwrap();
        let other = repository
            .add_user(user_details("vronsky@example.com"))
            .await
            .unwrap();

        let updated = repository
            .update_user(
                user.id,
                UserPatch {
                    first_name: Some("x".repeat(21)),
                    last_name: Some("Arkadyevna".to_string()),
                    role: Some(Role::Admin),
                    is_active: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name, "Anna");
        assert_eq!(updated.last_name, "Arkadyevna");
        assert_eq!(updated.role_name(), "admin");
        assert!(updated.is_active);
        assert_eq!(updated.created_at, user.created_at);
        assert!(updated.updated_at >= user.updated_at);
        assert_eq!(repository.get_user(user.id).await.unwrap(), updated);

        let touched = repository
            .update_user(user.id, UserPatch::default())
            .await
            .unwrap();
        assert!(touched.created_at <= touched.updated_at);
        assert!(touched.updated_at >= updated.updated_at);

        let conflict = repository
            .update_user(
                user.id,
                UserPatch {
                    email: Some(other.email.clone()),
                    last_name: Some("Changed".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(conflict, Err(UsersRepositoryError::EmailTaken(..))));
        assert_eq!(
            repository.get_user(user.id).await.unwrap().last_name,
            "Arkadyevna"
        );

        assert!(matches!(
            repository.update_user(other.id + 1, UserPatch::default()).await,
            Err(UsersRepositoryError::NotFound(..))
        ));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let repository = InMemoryLibraryStore::default();
        let user = repository
            .add_user(user_details("anna@example.com"))
            .await
            .unwrap();

        assert!(repository.delete_user(user.id).await.unwrap());
        assert!(!repository.delete_user(user.id).await.unwrap());
        assert!(matches!(
            repository.get_user(user.id).await,
            Err(UsersRepositoryError::NotFound(..))
        ));
    }
}
