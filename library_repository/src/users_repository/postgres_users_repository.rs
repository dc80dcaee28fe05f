use tokio_postgres::Row;

use crate::api::{Role, User, UserDetails, UserId, UserPatch};
use crate::library_store::{is_unique_violation, PostgresLibraryStore};
use crate::users_repository::{UsersRepository, UsersRepositoryError};

const USER_COLUMNS: &str =
    "id, email, password, first_name, middle_name, last_name, role, is_active, created_at, updated_at";

fn row_to_user(row: &Row) -> Result<User, UsersRepositoryError> {
    let role_code: i32 = row.try_get("role")?;
    let role = Role::from(role_code);
    if role.code() != role_code {
        tracing::warn!(
            "Unrecognised role {} for user {:?}, treating as {}",
            role_code,
            row.try_get::<_, UserId>("id").ok(),
            role.name()
        );
    }

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password: row.try_get("password")?,
        first_name: row.try_get("first_name")?,
        middle_name: row.try_get("middle_name")?,
        last_name: row.try_get("last_name")?,
        role,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait::async_trait]
impl UsersRepository for PostgresLibraryStore {
    async fn add_user(&self, details: UserDetails) -> Result<User, UsersRepositoryError> {
        details.validate()?;

        let client = self.client.lock().await;
        let rows = client
            .query(
                &format!(
                    "INSERT INTO users (email, password, first_name, middle_name, last_name) \
                     VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
                ),
                &[
                    &details.email,
                    &details.password,
                    &details.first_name,
                    &details.middle_name,
                    &details.last_name,
                ],
            )
            .await;

        match rows {
            Ok(rows) => row_to_user(
                rows.first()
                    .ok_or_else(|| UsersRepositoryError::Other("User not returned".to_string()))?,
            ),
            Err(err) if is_unique_violation(&err) => {
                Err(UsersRepositoryError::EmailTaken(details.email))
            }
            Err(other_err) => Err(other_err.into()),
        }
    }

    async fn get_user(&self, user_id: UserId) -> Result<User, UsersRepositoryError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"),
                &[&user_id],
            )
            .await?
            .ok_or(UsersRepositoryError::NotFound(user_id))?;
        row_to_user(&row)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, UsersRepositoryError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"),
                &[&email],
            )
            .await?
            .ok_or_else(|| UsersRepositoryError::EmailNotFound(email.to_string()))?;
        row_to_user(&row)
    }

    async fn list_users(&self) -> Result<Vec<User>, UsersRepositoryError> {
        let client = self.client.lock().await;
        let rows = client
            .query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"), &[])
            .await?;
        rows.iter().map(row_to_user).collect()
    }

    async fn delete_user(&self, user_id: UserId) -> Result<bool, UsersRepositoryError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;

        // Same lock order as create_order and close_order: user, then orders, then books
        let user_row = transaction
            .query_opt("SELECT id FROM users WHERE id = $1 FOR UPDATE", &[&user_id])
            .await?;
        if user_row.is_none() {
            return Ok(false);
        }
        transaction
            .execute(
                "SELECT id FROM orders WHERE user_id = $1 FOR UPDATE",
                &[&user_id],
            )
            .await?;
        transaction
            .execute(
                "UPDATE books SET count = books.count + returned.copies \
                 FROM (SELECT book_id, COUNT(*)::INTEGER AS copies FROM orders \
                       WHERE user_id = $1 AND end_at IS NULL GROUP BY book_id) AS returned \
                 WHERE books.id = returned.book_id",
                &[&user_id],
            )
            .await?;
        let removed_orders = transaction
            .execute("DELETE FROM orders WHERE user_id = $1", &[&user_id])
            .await?;
        let removed_users = transaction
            .execute("DELETE FROM users WHERE id = $1", &[&user_id])
            .await?;

        transaction.commit().await?;
        if removed_users > 0 {
            tracing::info!("Deleted user {} with {} orders", user_id, removed_orders);
        }
        Ok(removed_users > 0)
    }

    async fn update_user(
        &self,
        user_id: UserId,
        patch: UserPatch,
    ) -> Result<User, UsersRepositoryError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;

        let row = transaction
            .query_opt(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"),
                &[&user_id],
            )
            .await?
            .ok_or(UsersRepositoryError::NotFound(user_id))?;
        let mut user = row_to_user(&row)?;
        patch.apply_to(&mut user);

        let role = user.role.code();
        let updated = transaction
            .query_one(
                &format!(
                    "UPDATE users SET email = $2, password = $3, first_name = $4, \
                     middle_name = $5, last_name = $6, role = $7, is_active = $8, \
                     updated_at = GREATEST(now(), updated_at) \
                     WHERE id = $1 RETURNING {USER_COLUMNS}"
                ),
                &[
                    &user_id,
                    &user.email,
                    &user.password,
                    &user.first_name,
                    &user.middle_name,
                    &user.last_name,
                    &role,
                    &user.is_active,
                ],
            )
            .await;

        let row = match updated {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => {
                return Err(UsersRepositoryError::EmailTaken(user.email))
            }
            Err(other_err) => return Err(other_err.into()),
        };
        let user = row_to_user(&row)?;
        transaction.commit().await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests_postgres_users_repository {
    use serial_test::file_serial;

    use crate::library_store::postgres_test_support::start_postgres_container_and_init_store;
    use crate::records::ToRecord;

    use super::*;

    fn user_details(email: &str) -> UserDetails {
        UserDetails {
            email: email.to_string(),
            password: "password".to_string(),
            first_name: "Anna".to_string(),
            middle_name: Some("A".to_string()),
            last_name: "Karenina".to_string(),
        }
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    /// Simple test to cover user management
    /// Combined into big unit test to avoid duplicate setup
    /// 1. Gets all users - expects empty
    /// 2. Creates user, reads it back by id and email with the same record
    /// 3. Invalid and duplicate users are not stored
    /// 4. Gets user not existing in db to get not found
    async fn test_user_management() {
        let (_container, repository) = start_postgres_container_and_init_store().await;
        assert!(repository.list_users().await.unwrap().is_empty());

        let user = repository
            .add_user(user_details("anna@example.com"))
            .await
            .unwrap();
        assert_eq!(user.role, Role::Visitor);
        assert!(!user.is_active);
        assert!(user.created_at <= user.updated_at);

        let stored = repository.get_user(user.id).await.unwrap();
        assert_eq!(stored.to_record(), user.to_record());
        assert_eq!(
            repository
                .get_user_by_email("anna@example.com")
                .await
                .unwrap()
                .id,
            user.id
        );

        assert!(matches!(
            repository
                .add_user(UserDetails {
                    first_name: "x".repeat(21),
                    ..user_details("other@example.com")
                })
                .await,
            Err(UsersRepositoryError::Validation(..))
        ));
        assert!(matches!(
            repository.add_user(user_details("anna@example.com")).await,
            Err(UsersRepositoryError::EmailTaken(..))
        ));
        assert_eq!(repository.list_users().await.unwrap().len(), 1);

        assert!(matches!(
            repository.get_user(user.id + 1).await,
            Err(UsersRepositoryError::NotFound(..))
        ));
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    /// 1. Partial update skips invalid field
    /// 2. Email conflict leaves the user unchanged
    /// 3. Delete user twice
    async fn test_update_and_delete_user() {
        let (_container, repository) = start_postgres_container_and_init_store().await;
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
                    middle_name: Some(None),
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name, "Anna");
        assert_eq!(updated.middle_name, None);
        assert_eq!(updated.role, Role::Admin);
        assert_eq!(updated.created_at, user.created_at);
        assert!(updated.updated_at >= user.updated_at);

        assert!(matches!(
            repository
                .update_user(
                    user.id,
                    UserPatch {
                        email: Some(other.email.clone()),
                        last_name: Some("Changed".to_string()),
                        ..Default::default()
                    },
                )
                .await,
            Err(UsersRepositoryError::EmailTaken(..))
        ));
        assert_eq!(
            repository.get_user(user.id).await.unwrap().last_name,
            "Karenina"
        );

        assert!(repository.delete_user(user.id).await.unwrap());
        assert!(!repository.delete_user(user.id).await.unwrap());
    }
}
