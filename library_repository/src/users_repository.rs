use crate::api::{User, UserDetails, UserId, UserPatch};
use crate::validation::ValidationError;

mod in_memory_users_repository;
mod postgres_users_repository;

#[derive(thiserror::Error, Debug)]
pub enum UsersRepositoryError {
    #[error("Invalid user: {0}")]
    Validation(#[from] ValidationError),

    #[error("User {0} not found")]
    NotFound(UserId),

    #[error("User with email {0} not found")]
    EmailNotFound(String),

    #[error("Email {0} already taken")]
    EmailTaken(String),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

#[async_trait::async_trait]
pub trait UsersRepository: Send + Sync {
    /// Validates and stores a new user, timestamps are assigned by the store
    async fn add_user(&self, details: UserDetails) -> Result<User, UsersRepositoryError>;
    async fn get_user(&self, user_id: UserId) -> Result<User, UsersRepositoryError>;
    async fn get_user_by_email(&self, email: &str) -> Result<User, UsersRepositoryError>;
    /// Lists all users ordered by id
    async fn list_users(&self) -> Result<Vec<User>, UsersRepositoryError>;
    /// Removes the user together with all of their orders, returns false if the user did not exist.
    /// Copies held by outstanding orders go back to stock
    async fn delete_user(&self, user_id: UserId) -> Result<bool, UsersRepositoryError>;
    /// Applies the valid part of the patch and persists the user, refreshing `updated_at`
    async fn update_user(
        &self,
        user_id: UserId,
        patch: UserPatch,
    ) -> Result<User, UsersRepositoryError>;
}
