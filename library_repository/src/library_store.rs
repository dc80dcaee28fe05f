pub use in_memory_library_store::InMemoryLibraryStore;
pub use postgres_library_store::{PostgresLibraryStore, PostgresLibraryStoreConfig};
pub(crate) use postgres_library_store::is_unique_violation;

use crate::authors_repository::AuthorsRepository;
use crate::books_repository::BooksRepository;
use crate::orders_repository::OrdersRepository;
use crate::users_repository::UsersRepository;

mod in_memory_library_store;
mod postgres_library_store;

#[cfg(test)]
pub(crate) use postgres_library_store::postgres_test_support;

/// Store backing every repository, shared between callers as `Arc<dyn LibraryStore>`
pub trait LibraryStore:
    UsersRepository + AuthorsRepository + BooksRepository + OrdersRepository
{
}

impl<T> LibraryStore for T where
    T: UsersRepository + AuthorsRepository + BooksRepository + OrdersRepository
{
}
