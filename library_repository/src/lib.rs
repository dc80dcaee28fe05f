pub mod api;
pub mod authors_repository;
pub mod books_repository;
pub mod library_store;
pub mod orders_repository;
pub mod records;
pub mod settings;
pub mod users_repository;
pub mod validation;
