//! Lending: how orders and book stock interact.
//!
//! An order is OPEN while `end_at` is `None` and CLOSED once it is set; a
//! closed order never reopens. Creating an order reserves one copy of the
//! book and closing it returns that copy. Both writes happen atomically with
//! the order change, so concurrent orders against one book never lend a copy
//! twice.

use chrono::{DateTime, Utc};

use crate::api::{Book, BookId, Order, OrderId, OrderPatch, UserId};

mod in_memory_orders_repository;
mod postgres_orders_repository;

/// Copies that always stay on the shelf, a book is lent only while `count > RESERVED_COPIES`
pub const RESERVED_COPIES: i32 = 1;

pub fn can_lend(count: i32) -> bool {
    count > RESERVED_COPIES
}

#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum OrderRejection {
    #[error("User {0} is not stored")]
    UnknownUser(UserId),

    #[error("Book {0} is not stored")]
    UnknownBook(BookId),

    #[error("Book {book_id} has only {count} copies left")]
    InsufficientStock { book_id: BookId, count: i32 },

    #[error("Order {0} is already closed")]
    AlreadyClosed(OrderId),
}

#[derive(thiserror::Error, Debug)]
pub enum OrdersRepositoryError {
    #[error("Order {0} not found")]
    NotFound(OrderId),

    #[error("Order rejected: {0}")]
    Rejected(#[from] OrderRejection),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

#[async_trait::async_trait]
pub trait OrdersRepository: Send + Sync {
    /// Lends one copy of `book` to the user.
    ///
    /// Checks, in order, that the user is stored, that the book is stored and that the
    /// stored count is above [`RESERVED_COPIES`]. On success the order is inserted and
    /// the stored count decremented in one transaction, and `book.count` is set to the
    /// new stored value. On rejection nothing changes.
    async fn create_order(
        &self,
        user_id: UserId,
        book: &mut Book,
        plated_end_at: DateTime<Utc>,
    ) -> Result<Order, OrdersRepositoryError>;

    /// Marks the order as returned and puts the copy back in stock
    async fn close_order(
        &self,
        order_id: OrderId,
        end_at: DateTime<Utc>,
    ) -> Result<Order, OrdersRepositoryError>;

    async fn get_order(&self, order_id: OrderId) -> Result<Order, OrdersRepositoryError>;

    async fn list_orders(&self) -> Result<Vec<Order>, OrdersRepositoryError>;

    /// Orders whose copy has not been returned yet
    async fn list_outstanding_orders(&self) -> Result<Vec<Order>, OrdersRepositoryError>;

    /// Removes the order, returns false if it did not exist. An outstanding order returns its copy
    async fn delete_order(&self, order_id: OrderId) -> Result<bool, OrdersRepositoryError>;

    /// Applies the patch; setting `end_at` on an outstanding order closes it like [`Self::close_order`]
    async fn update_order(
        &self,
        order_id: OrderId,
        patch: OrderPatch,
    ) -> Result<Order, OrdersRepositoryError>;
}
