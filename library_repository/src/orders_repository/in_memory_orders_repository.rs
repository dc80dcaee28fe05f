use chrono::{DateTime, Utc};
use itertools::Itertools;

use crate::api::{Book, Order, OrderId, OrderPatch, UserId};
use crate::library_store::InMemoryLibraryStore;
use crate::orders_repository::{
    can_lend, OrderRejection, OrdersRepository, OrdersRepositoryError,
};

#[async_trait::async_trait]
impl OrdersRepository for InMemoryLibraryStore {
    async fn create_order(
        &self,
        user_id: UserId,
        book: &mut Book,
        plated_end_at: DateTime<Utc>,
    ) -> Result<Order, OrdersRepositoryError> {
        let mut tables = self.tables.write();

        if !tables.users.contains_key(&user_id) {
            tracing::warn!("Order for book {} rejected, unknown user {}", book.id, user_id);
            return Err(OrderRejection::UnknownUser(user_id).into());
        }
        let stored_book = tables
            .books
            .get_mut(&book.id)
            .ok_or(OrderRejection::UnknownBook(book.id))?;
        if !can_lend(stored_book.count) {
            tracing::warn!(
                "Order for book {} rejected, only {} copies left",
                book.id,
                stored_book.count
            );
            return Err(OrderRejection::InsufficientStock {
                book_id: book.id,
                count: stored_book.count,
            }
            .into());
        }
        stored_book.count -= 1;
        book.count = stored_book.count;

        let order = Order {
            id: self.next_order_id(),
            user_id,
            book_id: book.id,
            created_at: Utc::now(),
            plated_end_at,
            end_at: None,
        };
        tables.orders.insert(order.id, order.clone());
        tracing::info!(
            "Order {} created for user {}, book {} has {} copies left",
            order.id,
            user_id,
            book.id,
            book.count
        );
        Ok(order)
    }

    async fn close_order(
        &self,
        order_id: OrderId,
        end_at: DateTime<Utc>,
    ) -> Result<Order, OrdersRepositoryError> {
        let mut tables = self.tables.write();
        let mut order = tables
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(OrdersRepositoryError::NotFound(order_id))?;
        if !order.is_outstanding() {
            return Err(OrderRejection::AlreadyClosed(order_id).into());
        }
        tables
            .return_copy(order.book_id)
            .map_err(|e| OrdersRepositoryError::Other(e.to_string()))?;
        order.end_at = Some(end_at);
        tables.orders.insert(order_id, order.clone());
        tracing::info!("Order {} closed", order_id);
        Ok(order)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Order, OrdersRepositoryError> {
        self.tables
            .read()
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(OrdersRepositoryError::NotFound(order_id))
    }

    async fn list_orders(&self) -> Result<Vec<Order>, OrdersRepositoryError> {
        Ok(self
            .tables
            .read()
            .orders
            .values()
            .sorted_by_key(|order| order.id)
            .cloned()
            .collect())
    }

    async fn list_outstanding_orders(&self) -> Result<Vec<Order>, OrdersRepositoryError> {
        Ok(self
            .tables
            .read()
            .orders
            .values()
            .filter(|order| order.is_outstanding())
            .sorted_by_key(|order| order.id)
            .cloned()
            .collect())
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<bool, OrdersRepositoryError> {
        let removed = self
            .tables
            .write()
            .remove_order(order_id)
            .map_err(|e| OrdersRepositoryError::Other(e.to_string()))?;
        Ok(removed.is_some())
    }

    async fn update_order(
        &self,
        order_id: OrderId,
        patch: OrderPatch,
    ) -> Result<Order, OrdersRepositoryError> {
        let mut tables = self.tables.write();
        let mut order = tables
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(OrdersRepositoryError::NotFound(order_id))?;
        let was_outstanding = order.is_outstanding();
        patch.apply_to(&mut order);
        if was_outstanding && !order.is_outstanding() {
            tables
                .return_copy(order.book_id)
                .map_err(|e| OrdersRepositoryError::Other(e.to_string()))?;
            tracing::info!("Order {} closed", order_id);
        }
        tables.orders.insert(order_id, order.clone());
        Ok(order)
    }
}
