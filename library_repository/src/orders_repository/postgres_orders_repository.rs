use chrono::{DateTime, Utc};
use tokio_postgres::{Row, Transaction};

use crate::api::{Book, BookId, Order, OrderId, OrderPatch, UserId};
use crate::library_store::PostgresLibraryStore;
use crate::orders_repository::{
    can_lend, OrderRejection, OrdersRepository, OrdersRepositoryError,
};

const ORDER_COLUMNS: &str = "id, user_id, book_id, created_at, plated_end_at, end_at";

fn row_to_order(row: &Row) -> Result<Order, OrdersRepositoryError> {
    Ok(Order {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        book_id: row.try_get("book_id")?,
        created_at: row.try_get("created_at")?,
        plated_end_at: row.try_get("plated_end_at")?,
        end_at: row.try_get("end_at")?,
    })
}

async fn lock_order(
    transaction: &Transaction<'_>,
    order_id: OrderId,
) -> Result<Order, OrdersRepositoryError> {
    let row = transaction
        .query_opt(
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"),
            &[&order_id],
        )
        .await?
        .ok_or(OrdersRepositoryError::NotFound(order_id))?;
    row_to_order(&row)
}

async fn return_copy(
    transaction: &Transaction<'_>,
    book_id: BookId,
) -> Result<(), OrdersRepositoryError> {
    transaction
        .execute(
            "UPDATE books SET count = count + 1 WHERE id = $1",
            &[&book_id],
        )
        .await?;
    Ok(())
}

/// Writes `end_at` and `plated_end_at` of an already locked order, returning the
/// copy when the order goes from outstanding to closed
async fn store_order_change(
    transaction: &Transaction<'_>,
    was_outstanding: bool,
    order: &Order,
) -> Result<Order, OrdersRepositoryError> {
    let row = transaction
        .query_one(
            &format!(
                "UPDATE orders SET plated_end_at = $2, end_at = $3 WHERE id = $1 \
                 RETURNING {ORDER_COLUMNS}"
            ),
            &[&order.id, &order.plated_end_at, &order.end_at],
        )
        .await?;
    if was_outstanding && !order.is_outstanding() {
        return_copy(transaction, order.book_id).await?;
        tracing::info!("Order {} closed", order.id);
    }
    row_to_order(&row)
}

#[async_trait::async_trait]
impl OrdersRepository for PostgresLibraryStore {
    async fn create_order(
        &self,
        user_id: UserId,
        book: &mut Book,
        plated_end_at: DateTime<Utc>,
    ) -> Result<Order, OrdersRepositoryError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;

        // Lock the user so it cannot be deleted before the order references it
        let user_row = transaction
            .query_opt("SELECT id FROM users WHERE id = $1 FOR SHARE", &[&user_id])
            .await?;
        if user_row.is_none() {
            tracing::warn!("Order for book {} rejected, unknown user {}", book.id, user_id);
            return Err(OrderRejection::UnknownUser(user_id).into());
        }

        // The row lock serializes concurrent orders between reading and decrementing count
        let count: i32 = transaction
            .query_opt("SELECT count FROM books WHERE id = $1 FOR UPDATE", &[&book.id])
            .await?
            .ok_or(OrderRejection::UnknownBook(book.id))?
            .try_get(0)?;
        if !can_lend(count) {
            tracing::warn!(
                "Order for book {} rejected, only {} copies left",
                book.id,
                count
            );
            return Err(OrderRejection::InsufficientStock {
                book_id: book.id,
                count,
            }
            .into());
        }

        let order_row = transaction
            .query_one(
                &format!(
                    "INSERT INTO orders (user_id, book_id, plated_end_at) VALUES ($1, $2, $3) \
                     RETURNING {ORDER_COLUMNS}"
                ),
                &[&user_id, &book.id, &plated_end_at],
            )
            .await?;
        let remaining: i32 = transaction
            .query_one(
                "UPDATE books SET count = count - 1 WHERE id = $1 RETURNING count",
                &[&book.id],
            )
            .await?
            .try_get(0)?;
        let order = row_to_order(&order_row)?;

        transaction.commit().await?;
        book.count = remaining;
        tracing::info!(
            "Order {} created for user {}, book {} has {} copies left",
            order.id,
            user_id,
            book.id,
            remaining
        );
        Ok(order)
    }

    async fn close_order(
        &self,
        order_id: OrderId,
        end_at: DateTime<Utc>,
    ) -> Result<Order, OrdersRepositoryError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;

        let mut order = lock_order(&transaction, order_id).await?;
        if !order.is_outstanding() {
            return Err(OrderRejection::AlreadyClosed(order_id).into());
        }
        order.end_at = Some(end_at);

        let order = store_order_change(&transaction, true, &order).await?;
        transaction.commit().await?;
        Ok(order)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Order, OrdersRepositoryError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"),
                &[&order_id],
            )
            .await?
            .ok_or(OrdersRepositoryError::NotFound(order_id))?;
        row_to_order(&row)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, OrdersRepositoryError> {
        let client = self.client.lock().await;
        let rows = client
            .query(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY id"), &[])
            .await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn list_outstanding_orders(&self) -> Result<Vec<Order>, OrdersRepositoryError> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE end_at IS NULL ORDER BY id"),
                &[],
            )
            .await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<bool, OrdersRepositoryError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;

        let order = match lock_order(&transaction, order_id).await {
            Ok(order) => order,
            Err(OrdersRepositoryError::NotFound(_)) => return Ok(false),
            Err(err) => return Err(err),
        };
        transaction
            .execute("DELETE FROM orders WHERE id = $1", &[&order_id])
            .await?;
        if order.is_outstanding() {
            return_copy(&transaction, order.book_id).await?;
        }

        transaction.commit().await?;
        Ok(true)
    }

    async fn update_order(
        &self,
        order_id: OrderId,
        patch: OrderPatch,
    ) -> Result<Order, OrdersRepositoryError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;

        let mut order = lock_order(&transaction, order_id).await?;
        let was_outstanding = order.is_outstanding();
        patch.apply_to(&mut order);

        let order = store_order_change(&transaction, was_outstanding, &order).await?;
        transaction.commit().await?;
        Ok(order)
    }
}
