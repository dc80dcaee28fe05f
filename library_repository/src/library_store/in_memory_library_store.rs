use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use itertools::Itertools;

use crate::api::{Author, AuthorId, Book, BookId, Order, OrderId, User, UserId};

/// All tables live behind one lock so that writes spanning several records are atomic
#[derive(Default)]
pub(crate) struct Tables {
    pub(crate) users: HashMap<UserId, User>,
    pub(crate) authors: HashMap<AuthorId, Author>,
    pub(crate) books: HashMap<BookId, Book>,
    pub(crate) orders: HashMap<OrderId, Order>,
}

/// A returned copy would push the book count past `i32::MAX`
#[derive(Debug, thiserror::Error)]
#[error("Book {book_id} cannot take back {copies} copies, count is {count}")]
pub(crate) struct StockOverflow {
    pub(crate) book_id: BookId,
    pub(crate) count: i32,
    pub(crate) copies: usize,
}

impl Tables {
    fn check_returns(
        &self,
        book_ids: impl Iterator<Item = BookId>,
    ) -> Result<(), StockOverflow> {
        for (book_id, copies) in book_ids.counts() {
            let Some(book) = self.books.get(&book_id) else {
                continue;
            };
            let fits = i32::try_from(copies)
                .ok()
                .and_then(|copies| book.count.checked_add(copies))
                .is_some();
            if !fits {
                tracing::warn!("Book {} count {} overflows on return", book_id, book.count);
                return Err(StockOverflow {
                    book_id,
                    count: book.count,
                    copies,
                });
            }
        }
        Ok(())
    }

    /// Leaves the count untouched when it cannot grow
    pub(crate) fn return_copy(&mut self, book_id: BookId) -> Result<(), StockOverflow> {
        self.check_returns(std::iter::once(book_id))?;
        if let Some(book) = self.books.get_mut(&book_id) {
            book.count += 1;
        }
        Ok(())
    }

    pub(crate) fn missing_author(&self, author_ids: &[AuthorId]) -> Option<AuthorId> {
        author_ids
            .iter()
            .copied()
            .find(|author_id| !self.authors.contains_key(author_id))
    }

    /// Outstanding orders give their copy back before they are removed
    pub(crate) fn remove_order(
        &mut self,
        order_id: OrderId,
    ) -> Result<Option<Order>, StockOverflow> {
        let Some(order) = self.orders.get(&order_id) else {
            return Ok(None);
        };
        let (book_id, outstanding) = (order.book_id, order.is_outstanding());
        if outstanding {
            self.return_copy(book_id)?;
        }
        Ok(self.orders.remove(&order_id))
    }

    /// Either every matching order is removed or none is
    pub(crate) fn remove_orders_where(
        &mut self,
        predicate: impl Fn(&Order) -> bool,
    ) -> Result<usize, StockOverflow> {
        let orders: Vec<&Order> = self.orders.values().filter(|order| predicate(order)).collect();
        self.check_returns(
            orders
                .iter()
                .filter(|order| order.is_outstanding())
                .map(|order| order.book_id),
        )?;
        let order_ids: Vec<OrderId> = orders.iter().map(|order| order.id).collect();
        for order_id in order_ids.iter() {
            self.remove_order(*order_id)?;
        }
        Ok(order_ids.len())
    }
}

pub struct InMemoryLibraryStore {
    pub(crate) tables: parking_lot::RwLock<Tables>,
    user_sequence_generator: AtomicI32,
    author_sequence_generator: AtomicI32,
    book_sequence_generator: AtomicI32,
    order_sequence_generator: AtomicI32,
}

impl Default for InMemoryLibraryStore {
    fn default() -> Self {
        Self {
            tables: Default::default(),
            user_sequence_generator: Default::default(),
            author_sequence_generator: Default::default(),
            book_sequence_generator: Default::default(),
            order_sequence_generator: Default::default(),
        }
    }
}

// Ids start at 1 like a SERIAL column
fn next_id(generator: &AtomicI32) -> i32 {
    generator.fetch_add(1, Ordering::Relaxed) + 1
}

impl InMemoryLibraryStore {
    pub(crate) fn next_user_id(&self) -> UserId {
        next_id(&self.user_sequence_generator)
    }

    pub(crate) fn next_author_id(&self) -> AuthorId {
        next_id(&self.author_sequence_generator)
    }

    pub(crate) fn next_book_id(&self) -> BookId {
        next_id(&self.book_sequence_generator)
    }

    pub(crate) fn next_order_id(&self) -> OrderId {
        next_id(&self.order_sequence_generator)
    }
}
