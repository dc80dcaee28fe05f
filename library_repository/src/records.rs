use std::fmt;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde_json::{json, Value};

use crate::api::{Author, Book, BookId, Order, User, UserId};

const ORDER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// External representation of a stored entity as a field name to value mapping
pub trait ToRecord {
    fn to_record(&self) -> Value;
}

/// Renders as `YYYY-MM-DD HH:MM:SS+HH:MM`
pub fn format_order_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(ORDER_TIMESTAMP_FORMAT).to_string()
}

/// Short reference to a user as it appears inside order records
pub fn user_reference(user_id: UserId) -> String {
    format!("CustomUser(id={user_id})")
}

pub fn book_reference(book_id: BookId) -> String {
    format!("Book(id={book_id})")
}

const USER_FIELDS: &[&str] = &[
    "id",
    "first_name",
    "middle_name",
    "last_name",
    "email",
    "created_at",
    "updated_at",
    "role",
    "is_active",
];
const AUTHOR_FIELDS: &[&str] = &["id", "name", "surname", "patronymic"];
const BOOK_FIELDS: &[&str] = &["id", "name", "description", "count", "authors"];
const ORDER_FIELDS: &[&str] = &["id", "user", "book", "created_at", "end_at", "plated_end_at"];

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(text) => {
            format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
        }
        Value::Array(items) => format!("[{}]", items.iter().map(render_value).join(", ")),
        other => other.to_string(),
    }
}

/// `'key': value` pairs in the given key order. References listed in `bare` are written unquoted
fn write_fields(
    f: &mut fmt::Formatter<'_>,
    record: &Value,
    keys: &[&str],
    bare: &[&str],
) -> fmt::Result {
    let mut rendered = keys.iter().map(|key| {
        let value = &record[*key];
        match value {
            Value::String(reference) if bare.contains(key) => format!("'{key}': {reference}"),
            _ => format!("'{key}': {}", render_value(value)),
        }
    });
    f.write_str(&rendered.join(", "))
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fields(f, &self.to_record(), USER_FIELDS, &[])
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fields(f, &self.to_record(), AUTHOR_FIELDS, &[])
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fields(f, &self.to_record(), BOOK_FIELDS, &[])
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fields(f, &self.to_record(), ORDER_FIELDS, &["user", "book"])
    }
}

impl ToRecord for User {
    /// Password is never part of the record, timestamps are epoch seconds
    fn to_record(&self) -> Value {
        json!({
            "id": self.id,
            "first_name": self.first_name,
            "middle_name": self.middle_name,
            "last_name": self.last_name,
            "email": self.email,
            "created_at": self.created_at.timestamp(),
            "updated_at": self.updated_at.timestamp(),
            "role": self.role.code(),
            "is_active": self.is_active,
        })
    }
}

impl ToRecord for Author {
    fn to_record(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "surname": self.surname,
            "patronymic": self.patronymic,
        })
    }
}

impl ToRecord for Book {
    fn to_record(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "description": self.description,
            "count": self.count,
            "authors": self.authors,
        })
    }
}

impl ToRecord for Order {
    fn to_record(&self) -> Value {
        json!({
            "id": self.id,
            "user": user_reference(self.user_id),
            "book": book_reference(self.book_id),
            "created_at": format_order_timestamp(&self.created_at),
            "end_at": self.end_at.as_ref().map(format_order_timestamp),
            "plated_end_at": format_order_timestamp(&self.plated_end_at),
        })
    }
}
