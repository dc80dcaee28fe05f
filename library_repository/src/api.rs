use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i32;
pub type AuthorId = i32;
pub type BookId = i32;
pub type OrderId = i32;

pub const DEFAULT_BOOK_COUNT: i32 = 10;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(from = "i32", into = "i32")]
pub enum Role {
    #[default]
    Visitor,
    Admin,
}

impl Role {
    pub fn code(self) -> i32 {
        match self {
            Role::Visitor => 0,
            Role::Admin => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::Visitor => "visitor",
            Role::Admin => "admin",
        }
    }
}

/// Only `1` means admin, every other code reads back as visitor
impl From<i32> for Role {
    fn from(code: i32) -> Self {
        if code == 1 {
            Role::Admin
        } else {
            Role::Visitor
        }
    }
}

impl From<Role> for i32 {
    fn from(role: Role) -> Self {
        role.code()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
/// Stored user account
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role_name(&self) -> &'static str {
        self.role.name()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
/// Fields required to register a new user
pub struct UserDetails {
    pub email: String,
    pub password: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
/// Partial update of a user. Only listed fields can be changed after creation,
/// `middle_name: Some(None)` clears the middle name
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
    pub surname: String,
    pub patronymic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct AuthorDetails {
    pub name: String,
    pub surname: String,
    pub patronymic: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct AuthorPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patronymic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
/// Stored book together with the number of copies available to loan
pub struct Book {
    pub id: BookId,
    pub name: String,
    pub description: String,
    pub count: i32,
    pub authors: BTreeSet<AuthorId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
/// Struct representing details of a new book. `count` defaults to 10 copies
pub struct BookDetails {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub count: Option<i32>,
    #[serde(default)]
    pub authors: Vec<AuthorId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
/// Struct representing a patch to book details. Authors are changed through
/// `add_authors`/`remove_authors` only
pub struct BookPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
/// Loan of a single copy of a book. `end_at == None` means the copy is still checked out
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub created_at: DateTime<Utc>,
    pub plated_end_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_outstanding(&self) -> bool {
        self.end_at.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
/// Setting `end_at` on an outstanding order closes it
pub struct OrderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plated_end_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
}
