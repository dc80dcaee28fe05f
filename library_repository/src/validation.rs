//! Field rules shared by every repository.
//!
//! Creation validates the whole input and aborts on the first failing rule.
//! Patches are applied field by field: a field that fails its rule is skipped
//! and the remaining fields still apply.

use validator::ValidateEmail;

use crate::api::{
    Author, AuthorDetails, AuthorPatch, Book, BookDetails, BookPatch, Order, OrderPatch, User,
    UserDetails, UserPatch,
};

pub const USER_NAME_MAX_LENGTH: usize = 20;
pub const PASSWORD_MAX_LENGTH: usize = 128;
pub const AUTHOR_NAME_MAX_LENGTH: usize = 10;
pub const AUTHOR_SURNAME_MAX_LENGTH: usize = 20;
pub const AUTHOR_PATRONYMIC_MAX_LENGTH: usize = 20;
pub const BOOK_NAME_MAX_LENGTH: usize = 128;

#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum ValidationError {
    #[error("Field {field} is longer than {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("Invalid email address {0}")]
    InvalidEmail(String),

    #[error("Field {field} must not be negative")]
    Negative { field: &'static str },
}

pub fn valid_email(value: &str) -> bool {
    value.validate_email()
}

/// Length is counted in characters, an absent value always fits
pub fn within_length(value: Option<&str>, max: usize) -> bool {
    value.map_or(true, |value| value.chars().count() <= max)
}

pub fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if within_length(Some(value), max) {
        Ok(())
    } else {
        Err(ValidationError::TooLong { field, max })
    }
}

pub fn check_email(value: &str) -> Result<(), ValidationError> {
    if valid_email(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(value.to_string()))
    }
}

pub fn check_not_negative(field: &'static str, value: i32) -> Result<(), ValidationError> {
    if value >= 0 {
        Ok(())
    } else {
        Err(ValidationError::Negative { field })
    }
}

/// Collects names of patch fields that were skipped
#[derive(Debug, Default)]
struct PatchOutcome {
    skipped: Vec<&'static str>,
}

impl PatchOutcome {
    fn apply<T>(
        &mut self,
        field: &'static str,
        value: Option<T>,
        rule: impl FnOnce(&T) -> Result<(), ValidationError>,
        target: &mut T,
    ) {
        let Some(value) = value else {
            return;
        };
        match rule(&value) {
            Ok(()) => *target = value,
            Err(err) => {
                tracing::debug!("Skipping field {}: {}", field, err);
                self.skipped.push(field);
            }
        }
    }
}

impl UserDetails {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_length("first_name", &self.first_name, USER_NAME_MAX_LENGTH)?;
        check_length("last_name", &self.last_name, USER_NAME_MAX_LENGTH)?;
        if let Some(middle_name) = &self.middle_name {
            check_length("middle_name", middle_name, USER_NAME_MAX_LENGTH)?;
        }
        check_email(&self.email)?;
        check_length("password", &self.password, PASSWORD_MAX_LENGTH)
    }
}

impl UserPatch {
    /// Applies the valid fields to `user`, returns the names of skipped fields
    pub fn apply_to(self, user: &mut User) -> Vec<&'static str> {
        let mut outcome = PatchOutcome::default();
        outcome.apply("email", self.email, |v| check_email(v), &mut user.email);
        outcome.apply(
            "password",
            self.password,
            |v| check_length("password", v, PASSWORD_MAX_LENGTH),
            &mut user.password,
        );
        outcome.apply(
            "first_name",
            self.first_name,
            |v| check_length("first_name", v, USER_NAME_MAX_LENGTH),
            &mut user.first_name,
        );
        outcome.apply(
            "middle_name",
            self.middle_name,
            |v| match v {
                Some(v) => check_length("middle_name", v, USER_NAME_MAX_LENGTH),
                None => Ok(()),
            },
            &mut user.middle_name,
        );
        outcome.apply(
            "last_name",
            self.last_name,
            |v| check_length("last_name", v, USER_NAME_MAX_LENGTH),
            &mut user.last_name,
        );
        outcome.apply("role", self.role, |_| Ok(()), &mut user.role);
        outcome.apply("is_active", self.is_active, |_| Ok(()), &mut user.is_active);
        outcome.skipped
    }
}

impl AuthorDetails {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_length("name", &self.name, AUTHOR_NAME_MAX_LENGTH)?;
        check_length("surname", &self.surname, AUTHOR_SURNAME_MAX_LENGTH)?;
        check_length("patronymic", &self.patronymic, AUTHOR_PATRONYMIC_MAX_LENGTH)
    }
}

impl AuthorPatch {
    pub fn apply_to(self, author: &mut Author) -> Vec<&'static str> {
        let mut outcome = PatchOutcome::default();
        outcome.apply(
            "name",
            self.name,
            |v| check_length("name", v, AUTHOR_NAME_MAX_LENGTH),
            &mut author.name,
        );
        outcome.apply(
            "surname",
            self.surname,
            |v| check_length("surname", v, AUTHOR_SURNAME_MAX_LENGTH),
            &mut author.surname,
        );
        outcome.apply(
            "patronymic",
            self.patronymic,
            |v| check_length("patronymic", v, AUTHOR_PATRONYMIC_MAX_LENGTH),
            &mut author.patronymic,
        );
        outcome.skipped
    }
}

impl BookDetails {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_length("name", &self.name, BOOK_NAME_MAX_LENGTH)?;
        if let Some(count) = self.count {
            check_not_negative("count", count)?;
        }
        Ok(())
    }
}

impl BookPatch {
    pub fn apply_to(self, book: &mut Book) -> Vec<&'static str> {
        let mut outcome = PatchOutcome::default();
        outcome.apply(
            "name",
            self.name,
            |v| check_length("name", v, BOOK_NAME_MAX_LENGTH),
            &mut book.name,
        );
        outcome.apply("description", self.description, |_| Ok(()), &mut book.description);
        outcome.apply(
            "count",
            self.count,
            |v| check_not_negative("count", *v),
            &mut book.count,
        );
        outcome.skipped
    }
}

impl OrderPatch {
    /// `end_at` only applies to an outstanding order, a closed one stays closed
    pub fn apply_to(self, order: &mut Order) -> Vec<&'static str> {
        let mut outcome = PatchOutcome::default();
        outcome.apply(
            "plated_end_at",
            self.plated_end_at,
            |_| Ok(()),
            &mut order.plated_end_at,
        );
        if let Some(end_at) = self.end_at {
            if order.is_outstanding() {
                order.end_at = Some(end_at);
            } else {
                tracing::debug!("Skipping field end_at: order {} already closed", order.id);
                outcome.skipped.push("end_at");
            }
        }
        outcome.skipped
    }
}

#[cfg(test)]
mod validation_tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn user() -> User {
        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        User {
            id: 1,
            email: "reader@example.com".to_string(),
            password: "secret".to_string(),
            first_name: "Anna".to_string(),
            middle_name: None,
            last_name: "Karenina".to_string(),
            role: Default::default(),
            is_active: false,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_email_rules() {
        assert!(valid_email("reader@example.com"));
        assert!(!valid_email("reader.example.com"));
        assert!(!valid_email("reader@"));
        assert!(!valid_email(""));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        assert!(within_length(None, 0));
        assert!(within_length(Some(&"ж".repeat(20)), 20));
        assert!(!within_length(Some(&"ж".repeat(21)), 20));
        assert_eq!(
            check_length("name", "abcdefghijk", AUTHOR_NAME_MAX_LENGTH),
            Err(ValidationError::TooLong {
                field: "name",
                max: AUTHOR_NAME_MAX_LENGTH
            })
        );
    }

    #[test]
    fn test_user_details_first_failure_wins() {
        let details = UserDetails {
            email: "not an email".to_string(),
            password: "secret".to_string(),
            first_name: "x".repeat(21),
            middle_name: None,
            last_name: "Karenina".to_string(),
        };
        assert_eq!(
            details.validate(),
            Err(ValidationError::TooLong {
                field: "first_name",
                max: USER_NAME_MAX_LENGTH
            })
        );

        let details = UserDetails {
            first_name: "Anna".to_string(),
            middle_name: Some("y".repeat(21)),
            ..details
        };
        assert!(matches!(
            details.validate(),
            Err(ValidationError::TooLong {
                field: "middle_name",
                ..
            })
        ));

        let details = UserDetails {
            middle_name: None,
            ..details
        };
        assert!(matches!(
            details.validate(),
            Err(ValidationError::InvalidEmail(..))
        ));
    }

    #[test]
    fn test_user_patch_skips_only_invalid_fields() {
        let mut user = user();
        let skipped = UserPatch {
            email: Some("broken".to_string()),
            first_name: Some("x".repeat(21)),
            last_name: Some("Arkadyevna".to_string()),
            middle_name: Some(Some("Mid".to_string())),
            is_active: Some(true),
            ..Default::default()
        }
        .apply_to(&mut user);

        assert_eq!(skipped, vec!["email", "first_name"]);
        assert_eq!(user.email, "reader@example.com");
        assert_eq!(user.first_name, "Anna");
        assert_eq!(user.last_name, "Arkadyevna");
        assert_eq!(user.middle_name.as_deref(), Some("Mid"));
        assert!(user.is_active);

        let skipped = UserPatch {
            middle_name: Some(None),
            ..Default::default()
        }
        .apply_to(&mut user);
        assert!(skipped.is_empty());
        assert_eq!(user.middle_name, None);
    }

    #[test]
    fn test_book_patch_rejects_negative_count() {
        let mut book = Book {
            id: 1,
            name: "Dune".to_string(),
            description: "Spice".to_string(),
            count: 3,
            authors: Default::default(),
        };
        let skipped = BookPatch {
            name: Some("n".repeat(129)),
            description: Some("Arrakis".to_string()),
            count: Some(-1),
        }
        .apply_to(&mut book);

        assert_eq!(skipped, vec!["name", "count"]);
        assert_eq!(book.name, "Dune");
        assert_eq!(book.description, "Arrakis");
        assert_eq!(book.count, 3);
    }

    #[test]
    fn test_order_patch_does_not_reopen_or_move_closed_order() {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let first_end = Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap();
        let second_end = Utc.with_ymd_and_hms(2024, 3, 6, 9, 0, 0).unwrap();
        let mut order = Order {
            id: 7,
            user_id: 1,
            book_id: 2,
            created_at,
            plated_end_at: created_at,
            end_at: None,
        };

        let skipped = OrderPatch {
            end_at: Some(first_end),
            ..Default::default()
        }
        .apply_to(&mut order);
        assert!(skipped.is_empty());
        assert_eq!(order.end_at, Some(first_end));

        let skipped = OrderPatch {
            plated_end_at: Some(second_end),
            end_at: Some(second_end),
        }
        .apply_to(&mut order);
        assert_eq!(skipped, vec!["end_at"]);
        assert_eq!(order.end_at, Some(first_end));
        assert_eq!(order.plated_end_at, second_end);
    }
}
