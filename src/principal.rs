//! A minimal principal type for hosts that don't bring their own.
//!
//! The backend only ever asks one question of a principal: which
//! user-type column of the matrix applies. Hosts with richer user models
//! implement [`UserTyped`] (or hand the backend a closure) instead of
//! using [`Principal`].

use uuid::Uuid;

/// The seam between the host's user model and the matrix's user-type
/// columns. Returning `None` (or an empty string) means "no user type",
/// which the backend answers with an unconditional deny.
pub trait UserTyped {
    fn user_type(&self) -> Option<&str>;
}

/// Ready-made principal: an id plus the resolved user type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub user_type: Option<String>,
}

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            user_type: None,
        }
    }

    pub fn with_user_type(mut self, user_type: impl Into<String>) -> Self {
        self.user_type = Some(user_type.into());
        self
    }
}

impl UserTyped for Principal {
    fn user_type(&self) -> Option<&str> {
        self.user_type.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_exposes_its_user_type() {
        let anonymous = Principal::new(Uuid::new_v4());
        assert_eq!(anonymous.user_type(), None);

        let admin = Principal::new(Uuid::new_v4()).with_user_type("admin");
        assert_eq!(admin.user_type(), Some("admin"));
    }
}
