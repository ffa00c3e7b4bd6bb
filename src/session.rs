//! Signed-in user and selected location.
//!
//! The identity provider is external; callers hand the signed-in user to
//! [`SessionState::sign_in`]. Workflows never read this state ambiently:
//! they receive a [`SessionContext`] snapshot in their constructor.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::info;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Manager,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Manager => "manager",
            Role::Employee => "employee",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "manager" => Some(Role::Manager),
            "employee" => Some(Role::Employee),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedInUser {
    pub user_id: String,
    pub full_name: String,
    pub role: Role,
    /// Employees belong to exactly one location.
    pub assigned_location_id: Option<String>,
}

/// Explicit context handed to every workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: String,
    pub role: Role,
    pub location_id: String,
}

/// Provider of the session: set on sign-in and location selection, cleared
/// on logout.
#[derive(Default)]
pub struct SessionState {
    user: Mutex<Option<SignedInUser>>,
    location_id: Mutex<Option<String>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user: SignedInUser) -> AppResult<()> {
        let mut guard = self.user.lock().map_err(|e| AppError::Persistence(e.to_string()))?;
        info!(user_id = %user.user_id, role = user.role.as_str(), "Signed in");
        *guard = Some(user);
        drop(guard);
        // A new sign-in never inherits the previous user's location.
        self.clear_location()
    }

    pub fn current_user(&self) -> Option<SignedInUser> {
        self.user.lock().ok().and_then(|g| g.clone())
    }

    pub fn selected_location(&self) -> Option<String> {
        self.location_id.lock().ok().and_then(|g| g.clone())
    }

    /// Employees can only select the location they are assigned to.
    pub fn select_location(&self, location_id: &str) -> AppResult<()> {
        let user = self
            .current_user()
            .ok_or_else(|| AppError::validation("sign in before selecting a location"))?;
        if user.role == Role::Employee
            && user.assigned_location_id.as_deref() != Some(location_id)
        {
            return Err(AppError::validation("employees can only use their assigned location"));
        }
        let mut guard = self
            .location_id
            .lock()
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        *guard = Some(location_id.to_string());
        info!(user_id = %user.user_id, location_id = %location_id, "Location selected");
        Ok(())
    }

    pub fn logout(&self) -> AppResult<()> {
        let mut guard = self.user.lock().map_err(|e| AppError::Persistence(e.to_string()))?;
        if let Some(user) = guard.take() {
            info!(user_id = %user.user_id, "Signed out");
        }
        drop(guard);
        self.clear_location()
    }

    /// Snapshot for a workflow. Requires a signed-in user and a location.
    pub fn context(&self) -> AppResult<SessionContext> {
        let user = self
            .current_user()
            .ok_or_else(|| AppError::validation("not signed in"))?;
        let location_id = self
            .selected_location()
            .ok_or_else(|| AppError::validation("no location selected"))?;
        Ok(SessionContext {
            user_id: user.user_id,
            role: user.role,
            location_id,
        })
    }

    /// Drop the selection if it points at `location_id`.
    pub fn forget_location(&self, location_id: &str) -> AppResult<()> {
        let mut guard = self
            .location_id
            .lock()
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        if guard.as_deref() == Some(location_id) {
            *guard = None;
        }
        Ok(())
    }

    fn clear_location(&self) -> AppResult<()> {
        let mut guard = self
            .location_id
            .lock()
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee() -> SignedInUser {
        SignedInUser {
            user_id: "emp-1".into(),
            full_name: "Lucía".into(),
            role: Role::Employee,
            assigned_location_id: Some("loc-1".into()),
        }
    }

    #[test]
    fn test_context_requires_location() {
        let session = SessionState::new();
        assert!(session.context().is_err());
        session.sign_in(employee()).unwrap();
        assert!(matches!(session.context(), Err(AppError::Validation(_))));
        session.select_location("loc-1").unwrap();
        let ctx = session.context().unwrap();
        assert_eq!(ctx.location_id, "loc-1");
        assert_eq!(ctx.role, Role::Employee);
    }

    #[test]
    fn test_employee_cannot_pick_other_location() {
        let session = SessionState::new();
        session.sign_in(employee()).unwrap();
        assert!(session.select_location("loc-2").is_err());
        assert_eq!(session.selected_location(), None);
    }

    #[test]
    fn test_logout_clears_everything() {
        let session = SessionState::new();
        session
            .sign_in(SignedInUser {
                user_id: "mgr".into(),
                full_name: "Pepe".into(),
                role: Role::Manager,
                assigned_location_id: None,
            })
            .unwrap();
        session.select_location("any").unwrap();
        session.logout().unwrap();
        assert!(session.current_user().is_none());
        assert!(session.selected_location().is_none());
    }
}
