//! Locations ("locales"), their suppliers and their staff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::session::{Role, SessionState};
use crate::store::DirectoryStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: String,
    pub location_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub location_id: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Revoked,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Revoked => "revoked",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(InvitationStatus::Pending),
            "accepted" => Some(InvitationStatus::Accepted),
            "revoked" => Some(InvitationStatus::Revoked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    pub location_id: String,
    pub email: String,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
}

fn required(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Trimmed, lower-cased address with one `@` and a dotted domain.
fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AppError::validation(format!("invalid email address: {}", raw.trim())))
    }
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

pub fn create_location<S: DirectoryStore>(
    store: &S,
    owner_id: &str,
    role: Role,
    name: &str,
) -> AppResult<Location> {
    if role != Role::Manager {
        warn!(user_id = %owner_id, "Employee tried to create a location");
        return Err(AppError::validation("only managers can create locations"));
    }
    let location = Location {
        id: Uuid::new_v4().to_string(),
        name: required(name, "location name")?,
        owner_id: owner_id.to_string(),
        created_at: Utc::now(),
    };
    store.insert_location(&location).map_err(AppError::creation)?;
    info!(location_id = %location.id, owner_id = %owner_id, "Location created");
    Ok(location)
}

pub fn list_locations<S: DirectoryStore>(store: &S, owner_id: &str) -> AppResult<Vec<Location>> {
    Ok(store.list_locations(owner_id)?)
}

/// Removes the location and everything recorded under it. Only the manager
/// who owns it may do so; the session's selection is dropped if it was this
/// location.
pub fn delete_location<S: DirectoryStore>(
    store: &S,
    session: &SessionState,
    location_id: &str,
) -> AppResult<()> {
    let user = session
        .current_user()
        .ok_or_else(|| AppError::validation("not signed in"))?;
    let location = store
        .get_location(location_id)?
        .ok_or_else(|| AppError::not_found(format!("location {location_id}")))?;
    if user.role != Role::Manager || location.owner_id != user.user_id {
        warn!(user_id = %user.user_id, location_id = %location_id, "Rejected location delete by non-owner");
        return Err(AppError::validation("only the owner can delete this location"));
    }
    store.delete_location(location_id).map_err(AppError::persistence)?;
    session.forget_location(location_id)?;
    info!(location_id = %location_id, owner_id = %user.user_id, "Location deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Suppliers
// ---------------------------------------------------------------------------

pub fn add_supplier<S: DirectoryStore>(store: &S, location_id: &str, name: &str) -> AppResult<Supplier> {
    let supplier = Supplier {
        id: Uuid::new_v4().to_string(),
        location_id: location_id.to_string(),
        name: required(name, "supplier name")?,
    };
    store.insert_supplier(&supplier).map_err(AppError::creation)?;
    info!(supplier_id = %supplier.id, location_id = %location_id, "Supplier added");
    Ok(supplier)
}

pub fn list_suppliers<S: DirectoryStore>(store: &S, location_id: &str) -> AppResult<Vec<Supplier>> {
    Ok(store.list_suppliers(location_id)?)
}

pub fn delete_supplier<S: DirectoryStore>(store: &S, supplier_id: &str) -> AppResult<()> {
    store
        .get_supplier(supplier_id)?
        .ok_or_else(|| AppError::not_found(format!("supplier {supplier_id}")))?;
    store.delete_supplier(supplier_id).map_err(AppError::persistence)?;
    info!(supplier_id = %supplier_id, "Supplier deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Staff
// ---------------------------------------------------------------------------

pub fn invite_employee<S: DirectoryStore>(
    store: &S,
    location_id: &str,
    email: &str,
) -> AppResult<Invitation> {
    let email = normalize_email(email)?;
    store
        .get_location(location_id)?
        .ok_or_else(|| AppError::not_found(format!("location {location_id}")))?;

    let pending = store.list_invitations(location_id, InvitationStatus::Pending)?;
    if pending.iter().any(|i| i.email == email) {
        return Err(AppError::validation(format!("{email} already has a pending invitation")));
    }
    if store.list_employees(location_id)?.iter().any(|e| e.email == email) {
        return Err(AppError::validation(format!("{email} already works at this location")));
    }

    let invitation = Invitation {
        id: Uuid::new_v4().to_string(),
        location_id: location_id.to_string(),
        email,
        status: InvitationStatus::Pending,
        created_at: Utc::now(),
    };
    store.insert_invitation(&invitation).map_err(AppError::creation)?;
    info!(invitation_id = %invitation.id, location_id = %location_id, "Employee invited");
    Ok(invitation)
}

fn pending_invitation<S: DirectoryStore>(store: &S, invitation_id: &str) -> AppResult<Invitation> {
    let invitation = store
        .get_invitation(invitation_id)?
        .ok_or_else(|| AppError::not_found(format!("invitation {invitation_id}")))?;
    if invitation.status != InvitationStatus::Pending {
        return Err(AppError::validation(format!(
            "invitation is already {}",
            invitation.status.as_str()
        )));
    }
    Ok(invitation)
}

/// Registers the invited user as an employee of the inviting location.
pub fn accept_invitation<S: DirectoryStore>(
    store: &S,
    invitation_id: &str,
    user_id: &str,
    full_name: &str,
) -> AppResult<Employee> {
    let invitation = pending_invitation(store, invitation_id)?;
    let employee = Employee {
        id: user_id.to_string(),
        location_id: invitation.location_id.clone(),
        full_name: required(full_name, "full name")?,
        email: invitation.email.clone(),
        role: Role::Employee,
    };
    store
        .accept_invitation(invitation_id, &employee)
        .map_err(AppError::creation)?;
    info!(invitation_id = %invitation_id, employee_id = %employee.id, "Invitation accepted");
    Ok(employee)
}

pub fn revoke_invitation<S: DirectoryStore>(store: &S, invitation_id: &str) -> AppResult<()> {
    pending_invitation(store, invitation_id)?;
    store
        .set_invitation_status(invitation_id, InvitationStatus::Revoked)
        .map_err(AppError::update)?;
    info!(invitation_id = %invitation_id, "Invitation revoked");
    Ok(())
}

pub fn list_employees<S: DirectoryStore>(store: &S, location_id: &str) -> AppResult<Vec<Employee>> {
    Ok(store.list_employees(location_id)?)
}

pub fn list_pending_invitations<S: DirectoryStore>(
    store: &S,
    location_id: &str,
) -> AppResult<Vec<Invitation>> {
    Ok(store.list_invitations(location_id, InvitationStatus::Pending)?)
}

/// Revokes the employee's access. Shifts they recorded stay in history.
pub fn remove_employee<S: DirectoryStore>(store: &S, employee_id: &str) -> AppResult<()> {
    store
        .get_employee(employee_id)?
        .ok_or_else(|| AppError::not_found(format!("employee {employee_id}")))?;
    store.delete_employee(employee_id).map_err(AppError::persistence)?;
    info!(employee_id = %employee_id, "Employee removed");
    Ok(())
}
