//! Signed-in user context. Created on login, dropped on logout, never written
//! to disk.

use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::error::{ClaimError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Insurer,
    Hospital,
    Patient,
    Verifier,
}

impl Role {
    /// Login e-mails carry the role as a domain suffix, e.g. `ops@city.htl`.
    pub fn from_email(email: &str) -> Option<Role> {
        let domain = email.trim().rsplit_once('@')?.1.to_ascii_lowercase();
        let suffix = domain.rsplit_once('.').map(|(_, s)| s).unwrap_or(&domain);
        match suffix {
            "admin" => Some(Role::Admin),
            "ins" => Some(Role::Insurer),
            "htl" => Some(Role::Hospital),
            "user" => Some(Role::Patient),
            "ver" => Some(Role::Verifier),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Insurer => "insurer",
            Role::Hospital => "hospital",
            Role::Patient => "patient",
            Role::Verifier => "verifier",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "insurer" => Ok(Role::Insurer),
            "hospital" => Ok(Role::Hospital),
            "patient" => Ok(Role::Patient),
            "verifier" => Ok(Role::Verifier),
            other => Err(ClaimError::validation(format!("unknown role '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    /// Set for hospital staff; scopes claim listings to their hospital.
    pub hospital_id: Option<String>,
}

impl Session {
    pub fn start(user_id: impl Into<String>, email: impl Into<String>, hospital_id: Option<String>) -> Result<Self> {
        let email = email.into();
        let role = Role::from_email(&email)
            .ok_or_else(|| ClaimError::validation(format!("cannot derive a role from '{}'", email)))?;
        if role == Role::Hospital && hospital_id.as_deref().map_or(true, str::is_empty) {
            return Err(ClaimError::validation("Hospital sessions need a hospital id."));
        }

        let session = Self { user_id: user_id.into(), email, role, hospital_id };
        info!(user_id = %session.user_id, role = %session.role, "Session started");
        Ok(session)
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }

    /// Consumes the session.
    pub fn end(self) {
        info!(user_id = %self.user_id, "Session ended");
    }
}
