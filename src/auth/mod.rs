//! Caller identity, credential verification and the authorization gate.

pub mod gate;
pub mod token;

use serde::{Deserialize, Serialize};

pub use gate::{authorize, Decision, Requirement};
pub use token::{TokenError, TokenVerifier};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role { Admin, User }

/// The authenticated caller, rebuilt from the credential on every request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: String,
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}
