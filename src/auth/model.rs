use serde::{Deserialize, Serialize};

use crate::db::DbId;

/// JWT claims carrying the caller's tenant and capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: DbId, // user id
    pub company_id: DbId,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: usize,
    pub iat: usize,
    pub token_type: String, // only "access" is accepted here
}

/// Named capabilities checked by the report endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ViewReports,
    DownloadReports,
    SignReports,
    SendReports,
    SaveInspection,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewReports => "viewReports",
            Permission::DownloadReports => "downloadReports",
            Permission::SignReports => "signReports",
            Permission::SendReports => "sendReports",
            Permission::SaveInspection => "saveInspection",
        }
    }
}

/// Pre-validated identity of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub company_id: DbId,
    pub user_id: DbId,
    pub permissions: Vec<String>,
}

impl AuthContext {
    pub fn new(company_id: DbId, user_id: DbId, permissions: &[Permission]) -> Self {
        Self {
            company_id,
            user_id,
            permissions: permissions.iter().map(|p| p.as_str().to_string()).collect(),
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.iter().any(|p| p == permission.as_str())
    }
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            company_id: claims.company_id,
            user_id: claims.sub,
            permissions: claims.permissions,
        }
    }
}
