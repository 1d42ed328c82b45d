use actix_web::{FromRequest, HttpRequest, dev::Payload};
use std::future::{Ready, ready};

use crate::database::models::{ADMIN_ROLE, EMPLOYEE_ROLE};
use crate::error::AppError;
use crate::services::auth::Claims;

/// The authenticated caller, taken from the bearer token.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: i64,
    pub roles: Vec<String>,
}

impl From<Claims> for UserContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            roles: claims.roles,
        }
    }
}

impl UserContext {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    pub fn is_employee(&self) -> bool {
        self.has_role(EMPLOYEE_ROLE)
    }

    pub fn requires_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("admin role required".to_string()))
        }
    }

    pub fn requires_employee(&self) -> Result<(), AppError> {
        if self.is_employee() {
            Ok(())
        } else {
            Err(AppError::Forbidden("employee role required".to_string()))
        }
    }
}

impl FromRequest for UserContext {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        ready(
            Claims::from_request(req, payload)
                .into_inner()
                .map(UserContext::from),
        )
    }
}
