use sqlx::PgConnection;

use crate::database::models::AssignmentMode;
use crate::database::repositories::{company as company_repo, employee as employee_repo};
use crate::error::AppError;
use crate::services::lifecycle::dedup_ids;

/// Identity lookups the staffing flows depend on.
#[allow(async_fn_in_trait)]
pub trait Directory {
    async fn has_role(&mut self, user_id: i64, role: &str) -> Result<bool, AppError>;
    async fn is_active_employee(&mut self, user_id: i64) -> Result<bool, AppError>;
    async fn active_employee_ids(&mut self) -> Result<Vec<i64>, AppError>;
    /// The active employees among `user_ids`, in the given order.
    async fn filter_active_employees(&mut self, user_ids: &[i64]) -> Result<Vec<i64>, AppError>;
    async fn company_contact_ids(&mut self, company_id: i64) -> Result<Vec<i64>, AppError>;
}

pub struct PgDirectory<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgDirectory<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

impl Directory for PgDirectory<'_> {
    async fn has_role(&mut self, user_id: i64, role: &str) -> Result<bool, AppError> {
        Ok(employee_repo::has_role(self.conn, user_id, role).await?)
    }

    async fn is_active_employee(&mut self, user_id: i64) -> Result<bool, AppError> {
        Ok(employee_repo::is_active_employee(self.conn, user_id).await?)
    }

    async fn active_employee_ids(&mut self) -> Result<Vec<i64>, AppError> {
        Ok(employee_repo::active_employee_ids(self.conn).await?)
    }

    async fn filter_active_employees(&mut self, user_ids: &[i64]) -> Result<Vec<i64>, AppError> {
        Ok(employee_repo::filter_active_employees(self.conn, user_ids).await?)
    }

    async fn company_contact_ids(&mut self, company_id: i64) -> Result<Vec<i64>, AppError> {
        Ok(company_repo::contact_user_ids(self.conn, company_id).await?)
    }
}

pub async fn ensure_active_employee<D: Directory>(
    directory: &mut D,
    user_id: i64,
) -> Result<(), AppError> {
    if directory.is_active_employee(user_id).await? {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "user {} is not an active employee",
            user_id
        )))
    }
}

/// Who a request goes to. First-come-first-served bookings fall back to
/// every active employee when no ids are given; specific bookings need ids.
pub async fn resolve_request_targets<D: Directory>(
    directory: &mut D,
    mode: AssignmentMode,
    employee_user_ids: &[i64],
) -> Result<Vec<i64>, AppError> {
    let requested = dedup_ids(employee_user_ids);
    if !requested.is_empty() {
        return directory.filter_active_employees(&requested).await;
    }

    match mode {
        AssignmentMode::SpecificEmployees => Err(AppError::BadRequest(
            "employee_ids is required for specific_employees bookings".to_string(),
        )),
        AssignmentMode::FirstComeFirstServed => directory.active_employee_ids().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::EMPLOYEE_ROLE;
    use pretty_assertions::assert_eq;

    struct StubDirectory {
        active: Vec<i64>,
    }

    impl Directory for StubDirectory {
        async fn has_role(&mut self, user_id: i64, role: &str) -> Result<bool, AppError> {
            Ok(role == EMPLOYEE_ROLE && self.active.contains(&user_id))
        }

        async fn is_active_employee(&mut self, user_id: i64) -> Result<bool, AppError> {
            Ok(self.active.contains(&user_id))
        }

        async fn active_employee_ids(&mut self) -> Result<Vec<i64>, AppError> {
            Ok(self.active.clone())
        }

        async fn filter_active_employees(&mut self, user_ids: &[i64]) -> Result<Vec<i64>, AppError> {
            Ok(user_ids
                .iter()
                .copied()
                .filter(|id| self.active.contains(id))
                .collect())
        }

        async fn company_contact_ids(&mut self, _company_id: i64) -> Result<Vec<i64>, AppError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn explicit_targets_are_filtered_to_active_employees() {
        let mut directory = StubDirectory { active: vec![1, 2, 3] };

        let targets = resolve_request_targets(
            &mut directory,
            AssignmentMode::SpecificEmployees,
            &[3, 9, 1, 3],
        )
        .await
        .unwrap();

        assert_eq!(targets, vec![3, 1]);
    }

    #[tokio::test]
    async fn empty_targets_depend_on_the_assignment_mode() {
        let mut directory = StubDirectory { active: vec![1, 2] };

        let everyone =
            resolve_request_targets(&mut directory, AssignmentMode::FirstComeFirstServed, &[])
                .await
                .unwrap();
        assert_eq!(everyone, vec![1, 2]);

        let missing =
            resolve_request_targets(&mut directory, AssignmentMode::SpecificEmployees, &[]).await;
        assert!(matches!(missing, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn inactive_employees_cannot_be_added() {
        let mut directory = StubDirectory { active: vec![1] };

        assert!(ensure_active_employee(&mut directory, 1).await.is_ok());
        assert!(matches!(
            ensure_active_employee(&mut directory, 2).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(directory.has_role(1, EMPLOYEE_ROLE).await.unwrap());
    }
}
