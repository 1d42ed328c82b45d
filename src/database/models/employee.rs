use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

pub const EMPLOYEE_ROLE: &str = "employee";
pub const ADMIN_ROLE: &str = "admin";

/// Default rates from an employee profile; both may be unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRates {
    pub hourly_wage: Option<BigDecimal>,
    pub hourly_customer_rate: Option<BigDecimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
}
