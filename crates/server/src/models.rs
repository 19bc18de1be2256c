// Database models for Diesel
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use shared_types::{User, UserRole};

use crate::repository::StoreError;

/// Database representation of users.
/// `role` is stored as VARCHAR and parsed into [`UserRole`] on the way out.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub restaurant_id: Option<i64>,
    pub google_id: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub salary_type: Option<String>,
    pub salary_amount: Option<f64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: UserRole = row
            .role
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("user {}: {}", row.id, e)))?;

        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            phone: row.phone,
            role,
            restaurant_id: row.restaurant_id,
            google_id: row.google_id,
            hire_date: row.hire_date,
            salary_type: row.salary_type,
            salary_amount: row.salary_amount,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Insertable struct for users created from an external identity
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUserRow<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub role: &'a str,
    pub google_id: Option<&'a str>,
    pub is_active: bool,
}
