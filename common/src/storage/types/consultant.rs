use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, TenantContext},
    tenant_object,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Availability {
    Available,
    Interviewing,
    Assigned,
    Unavailable,
}

impl Availability {
    /// Feature-space weight used by the matching engine.
    pub fn score(&self) -> f64 {
        match self {
            Availability::Available => 1.0,
            Availability::Interviewing => 0.6,
            Availability::Assigned => 0.25,
            Availability::Unavailable => 0.0,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Availability::Available => "available now",
            Availability::Interviewing => "in interviews",
            Availability::Assigned => "currently assigned",
            Availability::Unavailable => "unavailable",
        }
    }
}

tenant_object!(Consultant, "consultant", {
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    location: Option<String>,
    availability: Availability,
    rate: Option<f64>,
    experience_years: Option<f64>,
    summary: Option<String>,
    tags: Vec<String>
});

/// Keep only digits of a phone value; the canonical comparison form.
pub fn phone_digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

impl Consultant {
    pub fn new_stub(
        tenant: &TenantContext,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: None,
            phone: None,
            location: None,
            availability: Availability::Available,
            rate: None,
            experience_years: None,
            summary: None,
            tags: Vec::new(),
        }
    }

    pub async fn find_by_email_ci(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        email: &str,
    ) -> Result<Option<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM consultant
                 WHERE tenant_id = $tenant
                   AND email != NONE
                   AND string::lowercase(email) = string::lowercase($email)
                 LIMIT 1",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("email", email.to_owned()))
            .await?;
        let rows: Vec<Self> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Phone lookup compares digits only, so formatting differences
    /// ("415-555-0134" vs "(415) 555 0134") still resolve.
    pub async fn find_by_phone_digits(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        phone: &str,
    ) -> Result<Option<Self>, AppError> {
        let needle = phone_digits(phone);
        if needle.is_empty() {
            return Ok(None);
        }
        let mut response = db
            .client
            .query("SELECT * FROM consultant WHERE tenant_id = $tenant AND phone != NONE")
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .await?;
        let rows: Vec<Self> = response.take(0)?;
        Ok(rows.into_iter().find(|c| {
            c.phone
                .as_deref()
                .map(phone_digits)
                .is_some_and(|digits| digits.contains(&needle))
        }))
    }

    pub async fn touch(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        consultant_id: &str,
    ) -> Result<(), AppError> {
        db.client
            .query(
                "UPDATE type::thing('consultant', $id)
                 SET updated_at = time::now()
                 WHERE tenant_id = $tenant",
            )
            .bind(("id", consultant_id.to_owned()))
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .await?
            .check()?;
        Ok(())
    }
}
