// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use tempfile::TempDir;
use tripledger::application::{NewExpense, TripService};
use tripledger::domain::{Amount, ExpenseCategory, Role};
use tripledger::storage::SqliteRepository;

pub type Service = TripService<SqliteRepository>;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(Service, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = Service::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Expense input with names instead of ids; empty split means everyone
pub fn expense(amount: Amount, paid_by: &str, split: &[&str]) -> NewExpense {
    NewExpense {
        amount,
        paid_by: paid_by.to_string(),
        split_between: split.iter().map(|s| s.to_string()).collect(),
        category: ExpenseCategory::Other,
        description: String::new(),
        date: None,
    }
}

/// Test fixture: a trip owned by the first name, everyone else accepted
pub struct TripFixture;

impl TripFixture {
    pub const TITLE: &'static str = "Dolomites";

    /// Create the trip with `owner` and accepted editors
    pub async fn create(service: &Service, owner: &str, editors: &[&str]) -> Result<()> {
        service
            .create_trip(
                Self::TITLE.to_string(),
                parse_date("2025-08-01"),
                parse_date("2025-08-10"),
                "EUR".to_string(),
                Some("Hut to hut".to_string()),
                owner.to_string(),
            )
            .await?;

        for name in editors {
            Self::join(service, owner, name, Role::Editor).await?;
        }
        Ok(())
    }

    /// Invite `name` and accept on their behalf
    pub async fn join(service: &Service, owner: &str, name: &str, role: Role) -> Result<()> {
        service
            .invite_participant(Self::TITLE, owner, name.to_string(), None, role)
            .await?;
        service
            .respond_to_invitation(Self::TITLE, name, true)
            .await?;
        Ok(())
    }

    /// Add route points in order
    pub async fn add_points(service: &Service, actor: &str, names: &[&str]) -> Result<()> {
        for (i, name) in names.iter().enumerate() {
            service
                .add_point(
                    Self::TITLE,
                    actor,
                    name.to_string(),
                    46.5 + i as f64 * 0.01,
                    11.8,
                    None,
                )
                .await?;
        }
        Ok(())
    }
}
