use anyhow::Result;
use std::io::Write;

use crate::application::{TripService, TripSnapshot, VotingReport};
use crate::domain::format_amount;
use crate::storage::TripRepository;

/// Exporter for converting trip data to various formats
pub struct Exporter<'a, R: TripRepository> {
    service: &'a TripService<R>,
    actor: &'a str,
}

impl<'a, R: TripRepository> Exporter<'a, R> {
    /// Export on behalf of `actor`, who must be able to read the trip.
    pub fn new(service: &'a TripService<R>, actor: &'a str) -> Self {
        Self { service, actor }
    }

    /// Export per-participant balances to CSV format
    pub async fn export_balances_csv<W: Write>(&self, title: &str, writer: W) -> Result<usize> {
        let report = self.service.balance_report(title, self.actor).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["participant", "paid", "share", "balance", "currency"])?;

        let mut count = 0;
        for line in &report.lines {
            csv_writer.write_record([
                line.name.as_str(),
                &format_amount(line.paid),
                &format_amount(line.share),
                &format_amount(line.balance),
                &report.currency,
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export expenses to CSV format. Split participants are joined with `;`,
    /// an empty split column means everyone.
    pub async fn export_expenses_csv<W: Write>(&self, title: &str, writer: W) -> Result<usize> {
        let expenses = self.service.list_expenses(title, self.actor).await?;
        let names = self.service.get_participant_names(title, self.actor).await?;
        let name = |id: &uuid::Uuid| names.get(id).cloned().unwrap_or_else(|| id.to_string());

        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record([
            "id",
            "date",
            "category",
            "description",
            "amount",
            "paid_by",
            "split_between",
            "created_at",
        ])?;

        let mut count = 0;
        for expense in &expenses {
            let split: Vec<String> = expense.split_between.iter().map(&name).collect();
            csv_writer.write_record([
                expense.id.to_string(),
                expense.date.map(|d| d.to_string()).unwrap_or_default(),
                expense.category.as_str().to_string(),
                expense.description.clone(),
                format_amount(expense.amount),
                name(&expense.paid_by),
                split.join(";"),
                expense.created_at.to_rfc3339(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export ranked voting results as JSON
    pub async fn export_voting_json<W: Write>(
        &self,
        title: &str,
        mut writer: W,
    ) -> Result<VotingReport> {
        let report = self.service.voting_report(title, self.actor).await?;

        let json = serde_json::to_string_pretty(&report)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(report)
    }

    /// Export the whole trip as a JSON snapshot
    pub async fn export_trip_json<W: Write>(
        &self,
        title: &str,
        mut writer: W,
    ) -> Result<TripSnapshot> {
        let snapshot = self.service.trip_snapshot(title, self.actor).await?;

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
