mod common;

use anyhow::Result;
use common::{TripFixture, expense, test_service};
use rust_decimal_macros::dec;
use tripledger::application::TripSnapshot;
use tripledger::io::Exporter;

const TRIP: &str = TripFixture::TITLE;

#[tokio::test]
async fn test_export_balances_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;
    TripFixture::create(&service, "Ann", &["Bob", "Cid"]).await?;
    service
        .record_expense(TRIP, "Ann", expense(dec!(100), "Ann", &[]))
        .await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service, "Ann")
        .export_balances_csv(TRIP, &mut buffer)
        .await?;
    assert_eq!(count, 3);

    let csv = String::from_utf8(buffer)?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "participant,paid,share,balance,currency");
    assert_eq!(lines[1], "Ann,100.00,33.33,66.67,EUR");
    assert_eq!(lines[2], "Bob,0.00,33.33,-33.33,EUR");

    Ok(())
}

#[tokio::test]
async fn test_export_expenses_csv_names_split() -> Result<()> {
    let (service, _temp) = test_service().await?;
    TripFixture::create(&service, "Ann", &["Bob", "Cid"]).await?;
    service
        .record_expense(TRIP, "Bob", expense(dec!(18.5), "Bob", &["Bob", "Cid"]))
        .await?;
    service
        .record_expense(TRIP, "Ann", expense(dec!(9), "Ann", &[]))
        .await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service, "Cid")
        .export_expenses_csv(TRIP, &mut buffer)
        .await?;
    assert_eq!(count, 2);

    let mut reader = csv::Reader::from_reader(buffer.as_slice());
    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
    assert_eq!(&rows[0][4], "18.50");
    assert_eq!(&rows[0][5], "Bob");
    assert_eq!(&rows[0][6], "Bob;Cid");
    assert_eq!(&rows[1][6], "");

    Ok(())
}

#[tokio::test]
async fn test_export_trip_json_snapshot() -> Result<()> {
    let (service, _temp) = test_service().await?;
    TripFixture::create(&service, "Ann", &["Bob"]).await?;
    TripFixture::add_points(&service, "Ann", &["Lake", "Pass"]).await?;
    service
        .record_expense(TRIP, "Ann", expense(dec!(42), "Bob", &[]))
        .await?;
    service.start_voting(TRIP, "Ann").await?;
    service.cast_vote(TRIP, "Bob", "Pass", 4, None).await?;

    let mut buffer = Vec::new();
    let exported = Exporter::new(&service, "Bob")
        .export_trip_json(TRIP, &mut buffer)
        .await?;

    let parsed: TripSnapshot = serde_json::from_slice(&buffer)?;
    assert_eq!(parsed.trip.title, TRIP);
    assert_eq!(parsed.participants.len(), 2);
    assert_eq!(parsed.points.len(), 2);
    assert_eq!(parsed.expenses[0].amount, dec!(42));
    assert_eq!(parsed.votes, exported.votes);

    Ok(())
}

#[tokio::test]
async fn test_export_voting_json() -> Result<()> {
    let (service, _temp) = test_service().await?;
    TripFixture::create(&service, "Ann", &[]).await?;
    TripFixture::add_points(&service, "Ann", &["Lake", "Pass"]).await?;
    service.start_voting(TRIP, "Ann").await?;
    service
        .cast_vote(TRIP, "Ann", "Pass", 5, Some("views".to_string()))
        .await?;

    let mut buffer = Vec::new();
    Exporter::new(&service, "Ann")
        .export_voting_json(TRIP, &mut buffer)
        .await?;

    let json: serde_json::Value = serde_json::from_slice(&buffer)?;
    assert_eq!(json["state"], "voting");
    assert_eq!(json["results"][0]["name"], "Pass");
    assert_eq!(json["results"][0]["votes"][0]["comment"], "views");
    assert_eq!(json["results"][1]["total_votes"], 0);

    Ok(())
}
