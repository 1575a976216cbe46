use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{ExpenseUpdate, NewExpense, PointUpdate, TripService};
use crate::domain::{
    Expense, ExpenseCategory, Role, TripStatus, format_amount, is_settled, parse_amount,
};
use crate::storage::SqliteRepository;

type Service = TripService<SqliteRepository>;

/// Tripledger - shared trip planning
#[derive(Parser)]
#[command(name = "tripledger")]
#[command(about = "Plan trips together: split expenses, settle balances and vote on the route")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "tripledger.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Participant acting on the trip
    #[arg(long = "as", global = true, value_name = "PARTICIPANT")]
    pub actor: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Trip management commands
    #[command(subcommand)]
    Trip(TripCommands),

    /// Participant management commands
    #[command(subcommand)]
    Participant(ParticipantCommands),

    /// Route point commands
    #[command(subcommand)]
    Point(PointCommands),

    /// Expense commands
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Show who paid what and who owes what
    Balance {
        /// Trip title
        trip: String,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Suggest payments that settle all balances
    Settle {
        /// Trip title
        trip: String,
    },

    /// Reporting commands
    #[command(subcommand)]
    Report(ReportCommands),

    /// Route voting commands
    #[command(subcommand)]
    Vote(VoteCommands),

    /// Export trip data
    Export {
        /// What to export: balances, expenses, votes, full
        #[arg(value_name = "TYPE")]
        export_type: String,

        /// Trip title
        trip: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TripCommands {
    /// Create a new trip; the acting participant becomes its owner
    Create {
        /// Trip title
        title: String,

        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: String,

        /// Currency code
        #[arg(long, default_value = "EUR")]
        currency: String,

        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List all trips
    List,

    /// Show trip details
    Show {
        /// Trip title
        title: String,
    },

    /// Change trip status: draft, planned, active, completed
    Status {
        /// Trip title
        title: String,

        /// New status
        status: String,
    },

    /// Delete a trip and everything in it
    Delete {
        /// Trip title
        title: String,
    },
}

#[derive(Subcommand)]
pub enum ParticipantCommands {
    /// Invite someone to a trip
    Invite {
        /// Trip title
        trip: String,

        /// Participant name
        name: String,

        /// Email address
        #[arg(long)]
        email: Option<String>,

        /// Role: editor, viewer
        #[arg(long, default_value = "viewer")]
        role: String,
    },

    /// Accept an invitation
    Accept {
        /// Trip title
        trip: String,

        /// Your participant name
        name: String,
    },

    /// Decline an invitation
    Decline {
        /// Trip title
        trip: String,

        /// Your participant name
        name: String,
    },

    /// Change a participant's role
    Role {
        /// Trip title
        trip: String,

        /// Participant name
        name: String,

        /// Role: editor, viewer
        role: String,
    },

    /// Remove a participant from a trip
    Remove {
        /// Trip title
        trip: String,

        /// Participant name
        name: String,
    },

    /// List participants of a trip
    List {
        /// Trip title
        trip: String,
    },
}

#[derive(Subcommand)]
pub enum PointCommands {
    /// Append a point to the route
    Add {
        /// Trip title
        trip: String,

        /// Point name
        name: String,

        /// Latitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        /// Longitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,

        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Change a route point
    Update {
        /// Trip title
        trip: String,

        /// Point id or name
        point: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New latitude
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,

        /// New longitude
        #[arg(long, allow_negative_numbers = true)]
        lng: Option<f64>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New position in the route
        #[arg(long, allow_negative_numbers = true)]
        order: Option<i64>,
    },

    /// Remove a route point and its votes
    Remove {
        /// Trip title
        trip: String,

        /// Point id or name
        point: String,
    },

    /// List route points in order
    List {
        /// Trip title
        trip: String,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record an expense
    Add {
        /// Trip title
        trip: String,

        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Participant who paid
        #[arg(long)]
        paid_by: String,

        /// Participants sharing the cost, comma separated (defaults to everyone)
        #[arg(long, value_delimiter = ',')]
        split: Vec<String>,

        /// Category: transport, accommodation, food, activities, other
        #[arg(short, long, default_value = "other")]
        category: String,

        /// Description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Date of the expense (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Change an expense
    Update {
        /// Trip title
        trip: String,

        /// Expense ID
        id: String,

        /// New amount
        #[arg(long)]
        amount: Option<String>,

        /// New payer
        #[arg(long)]
        paid_by: Option<String>,

        /// New split, comma separated
        #[arg(long, value_delimiter = ',')]
        split: Option<Vec<String>>,

        /// Split the expense between everyone again
        #[arg(long, conflicts_with = "split")]
        everyone: bool,

        /// New category
        #[arg(short, long)]
        category: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete an expense
    Delete {
        /// Trip title
        trip: String,

        /// Expense ID
        id: String,
    },

    /// Show an expense
    Show {
        /// Trip title
        trip: String,

        /// Expense ID
        id: String,
    },

    /// List expenses
    List {
        /// Trip title
        trip: String,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Spending per category
    Categories {
        /// Trip title
        trip: String,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum VoteCommands {
    /// Open voting on the route points (owner only)
    Start {
        /// Trip title
        trip: String,
    },

    /// Rate a route point from 1 to 5
    Cast {
        /// Trip title
        trip: String,

        /// Point id or name
        point: String,

        /// Rating, 1 to 5
        value: u8,

        /// Optional comment
        #[arg(short, long)]
        comment: Option<String>,
    },

    /// Show ranked results
    Results {
        /// Trip title
        trip: String,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let actor = self.actor.as_deref();

        match self.command {
            Commands::Init => {
                Service::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Trip(cmd) => {
                let service = Service::connect(&self.database).await?;
                run_trip_command(&service, actor, cmd).await?;
            }

            Commands::Participant(cmd) => {
                let service = Service::connect(&self.database).await?;
                run_participant_command(&service, actor, cmd).await?;
            }

            Commands::Point(cmd) => {
                let service = Service::connect(&self.database).await?;
                run_point_command(&service, require_actor(actor)?, cmd).await?;
            }

            Commands::Expense(cmd) => {
                let service = Service::connect(&self.database).await?;
                run_expense_command(&service, require_actor(actor)?, cmd).await?;
            }

            Commands::Balance { trip, format } => {
                let service = Service::connect(&self.database).await?;
                run_balance_command(&service, require_actor(actor)?, &trip, &format).await?;
            }

            Commands::Settle { trip } => {
                let service = Service::connect(&self.database).await?;
                run_settle_command(&service, require_actor(actor)?, &trip).await?;
            }

            Commands::Report(cmd) => {
                let service = Service::connect(&self.database).await?;
                run_report_command(&service, require_actor(actor)?, cmd).await?;
            }

            Commands::Vote(cmd) => {
                let service = Service::connect(&self.database).await?;
                run_vote_command(&service, require_actor(actor)?, cmd).await?;
            }

            Commands::Export {
                export_type,
                trip,
                output,
            } => {
                let service = Service::connect(&self.database).await?;
                run_export_command(
                    &service,
                    require_actor(actor)?,
                    &export_type,
                    &trip,
                    output.as_deref(),
                )
                .await?;
            }
        }

        Ok(())
    }
}

fn require_actor(actor: Option<&str>) -> Result<&str> {
    actor.context("This command needs the acting participant: --as <PARTICIPANT>")
}

async fn run_trip_command(service: &Service, actor: Option<&str>, cmd: TripCommands) -> Result<()> {
    match cmd {
        TripCommands::Create {
            title,
            start,
            end,
            currency,
            description,
        } => {
            let owner = actor
                .context("Creating a trip needs its owner: --as <PARTICIPANT>")?
                .to_string();
            let start_date = parse_date(&start)?;
            let end_date = parse_date(&end)?;

            let (trip, owner) = service
                .create_trip(
                    title,
                    start_date,
                    end_date,
                    currency.to_uppercase(),
                    description,
                    owner,
                )
                .await?;
            println!(
                "Created trip: {} ({} to {}, {}), owner {}",
                trip.title, trip.start_date, trip.end_date, trip.currency, owner.name
            );
        }

        TripCommands::List => {
            let trips = service.list_trips().await?;
            if trips.is_empty() {
                println!("No trips found. Create one with 'tripledger trip create'");
            } else {
                println!(
                    "{:<25} {:<12} {:<12} {:<10} {:<8}",
                    "TITLE", "START", "END", "STATUS", "CURRENCY"
                );
                println!("{}", "-".repeat(70));
                for trip in trips {
                    println!(
                        "{:<25} {:<12} {:<12} {:<10} {:<8}",
                        truncate(&trip.title, 25),
                        trip.start_date,
                        trip.end_date,
                        trip.status,
                        trip.currency
                    );
                }
            }
        }

        TripCommands::Show { title } => {
            let info = service
                .get_trip_info(&title, require_actor(actor)?)
                .await?;
            let trip = &info.trip;

            println!("Trip: {}", trip.title);
            println!("  ID:           {}", trip.id);
            if let Some(desc) = &trip.description {
                println!("  Description:  {}", desc);
            }
            println!(
                "  Dates:        {} to {} ({} days)",
                trip.start_date,
                trip.end_date,
                trip.duration_days()
            );
            println!("  Status:       {}", trip.status);
            println!("  Currency:     {}", trip.currency);
            if let Some(owner) = &info.owner {
                println!("  Owner:        {}", owner.name);
            }
            println!("  Participants: {}", info.participant_count);
            println!("  Route points: {}", info.point_count);
            println!(
                "  Expenses:     {} ({} {})",
                info.expense_count,
                format_amount(info.total_spent),
                trip.currency
            );
            println!("  Voting:       {}", info.voting_state);
        }

        TripCommands::Status { title, status } => {
            let status = TripStatus::from_str(&status).map_err(anyhow::Error::msg)?;
            let trip = service
                .update_trip_status(&title, require_actor(actor)?, status)
                .await?;
            println!("Trip '{}' is now {}", trip.title, trip.status);
        }

        TripCommands::Delete { title } => {
            let trip = service
                .delete_trip(&title, require_actor(actor)?)
                .await?;
            println!("Deleted trip: {}", trip.title);
        }
    }
    Ok(())
}

async fn run_participant_command(
    service: &Service,
    actor: Option<&str>,
    cmd: ParticipantCommands,
) -> Result<()> {
    match cmd {
        ParticipantCommands::Invite {
            trip,
            name,
            email,
            role,
        } => {
            let role = Role::from_str(&role).map_err(anyhow::Error::msg)?;
            let participant = service
                .invite_participant(&trip, require_actor(actor)?, name, email, role)
                .await?;
            println!(
                "Invited {} to '{}' as {} (pending)",
                participant.name, trip, participant.role
            );
        }

        ParticipantCommands::Accept { trip, name } => {
            service.respond_to_invitation(&trip, &name, true).await?;
            println!("{} joined '{}'", name, trip);
        }

        ParticipantCommands::Decline { trip, name } => {
            service.respond_to_invitation(&trip, &name, false).await?;
            println!("{} declined the invitation to '{}'", name, trip);
        }

        ParticipantCommands::Role { trip, name, role } => {
            let role = Role::from_str(&role).map_err(anyhow::Error::msg)?;
            let participant = service
                .set_role(&trip, require_actor(actor)?, &name, role)
                .await?;
            println!("{} is now {}", participant.name, participant.role);
        }

        ParticipantCommands::Remove { trip, name } => {
            let participant = service
                .remove_participant(&trip, require_actor(actor)?, &name)
                .await?;
            println!("Removed {} from '{}'", participant.name, trip);
        }

        ParticipantCommands::List { trip } => {
            let participants = service
                .list_participants(&trip, require_actor(actor)?)
                .await?;
            println!("{:<20} {:<8} {:<10} {:<30}", "NAME", "ROLE", "STATUS", "EMAIL");
            println!("{}", "-".repeat(70));
            for p in participants {
                println!(
                    "{:<20} {:<8} {:<10} {:<30}",
                    truncate(&p.name, 20),
                    p.role,
                    p.status,
                    p.email.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

async fn run_point_command(service: &Service, actor: &str, cmd: PointCommands) -> Result<()> {
    match cmd {
        PointCommands::Add {
            trip,
            name,
            lat,
            lng,
            description,
        } => {
            let point = service
                .add_point(&trip, actor, name, lat, lng, description)
                .await?;
            println!(
                "Added point #{}: {} ({:.5}, {:.5}) ({})",
                point.order, point.name, point.latitude, point.longitude, point.id
            );
        }

        PointCommands::Update {
            trip,
            point,
            name,
            lat,
            lng,
            description,
            order,
        } => {
            let update = PointUpdate {
                name,
                latitude: lat,
                longitude: lng,
                description,
                order,
            };
            let point = service.update_point(&trip, actor, &point, update).await?;
            println!("Updated point #{}: {}", point.order, point.name);
        }

        PointCommands::Remove { trip, point } => {
            let point = service.remove_point(&trip, actor, &point).await?;
            println!("Removed point: {}", point.name);
        }

        PointCommands::List { trip } => {
            let points = service.list_points(&trip, actor).await?;
            if points.is_empty() {
                println!("No route points yet");
            } else {
                println!(
                    "{:>5} {:<25} {:>10} {:>11}  {}",
                    "ORDER", "NAME", "LAT", "LNG", "DESCRIPTION"
                );
                println!("{}", "-".repeat(75));
                for p in points {
                    println!(
                        "{:>5} {:<25} {:>10.5} {:>11.5}  {}",
                        p.order,
                        truncate(&p.name, 25),
                        p.latitude,
                        p.longitude,
                        p.description.as_deref().unwrap_or("")
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_expense_command(service: &Service, actor: &str, cmd: ExpenseCommands) -> Result<()> {
    match cmd {
        ExpenseCommands::Add {
            trip,
            amount,
            paid_by,
            split,
            category,
            description,
            date,
        } => {
            let input = NewExpense {
                amount: parse_amount(&amount)
                    .context("Invalid amount format. Use '50.00' or '50'")?,
                paid_by,
                split_between: split,
                category: ExpenseCategory::from_str(&category).map_err(anyhow::Error::msg)?,
                description,
                date: date.as_deref().map(parse_date).transpose()?,
            };

            let expense = service.record_expense(&trip, actor, input).await?;
            println!(
                "Recorded expense: {} ({}) ({})",
                format_amount(expense.amount),
                expense.category,
                expense.id
            );
        }

        ExpenseCommands::Update {
            trip,
            id,
            amount,
            paid_by,
            split,
            everyone,
            category,
            description,
            date,
        } => {
            let expense_id = parse_expense_id(&id)?;
            let update = ExpenseUpdate {
                amount: amount
                    .as_deref()
                    .map(parse_amount)
                    .transpose()
                    .context("Invalid amount format. Use '50.00' or '50'")?,
                paid_by,
                split_between: if everyone { Some(Vec::new()) } else { split },
                category: category
                    .as_deref()
                    .map(ExpenseCategory::from_str)
                    .transpose()
                    .map_err(anyhow::Error::msg)?,
                description,
                date: date.as_deref().map(parse_date).transpose()?,
            };

            let expense = service
                .update_expense(&trip, actor, expense_id, update)
                .await?;
            println!(
                "Updated expense: {} ({})",
                format_amount(expense.amount),
                expense.id
            );
        }

        ExpenseCommands::Delete { trip, id } => {
            let expense = service
                .delete_expense(&trip, actor, parse_expense_id(&id)?)
                .await?;
            println!(
                "Deleted expense: {} ({})",
                format_amount(expense.amount),
                expense.id
            );
        }

        ExpenseCommands::Show { trip, id } => {
            let expense = service
                .get_expense(&trip, actor, parse_expense_id(&id)?)
                .await?;
            let names = service.get_participant_names(&trip, actor).await?;
            let name = |id: &Uuid| names.get(id).cloned().unwrap_or_else(|| id.to_string());

            println!("Expense: {}", expense.id);
            println!("  Amount:      {}", format_amount(expense.amount));
            println!("  Category:    {}", expense.category);
            if !expense.description.is_empty() {
                println!("  Description: {}", expense.description);
            }
            if let Some(date) = expense.date {
                println!("  Date:        {}", date);
            }
            println!("  Paid by:     {}", name(&expense.paid_by));
            println!("  Split:       {}", split_label(&expense, &name));
            println!(
                "  Recorded:    {}",
                expense.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }

        ExpenseCommands::List { trip } => {
            let expenses = service.list_expenses(&trip, actor).await?;
            let names = service.get_participant_names(&trip, actor).await?;
            let name = |id: &Uuid| names.get(id).cloned().unwrap_or_else(|| id.to_string());

            if expenses.is_empty() {
                println!("No expenses recorded");
            } else {
                println!(
                    "{:<36} {:>10} {:<14} {:<15} {:<20} {}",
                    "ID", "AMOUNT", "CATEGORY", "PAID BY", "DESCRIPTION", "SPLIT"
                );
                println!("{}", "-".repeat(110));
                for expense in &expenses {
                    println!(
                        "{:<36} {:>10} {:<14} {:<15} {:<20} {}",
                        expense.id,
                        format_amount(expense.amount),
                        expense.category,
                        truncate(&name(&expense.paid_by), 15),
                        truncate(&expense.description, 20),
                        split_label(expense, &name)
                    );
                }
            }
        }
    }
    Ok(())
}

fn split_label(expense: &Expense, name: &impl Fn(&Uuid) -> String) -> String {
    if expense.is_split_between_everyone() {
        "everyone".to_string()
    } else {
        expense
            .split_between
            .iter()
            .map(name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

async fn run_balance_command(service: &Service, actor: &str, trip: &str, format: &str) -> Result<()> {
    let report = service.balance_report(trip, actor).await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "csv" => {
            println!("participant,paid,share,balance");
            for line in &report.lines {
                println!(
                    "{},{},{},{}",
                    line.name,
                    format_amount(line.paid),
                    format_amount(line.share),
                    format_amount(line.balance)
                );
            }
        }
        _ => {
            println!("Balances for '{}' ({})", report.trip_title, report.currency);
            println!();
            println!(
                "{:<20} {:>12} {:>12} {:>12}",
                "PARTICIPANT", "PAID", "SHARE", "BALANCE"
            );
            println!("{}", "-".repeat(60));
            for line in &report.lines {
                println!(
                    "{:<20} {:>12} {:>12} {:>12}",
                    truncate(&line.name, 20),
                    format_amount(line.paid),
                    format_amount(line.share),
                    format_amount(line.balance)
                );
            }
            println!("{}", "-".repeat(60));
            println!("{:<20} {:>12}", "TOTAL SPENT", format_amount(report.total_spent));

            if !is_settled(report.unresolved) {
                println!();
                println!(
                    "Note: {} of shares belong to former participants",
                    format_amount(report.unresolved)
                );
            }
            if report.skipped_expenses > 0 {
                println!(
                    "Note: {} expense(s) left out, their payer is no longer on the trip",
                    report.skipped_expenses
                );
            }
        }
    }
    Ok(())
}

async fn run_settle_command(service: &Service, actor: &str, trip: &str) -> Result<()> {
    let report = service.balance_report(trip, actor).await?;

    if report.settlements.is_empty() {
        println!("Everyone is settled up");
        return Ok(());
    }

    println!("Suggested payments for '{}':", report.trip_title);
    for s in &report.settlements {
        println!(
            "  {} pays {} {} {}",
            s.from,
            s.to,
            format_amount(s.amount),
            report.currency
        );
    }
    Ok(())
}

async fn run_report_command(service: &Service, actor: &str, cmd: ReportCommands) -> Result<()> {
    match cmd {
        ReportCommands::Categories { trip, format } => {
            let report = service.category_report(&trip, actor).await?;

            match format.as_str() {
                "json" => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                "csv" => {
                    println!("category,total,count,percentage");
                    for cat in &report.categories {
                        println!(
                            "{},{},{},{:.2}",
                            cat.category,
                            format_amount(cat.total),
                            cat.count,
                            cat.percentage
                        );
                    }
                }
                _ => {
                    println!(
                        "Spending by category for '{}' ({})",
                        report.trip_title, report.currency
                    );
                    println!();
                    println!(
                        "{:<20} {:>12} {:>8} {:>8}",
                        "CATEGORY", "TOTAL", "COUNT", "PERCENT"
                    );
                    println!("{}", "-".repeat(52));

                    for cat in &report.categories {
                        println!(
                            "{:<20} {:>12} {:>8} {:>7.1}%",
                            cat.category,
                            format_amount(cat.total),
                            cat.count,
                            cat.percentage
                        );
                    }

                    println!("{}", "-".repeat(52));
                    println!("{:<20} {:>12}", "TOTAL", format_amount(report.total));
                }
            }
        }
    }
    Ok(())
}

async fn run_vote_command(service: &Service, actor: &str, cmd: VoteCommands) -> Result<()> {
    match cmd {
        VoteCommands::Start { trip } => {
            service.start_voting(&trip, actor).await?;
            println!("Voting is open for '{}'", trip);
        }

        VoteCommands::Cast {
            trip,
            point,
            value,
            comment,
        } => {
            service
                .cast_vote(&trip, actor, &point, value, comment)
                .await?;
            println!("{} rated '{}' {}/5", actor, point, value);
        }

        VoteCommands::Results { trip, format } => {
            let report = service.voting_report(&trip, actor).await?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            println!("Voting for '{}': {}", report.trip_title, report.state);
            if let Some(started_at) = report.started_at {
                println!("Started: {}", started_at.format("%Y-%m-%d %H:%M UTC"));
            }
            println!();
            println!("{:>4} {:<25} {:>8} {:>6}", "RANK", "POINT", "AVERAGE", "VOTES");
            println!("{}", "-".repeat(46));
            for (rank, result) in report.results.iter().enumerate() {
                println!(
                    "{:>4} {:<25} {:>8.2} {:>6}",
                    rank + 1,
                    truncate(&result.name, 25),
                    result.average_rating,
                    result.total_votes
                );
                for vote in &result.votes {
                    match &vote.comment {
                        Some(comment) => println!(
                            "       {}: {} \"{}\"",
                            report.voter_name(&vote.voter),
                            vote.value,
                            comment
                        ),
                        None => println!("       {}: {}", report.voter_name(&vote.voter), vote.value),
                    }
                }
            }
        }
    }
    Ok(())
}

async fn run_export_command(
    service: &Service,
    actor: &str,
    export_type: &str,
    trip: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service, actor);

    // Determine output writer
    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "balances" => {
            let count = exporter.export_balances_csv(trip, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }
        "expenses" => {
            let count = exporter.export_expenses_csv(trip, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} expenses", count);
            }
        }
        "votes" => {
            let report = exporter.export_voting_json(trip, writer).await?;
            if output.is_some() {
                eprintln!("Exported results for {} route points", report.results.len());
            }
        }
        "full" => {
            let snapshot = exporter.export_trip_json(trip, writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported trip '{}': {} participants, {} points, {} expenses, {} votes",
                    snapshot.trip.title,
                    snapshot.participants.len(),
                    snapshot.points.len(),
                    snapshot.expenses.len(),
                    snapshot.votes.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: balances, expenses, votes, full",
                export_type
            );
        }
    }

    Ok(())
}

fn parse_expense_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).context("Invalid expense ID format (expected UUID)")
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))
}
