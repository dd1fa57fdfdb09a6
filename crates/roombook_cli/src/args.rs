//! Command-line surface.

use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use roombook_core::{ReservationStatus, Role};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "roombook", version, about = "Meeting-room reservations")]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file; overrides `database.path`.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Pin today's date (YYYY-MM-DD) instead of using the host clock.
    #[arg(long, global = true, value_parser = parse_date)]
    pub today: Option<NaiveDate>,

    /// Log to stderr even when no log directory is configured.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage principals.
    #[command(subcommand)]
    Principal(PrincipalCommand),
    /// Manage rooms.
    #[command(subcommand)]
    Room(RoomCommand),
    #[command(flatten)]
    Reservation(ReservationCommand),
}

#[derive(Debug, Subcommand)]
pub enum ReservationCommand {
    /// Book a room.
    Book(BookArgs),
    /// Move a reservation and replace its purpose.
    Reschedule(RescheduleArgs),
    /// Cancel a reservation.
    Cancel(CancelArgs),
    /// Show one reservation.
    Show { id: Uuid },
    /// List reservations.
    List(ListArgs),
    /// Check whether a slot is free.
    Available(SlotArgs),
}

#[derive(Debug, Subcommand)]
pub enum PrincipalCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, value_enum, default_value_t = RoleArg::User)]
        role: RoleArg,
    },
    List,
}

#[derive(Debug, Subcommand)]
pub enum RoomCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        capacity: u32,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    List {
        /// Include deactivated rooms.
        #[arg(long)]
        all: bool,
    },
    Deactivate { id: Uuid },
}

#[derive(Debug, Args)]
pub struct SlotArgs {
    #[arg(long)]
    pub room: Uuid,
    #[arg(long, value_parser = parse_date)]
    pub date: NaiveDate,
    #[arg(long, value_parser = parse_time)]
    pub start: NaiveTime,
    #[arg(long, value_parser = parse_time)]
    pub end: NaiveTime,
}

#[derive(Debug, Args)]
pub struct BookArgs {
    /// Acting principal id.
    #[arg(long = "as")]
    pub principal: Uuid,
    #[command(flatten)]
    pub slot: SlotArgs,
    #[arg(long)]
    pub purpose: Option<String>,
}

#[derive(Debug, Args)]
pub struct RescheduleArgs {
    #[arg(long = "as")]
    pub principal: Uuid,
    pub id: Uuid,
    #[arg(long, value_parser = parse_date)]
    pub date: NaiveDate,
    #[arg(long, value_parser = parse_time)]
    pub start: NaiveTime,
    #[arg(long, value_parser = parse_time)]
    pub end: NaiveTime,
    #[arg(long)]
    pub purpose: Option<String>,
}

#[derive(Debug, Args)]
pub struct CancelArgs {
    #[arg(long = "as")]
    pub principal: Uuid,
    pub id: Uuid,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    pub owner: Option<Uuid>,
    #[arg(long)]
    pub room: Option<Uuid>,
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,
    #[arg(long, value_parser = parse_date)]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    User,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::User => Role::User,
            RoleArg::Admin => Role::Admin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Pending,
    Confirmed,
    Cancelled,
}

impl From<StatusArg> for ReservationStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => ReservationStatus::Pending,
            StatusArg::Confirmed => ReservationStatus::Confirmed,
            StatusArg::Cancelled => ReservationStatus::Cancelled,
        }
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

/// Accepts `HH:MM` or `HH:MM:SS`.
fn parse_time(value: &str) -> Result<NaiveTime, String> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|err| format!("expected HH:MM or HH:MM:SS: {err}"))
}
