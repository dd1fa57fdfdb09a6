//! `roombook` command-line front end.
//!
//! # Responsibility
//! - Map subcommands onto `roombook_core` operations.
//! - Resolve the acting principal from `--as` through the identity provider.
//! - Report each failure kind with its own exit code.

mod args;

use args::{Cli, Command, ListArgs, PrincipalCommand, ReservationCommand, RoomCommand};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use log::error;
use roombook_core::db::{open_db_with_busy_timeout, DbError};
use roombook_core::{
    init_logging, init_logging_from_config, Clock, ConfigError, CreateReservationRequest,
    FixedClock, IdentityProvider, Principal, PrincipalId, RepoError, ReservationDetails,
    ReservationListQuery, ReservationService, ReservationServiceError, Resource, RoombookConfig,
    SqlitePrincipalDirectory, SqliteReservationRepository, SqliteRoomDirectory, SystemClock,
    UpdateReservationRequest,
};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = match cli.config.as_deref() {
        Some(path) => RoombookConfig::load(path)?,
        None => RoombookConfig::default(),
    };
    if let Some(db) = cli.db {
        config.database.path = db;
    }

    if config.logging.dir.is_some() {
        init_logging_from_config(&config.logging).map_err(CliError::Logging)?;
    } else if cli.verbose {
        init_logging(&config.logging.level, None).map_err(CliError::Logging)?;
    }

    let conn = open_db_with_busy_timeout(&config.database.path, config.database.busy_timeout())?;
    let clock = match cli.today {
        Some(today) => CliClock::Fixed(FixedClock::new(Utc::now(), today)),
        None => CliClock::System(SystemClock),
    };

    match cli.command {
        Command::Principal(command) => run_principal(&conn, command),
        Command::Room(command) => run_room(&conn, &clock, command),
        Command::Reservation(command) => run_reservation(&conn, clock, command),
    }
}

fn run_principal(conn: &Connection, command: PrincipalCommand) -> Result<(), CliError> {
    let directory = SqlitePrincipalDirectory::try_new(conn)?;
    match command {
        PrincipalCommand::Add { name, role } => {
            let principal = Principal::new(name.trim(), role.into());
            directory.register_principal(&principal)?;
            println!("{}", principal.id);
        }
        PrincipalCommand::List => {
            for principal in directory.list_principals()? {
                println!(
                    "{}\t{}\t{}",
                    principal.id,
                    principal.role.as_str(),
                    principal.display_name
                );
            }
        }
    }
    Ok(())
}

fn run_room(conn: &Connection, clock: &CliClock, command: RoomCommand) -> Result<(), CliError> {
    let rooms = SqliteRoomDirectory::try_new(conn)?;
    match command {
        RoomCommand::Add {
            name,
            capacity,
            location,
            description,
        } => {
            let mut room = Resource::new(name, capacity);
            room.location = location;
            room.description = description;
            rooms.register_room(&room)?;
            println!("{}", room.id);
        }
        RoomCommand::List { all } => {
            for room in rooms.list_rooms(!all)? {
                println!(
                    "{}\t{}\tcapacity={}\t{}\t{}",
                    room.id,
                    room.name,
                    room.capacity,
                    room.location.as_deref().unwrap_or("-"),
                    if room.is_active { "active" } else { "inactive" }
                );
            }
        }
        RoomCommand::Deactivate { id } => {
            rooms.deactivate_room(id, clock.now_epoch_ms())?;
            println!("deactivated {id}");
        }
    }
    Ok(())
}

fn run_reservation(
    conn: &Connection,
    clock: CliClock,
    command: ReservationCommand,
) -> Result<(), CliError> {
    let principals = SqlitePrincipalDirectory::try_new(conn)?;
    let service = ReservationService::with_clock(
        SqliteReservationRepository::try_new(conn)?,
        SqliteRoomDirectory::try_new(conn)?,
        SqlitePrincipalDirectory::try_new(conn)?,
        clock,
    );

    match command {
        ReservationCommand::Book(args) => {
            let principal = resolve_principal(&principals, args.principal)?;
            let created = service.create(
                &principal,
                &CreateReservationRequest {
                    resource_id: args.slot.room,
                    date: args.slot.date,
                    start_time: args.slot.start,
                    end_time: args.slot.end,
                    purpose: args.purpose,
                },
            )?;
            print_reservation(&created);
        }
        ReservationCommand::Reschedule(args) => {
            let principal = resolve_principal(&principals, args.principal)?;
            let updated = service.update(
                &principal,
                args.id,
                &UpdateReservationRequest {
                    date: args.date,
                    start_time: args.start,
                    end_time: args.end,
                    purpose: args.purpose,
                },
            )?;
            print_reservation(&updated);
        }
        ReservationCommand::Cancel(args) => {
            let principal = resolve_principal(&principals, args.principal)?;
            service.cancel(&principal, args.id)?;
            println!("cancelled {}", args.id);
        }
        ReservationCommand::Show { id } => print_reservation(&service.get(id)?),
        ReservationCommand::List(args) => {
            for details in service.list(&list_query(args))? {
                print_reservation(&details);
            }
        }
        ReservationCommand::Available(slot) => {
            let free = service.check_availability(slot.room, slot.date, slot.start, slot.end)?;
            println!("{}", if free { "available" } else { "booked" });
        }
    }
    Ok(())
}

fn resolve_principal(
    directory: &SqlitePrincipalDirectory<'_>,
    id: PrincipalId,
) -> Result<Principal, CliError> {
    directory
        .get_principal(id)?
        .ok_or(CliError::UnknownPrincipal(id))
}

fn list_query(args: ListArgs) -> ReservationListQuery {
    ReservationListQuery {
        owner_id: args.owner,
        resource_id: args.room,
        status: args.status.map(Into::into),
        from_date: args.from,
        to_date: args.to,
    }
}

fn print_reservation(details: &ReservationDetails) {
    let reservation = &details.reservation;
    println!(
        "{}\t{}\t{} {}-{}\t{}\t{}\t{}",
        reservation.id,
        reservation.status.as_str(),
        reservation.date,
        reservation.start_time.format("%H:%M"),
        reservation.end_time.format("%H:%M"),
        details.resource_name.as_deref().unwrap_or("?"),
        details.owner_display_name.as_deref().unwrap_or("?"),
        reservation.purpose.as_deref().unwrap_or("")
    );
}

/// Host clock, or a pinned date from `--today`.
enum CliClock {
    System(SystemClock),
    Fixed(FixedClock),
}

impl Clock for CliClock {
    fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System(clock) => clock.now(),
            Self::Fixed(clock) => clock.now(),
        }
    }

    fn today(&self) -> NaiveDate {
        match self {
            Self::System(clock) => clock.today(),
            Self::Fixed(clock) => clock.today(),
        }
    }
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Logging(String),
    Db(DbError),
    Repo(RepoError),
    Service(ReservationServiceError),
    UnknownPrincipal(PrincipalId),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Logging(_) => 78,
            Self::Repo(RepoError::Busy) => 75,
            Self::Db(_) | Self::Repo(_) => 74,
            Self::UnknownPrincipal(_) => 77,
            Self::Service(err) => match err {
                ReservationServiceError::NotFound(_)
                | ReservationServiceError::ResourceNotFound(_) => 3,
                ReservationServiceError::InvalidInterval(_)
                | ReservationServiceError::InvalidPurpose { .. } => 4,
                ReservationServiceError::SchedulingConflict { .. } => 5,
                ReservationServiceError::Forbidden { .. } => 6,
                ReservationServiceError::Cancelled(_) => 7,
                ReservationServiceError::Busy => 75,
                ReservationServiceError::Repo(_) => 74,
            },
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(message) => write!(f, "logging setup failed: {message}"),
            Self::Db(err) => write!(f, "database error: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::UnknownPrincipal(id) => write!(f, "unknown principal: {id}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Service(err) => Some(err),
            Self::Logging(_) | Self::UnknownPrincipal(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ReservationServiceError> for CliError {
    fn from(value: ReservationServiceError) -> Self {
        Self::Service(value)
    }
}
