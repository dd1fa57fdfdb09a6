//! Reservation repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist reservations and answer overlap queries.
//! - Make conflict-scan-then-write atomic per database.
//!
//! # Invariants
//! - Every write path opens a `BEGIN IMMEDIATE` transaction before scanning for
//!   conflicts, so concurrent writers on other connections serialize behind it.
//! - Only non-cancelled rows take part in conflict scans.
//! - Listings are ordered by `booking_date ASC, start_time ASC, id ASC`.

use crate::model::principal::PrincipalId;
use crate::model::reservation::{Reservation, ReservationId, ReservationStatus};
use crate::model::room::ResourceId;
use crate::repo::{
    ensure_connection_ready, is_unique_violation, parse_uuid, RepoError, RepoResult,
};
use chrono::{NaiveDate, NaiveTime};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

const RESERVATION_SELECT_SQL: &str = "SELECT
    id,
    room_id,
    owner_id,
    booking_date,
    start_time,
    end_time,
    purpose,
    status,
    created_at,
    updated_at
FROM reservations";

/// Filter for reservation listings. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationListQuery {
    pub owner_id: Option<PrincipalId>,
    pub resource_id: Option<ResourceId>,
    pub status: Option<ReservationStatus>,
    /// Inclusive lower date bound.
    pub from_date: Option<NaiveDate>,
    /// Inclusive upper date bound.
    pub to_date: Option<NaiveDate>,
}

impl ReservationListQuery {
    pub fn by_owner(owner_id: PrincipalId) -> Self {
        Self {
            owner_id: Some(owner_id),
            ..Self::default()
        }
    }

    pub fn by_resource(resource_id: ResourceId) -> Self {
        Self {
            resource_id: Some(resource_id),
            ..Self::default()
        }
    }
}

/// Repository interface for reservation persistence.
pub trait ReservationRepository {
    /// Inserts `reservation` unless a live reservation overlaps it.
    ///
    /// Fails with `RepoError::Conflict` naming the blocking reservations.
    fn create_reservation(&self, reservation: &Reservation) -> RepoResult<()>;

    /// Rewrites date, times, purpose, and `updated_at` of an existing
    /// reservation unless another live reservation overlaps the new slot.
    ///
    /// Fails with `NotFound`, `Terminal` (already cancelled), or `Conflict`.
    fn update_reservation(&self, reservation: &Reservation) -> RepoResult<()>;

    /// Moves a reservation to `Cancelled`.
    ///
    /// Returns `false` when it was already cancelled.
    fn cancel_reservation(&self, id: ReservationId, updated_at: i64) -> RepoResult<bool>;

    fn get_reservation(&self, id: ReservationId) -> RepoResult<Option<Reservation>>;

    fn list_reservations(&self, query: &ReservationListQuery) -> RepoResult<Vec<Reservation>>;

    /// Returns ids of live reservations on `(resource_id, date)` overlapping
    /// `[start, end)`, skipping `exclude`.
    fn find_conflicts(
        &self,
        resource_id: ResourceId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude: Option<ReservationId>,
    ) -> RepoResult<Vec<ReservationId>>;
}

/// SQLite-backed reservation repository.
pub struct SqliteReservationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReservationRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["reservations"])?;
        Ok(Self { conn })
    }
}

impl ReservationRepository for SqliteReservationRepository<'_> {
    fn create_reservation(&self, reservation: &Reservation) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let blocking = conflicts_in(
            &tx,
            reservation.resource_id,
            reservation.date,
            reservation.start_time,
            reservation.end_time,
            None,
        )?;
        if !blocking.is_empty() {
            return Err(RepoError::Conflict { blocking });
        }

        let inserted = tx.execute(
            "INSERT INTO reservations (
                id,
                room_id,
                owner_id,
                booking_date,
                start_time,
                end_time,
                purpose,
                status,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                reservation.id.to_string(),
                reservation.resource_id.to_string(),
                reservation.owner_id.to_string(),
                date_to_db(reservation.date),
                time_to_db(reservation.start_time),
                time_to_db(reservation.end_time),
                reservation.purpose.as_deref(),
                reservation.status.as_str(),
                reservation.created_at,
                reservation.updated_at,
            ],
        );
        if let Err(err) = inserted {
            return Err(slot_violation(&tx, reservation, err)?);
        }

        tx.commit()?;
        Ok(())
    }

    fn update_reservation(&self, reservation: &Reservation) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let status: Option<String> = tx
            .query_row(
                "SELECT status FROM reservations WHERE id = ?1;",
                [reservation.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match status.as_deref().map(parse_status).transpose()? {
            None => {
                return Err(RepoError::NotFound {
                    entity: "reservation",
                    id: reservation.id,
                })
            }
            Some(ReservationStatus::Cancelled) => return Err(RepoError::Terminal(reservation.id)),
            Some(_) => {}
        }

        let blocking = conflicts_in(
            &tx,
            reservation.resource_id,
            reservation.date,
            reservation.start_time,
            reservation.end_time,
            Some(reservation.id),
        )?;
        if !blocking.is_empty() {
            return Err(RepoError::Conflict { blocking });
        }

        let updated = tx.execute(
            "UPDATE reservations
             SET
                booking_date = ?2,
                start_time = ?3,
                end_time = ?4,
                purpose = ?5,
                updated_at = ?6
             WHERE id = ?1;",
            params![
                reservation.id.to_string(),
                date_to_db(reservation.date),
                time_to_db(reservation.start_time),
                time_to_db(reservation.end_time),
                reservation.purpose.as_deref(),
                reservation.updated_at,
            ],
        );
        if let Err(err) = updated {
            return Err(slot_violation(&tx, reservation, err)?);
        }

        tx.commit()?;
        Ok(())
    }

    fn cancel_reservation(&self, id: ReservationId, updated_at: i64) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE reservations
             SET
                status = 'cancelled',
                updated_at = ?2
             WHERE id = ?1
               AND status <> 'cancelled';",
            params![id.to_string(), updated_at],
        )?;
        if changed == 1 {
            return Ok(true);
        }

        match self.get_reservation(id)? {
            Some(_) => Ok(false),
            None => Err(RepoError::NotFound {
                entity: "reservation",
                id,
            }),
        }
    }

    fn get_reservation(&self, id: ReservationId) -> RepoResult<Option<Reservation>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RESERVATION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_reservation_row(row)?));
        }
        Ok(None)
    }

    fn list_reservations(&self, query: &ReservationListQuery) -> RepoResult<Vec<Reservation>> {
        let mut sql = format!("{RESERVATION_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(owner_id) = query.owner_id {
            sql.push_str(" AND owner_id = ?");
            bind_values.push(Value::Text(owner_id.to_string()));
        }
        if let Some(resource_id) = query.resource_id {
            sql.push_str(" AND room_id = ?");
            bind_values.push(Value::Text(resource_id.to_string()));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(from_date) = query.from_date {
            sql.push_str(" AND booking_date >= ?");
            bind_values.push(Value::Text(date_to_db(from_date)));
        }
        if let Some(to_date) = query.to_date {
            sql.push_str(" AND booking_date <= ?");
            bind_values.push(Value::Text(date_to_db(to_date)));
        }
        sql.push_str(" ORDER BY booking_date ASC, start_time ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut reservations = Vec::new();
        while let Some(row) = rows.next()? {
            reservations.push(parse_reservation_row(row)?);
        }
        Ok(reservations)
    }

    fn find_conflicts(
        &self,
        resource_id: ResourceId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude: Option<ReservationId>,
    ) -> RepoResult<Vec<ReservationId>> {
        conflicts_in(self.conn, resource_id, date, start, end, exclude)
    }
}

fn conflicts_in(
    conn: &Connection,
    resource_id: ResourceId,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    exclude: Option<ReservationId>,
) -> RepoResult<Vec<ReservationId>> {
    let mut stmt = conn.prepare(
        "SELECT id
         FROM reservations
         WHERE room_id = ?1
           AND booking_date = ?2
           AND status <> 'cancelled'
           AND start_time < ?4
           AND end_time > ?3
           AND (?5 IS NULL OR id <> ?5)
         ORDER BY start_time ASC, id ASC;",
    )?;
    let mut rows = stmt.query(params![
        resource_id.to_string(),
        date_to_db(date),
        time_to_db(start),
        time_to_db(end),
        exclude.map(|id| id.to_string()),
    ])?;

    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let text: String = row.get(0)?;
        ids.push(parse_uuid(&text, "reservations.id")?);
    }
    Ok(ids)
}

/// Maps a unique-index violation on the live-slot index to `Conflict`; any
/// other failure is passed through.
fn slot_violation(
    tx: &Transaction<'_>,
    reservation: &Reservation,
    err: rusqlite::Error,
) -> RepoResult<RepoError> {
    if !is_unique_violation(&err) {
        return Ok(err.into());
    }

    debug!(
        "event=reservation_slot_index module=repo status=conflict room_id={} date={}",
        reservation.resource_id, reservation.date
    );
    let mut stmt = tx.prepare(
        "SELECT id
         FROM reservations
         WHERE room_id = ?1
           AND booking_date = ?2
           AND start_time = ?3
           AND status <> 'cancelled'
           AND id <> ?4;",
    )?;
    let mut rows = stmt.query(params![
        reservation.resource_id.to_string(),
        date_to_db(reservation.date),
        time_to_db(reservation.start_time),
        reservation.id.to_string(),
    ])?;
    let mut blocking = Vec::new();
    while let Some(row) = rows.next()? {
        let text: String = row.get(0)?;
        blocking.push(parse_uuid(&text, "reservations.id")?);
    }
    Ok(RepoError::Conflict { blocking })
}

fn parse_reservation_row(row: &Row<'_>) -> RepoResult<Reservation> {
    let id_text: String = row.get("id")?;
    let room_text: String = row.get("room_id")?;
    let owner_text: String = row.get("owner_id")?;
    let date_text: String = row.get("booking_date")?;
    let start_text: String = row.get("start_time")?;
    let end_text: String = row.get("end_time")?;
    let status_text: String = row.get("status")?;

    Ok(Reservation {
        id: parse_uuid(&id_text, "reservations.id")?,
        resource_id: parse_uuid(&room_text, "reservations.room_id")?,
        owner_id: parse_uuid(&owner_text, "reservations.owner_id")?,
        date: parse_date(&date_text)?,
        start_time: parse_time(&start_text, "reservations.start_time")?,
        end_time: parse_time(&end_text, "reservations.end_time")?,
        purpose: row.get("purpose")?,
        status: parse_status(&status_text)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn date_to_db(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn time_to_db(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn parse_date(value: &str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid date `{value}` in reservations.booking_date"
        ))
    })
}

fn parse_time(value: &str, column: &'static str) -> RepoResult<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|_| RepoError::InvalidData(format!("invalid time `{value}` in {column}")))
}

fn parse_status(value: &str) -> RepoResult<ReservationStatus> {
    ReservationStatus::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{value}` in reservations.status"))
    })
}
