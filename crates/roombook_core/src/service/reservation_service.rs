//! Reservation manager use-case service.
//!
//! # Responsibility
//! - Validate reservation requests (resource, date, interval, purpose).
//! - Enforce owner-or-admin authorization for mutations.
//! - Translate repository conflicts into caller-facing scheduling errors.
//! - Enrich results with resource and owner display fields.
//!
//! # Invariants
//! - Every operation receives the acting principal explicitly.
//! - All checks run before anything is committed; the repository makes the
//!   final conflict scan and write atomic.
//! - `resource_id` and `owner_id` never change after creation.
//! - A cancelled reservation is never rescheduled.

use crate::clock::{Clock, SystemClock};
use crate::model::principal::{Principal, PrincipalId};
use crate::model::reservation::{
    normalize_purpose, truncate_to_seconds, validate_interval, IntervalError, Reservation,
    ReservationId, ReservationStatus, PURPOSE_MAX_CHARS,
};
use crate::model::room::ResourceId;
use crate::repo::principal_repo::IdentityProvider;
use crate::repo::reservation_repo::{ReservationListQuery, ReservationRepository};
use crate::repo::room_repo::ResourceDirectory;
use crate::repo::RepoError;
use chrono::{NaiveDate, NaiveTime};
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Errors surfaced by reservation use-cases.
#[derive(Debug)]
pub enum ReservationServiceError {
    /// Reservation does not exist.
    NotFound(ReservationId),
    /// Resource does not exist or is inactive.
    ResourceNotFound(ResourceId),
    /// Past date or empty time range.
    InvalidInterval(IntervalError),
    /// `purpose` exceeds `PURPOSE_MAX_CHARS`.
    InvalidPurpose { length: usize, max: usize },
    /// Requested slot overlaps live reservations.
    SchedulingConflict {
        resource_id: ResourceId,
        date: NaiveDate,
        blocking: Vec<ReservationId>,
    },
    /// Actor is neither the owner nor an administrator.
    Forbidden {
        reservation_id: ReservationId,
        principal_id: PrincipalId,
    },
    /// Reservation is cancelled and cannot be modified.
    Cancelled(ReservationId),
    /// A concurrent writer held the store past the busy timeout; the request
    /// was not applied and may be retried.
    Busy,
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ReservationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "reservation not found: {id}"),
            Self::ResourceNotFound(id) => write!(f, "room not found or inactive: {id}"),
            Self::InvalidInterval(err) => write!(f, "{err}"),
            Self::InvalidPurpose { length, max } => {
                write!(f, "purpose is {length} characters long; at most {max} allowed")
            }
            Self::SchedulingConflict {
                resource_id,
                date,
                blocking,
            } => {
                write!(
                    f,
                    "room {resource_id} is already booked on {date} for the selected time slot \
                     (blocked by "
                )?;
                for (index, id) in blocking.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{id}")?;
                }
                write!(f, "); please choose a different time")
            }
            Self::Forbidden {
                reservation_id,
                principal_id,
            } => write!(
                f,
                "principal {principal_id} may not modify reservation {reservation_id}"
            ),
            Self::Cancelled(id) => write!(f, "reservation {id} is cancelled"),
            Self::Busy => write!(
                f,
                "another booking is being written for this database; please retry"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReservationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInterval(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IntervalError> for ReservationServiceError {
    fn from(value: IntervalError) -> Self {
        Self::InvalidInterval(value)
    }
}

impl From<RepoError> for ReservationServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "reservation",
                id,
            } => Self::NotFound(id),
            RepoError::Terminal(id) => Self::Cancelled(id),
            RepoError::Busy => Self::Busy,
            other => Self::Repo(other),
        }
    }
}

pub type ReservationServiceResult<T> = Result<T, ReservationServiceError>;

/// Input for `ReservationService::create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateReservationRequest {
    pub resource_id: ResourceId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub purpose: Option<String>,
}

/// Input for `ReservationService::update`. Full replacement of the mutable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReservationRequest {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub purpose: Option<String>,
}

/// Reservation plus display fields resolved at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationDetails {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub resource_name: Option<String>,
    pub resource_capacity: Option<u32>,
    pub owner_display_name: Option<String>,
}

/// Reservation manager facade over repository and directory implementations.
pub struct ReservationService<R, D, I, C = SystemClock> {
    reservations: R,
    resources: D,
    identities: I,
    clock: C,
}

impl<R, D, I> ReservationService<R, D, I, SystemClock>
where
    R: ReservationRepository,
    D: ResourceDirectory,
    I: IdentityProvider,
{
    /// Creates a service on the host clock.
    pub fn new(reservations: R, resources: D, identities: I) -> Self {
        Self::with_clock(reservations, resources, identities, SystemClock)
    }
}

impl<R, D, I, C> ReservationService<R, D, I, C>
where
    R: ReservationRepository,
    D: ResourceDirectory,
    I: IdentityProvider,
    C: Clock,
{
    pub fn with_clock(reservations: R, resources: D, identities: I, clock: C) -> Self {
        Self {
            reservations,
            resources,
            identities,
            clock,
        }
    }

    /// Books a slot for `principal`.
    ///
    /// # Errors
    /// - `ResourceNotFound` when the room is missing or inactive.
    /// - `InvalidInterval` for a past date or `start >= end`.
    /// - `InvalidPurpose` when `purpose` is too long.
    /// - `SchedulingConflict` when a live reservation overlaps, including one
    ///   committed concurrently by another connection.
    pub fn create(
        &self,
        principal: &Principal,
        request: &CreateReservationRequest,
    ) -> ReservationServiceResult<ReservationDetails> {
        let start_time = truncate_to_seconds(request.start_time);
        let end_time = truncate_to_seconds(request.end_time);

        if self
            .resources
            .get_active_resource(request.resource_id)?
            .is_none()
        {
            info!(
                "event=reservation_create module=reservation status=rejected reason=resource_not_found room_id={} principal_id={}",
                request.resource_id, principal.id
            );
            return Err(ReservationServiceError::ResourceNotFound(
                request.resource_id,
            ));
        }

        validate_interval(request.date, start_time, end_time, self.clock.today())?;
        let purpose = checked_purpose(request.purpose.clone())?;

        let now = self.clock.now_epoch_ms();
        let reservation = Reservation {
            id: Uuid::new_v4(),
            resource_id: request.resource_id,
            owner_id: principal.id,
            date: request.date,
            start_time,
            end_time,
            purpose,
            status: ReservationStatus::Confirmed,
            created_at: now,
            updated_at: now,
        };

        self.reservations
            .create_reservation(&reservation)
            .map_err(|err| conflict_or(err, reservation.resource_id, reservation.date))?;

        info!(
            "event=reservation_create module=reservation status=ok reservation_id={} room_id={} principal_id={} date={} start={} end={}",
            reservation.id,
            reservation.resource_id,
            principal.id,
            reservation.date,
            reservation.start_time,
            reservation.end_time
        );
        self.details(reservation)
    }

    /// Reschedules a reservation and replaces its purpose.
    ///
    /// The conflict scan ignores the reservation being updated.
    pub fn update(
        &self,
        principal: &Principal,
        id: ReservationId,
        request: &UpdateReservationRequest,
    ) -> ReservationServiceResult<ReservationDetails> {
        let current = self.require(id)?;
        self.authorize(principal, &current, "reservation_update")?;
        if current.is_cancelled() {
            return Err(ReservationServiceError::Cancelled(id));
        }

        let start_time = truncate_to_seconds(request.start_time);
        let end_time = truncate_to_seconds(request.end_time);
        validate_interval(request.date, start_time, end_time, self.clock.today())?;
        let purpose = checked_purpose(request.purpose.clone())?;

        let updated = Reservation {
            date: request.date,
            start_time,
            end_time,
            purpose,
            updated_at: self.clock.now_epoch_ms(),
            ..current
        };

        self.reservations
            .update_reservation(&updated)
            .map_err(|err| conflict_or(err, updated.resource_id, updated.date))?;

        info!(
            "event=reservation_update module=reservation status=ok reservation_id={} principal_id={} date={} start={} end={}",
            updated.id, principal.id, updated.date, updated.start_time, updated.end_time
        );
        self.details(updated)
    }

    /// Cancels a reservation, releasing its slot.
    ///
    /// Cancelling an already-cancelled reservation succeeds without change.
    pub fn cancel(
        &self,
        principal: &Principal,
        id: ReservationId,
    ) -> ReservationServiceResult<()> {
        let current = self.require(id)?;
        self.authorize(principal, &current, "reservation_cancel")?;

        let changed = self
            .reservations
            .cancel_reservation(id, self.clock.now_epoch_ms())?;
        info!(
            "event=reservation_cancel module=reservation status=ok reservation_id={} principal_id={} changed={}",
            id, principal.id, changed
        );
        Ok(())
    }

    /// Returns whether `[start_time, end_time)` on `(resource_id, date)` is free.
    ///
    /// Advisory only: the answer can be stale as soon as it is returned.
    pub fn check_availability(
        &self,
        resource_id: ResourceId,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> ReservationServiceResult<bool> {
        let start_time = truncate_to_seconds(start_time);
        let end_time = truncate_to_seconds(end_time);
        if start_time >= end_time {
            return Err(IntervalError::EmptyRange {
                start: start_time,
                end: end_time,
            }
            .into());
        }

        let blocking =
            self.reservations
                .find_conflicts(resource_id, date, start_time, end_time, None)?;
        Ok(blocking.is_empty())
    }

    pub fn get(&self, id: ReservationId) -> ReservationServiceResult<ReservationDetails> {
        let reservation = self.require(id)?;
        self.details(reservation)
    }

    pub fn list_all(&self) -> ReservationServiceResult<Vec<ReservationDetails>> {
        self.list(&ReservationListQuery::default())
    }

    pub fn list_by_owner(
        &self,
        owner_id: PrincipalId,
    ) -> ReservationServiceResult<Vec<ReservationDetails>> {
        self.list(&ReservationListQuery::by_owner(owner_id))
    }

    pub fn list_by_resource(
        &self,
        resource_id: ResourceId,
    ) -> ReservationServiceResult<Vec<ReservationDetails>> {
        self.list(&ReservationListQuery::by_resource(resource_id))
    }

    /// Lists reservations matching `query`, cancelled ones included unless
    /// filtered by status.
    pub fn list(
        &self,
        query: &ReservationListQuery,
    ) -> ReservationServiceResult<Vec<ReservationDetails>> {
        self.reservations
            .list_reservations(query)?
            .into_iter()
            .map(|reservation| self.details(reservation))
            .collect()
    }

    fn require(&self, id: ReservationId) -> ReservationServiceResult<Reservation> {
        self.reservations
            .get_reservation(id)?
            .ok_or(ReservationServiceError::NotFound(id))
    }

    fn authorize(
        &self,
        principal: &Principal,
        reservation: &Reservation,
        event: &'static str,
    ) -> ReservationServiceResult<()> {
        if principal.can_manage(reservation.owner_id) {
            return Ok(());
        }
        warn!(
            "event={event} module=reservation status=rejected reason=forbidden reservation_id={} principal_id={}",
            reservation.id, principal.id
        );
        Err(ReservationServiceError::Forbidden {
            reservation_id: reservation.id,
            principal_id: principal.id,
        })
    }

    fn details(&self, reservation: Reservation) -> ReservationServiceResult<ReservationDetails> {
        let resource = self.resources.get_resource(reservation.resource_id)?;
        let owner = self.identities.get_principal(reservation.owner_id)?;
        Ok(ReservationDetails {
            resource_name: resource.as_ref().map(|room| room.name.clone()),
            resource_capacity: resource.as_ref().map(|room| room.capacity),
            owner_display_name: owner.map(|principal| principal.display_name),
            reservation,
        })
    }
}

fn checked_purpose(purpose: Option<String>) -> ReservationServiceResult<Option<String>> {
    let purpose = normalize_purpose(purpose);
    if let Some(text) = purpose.as_deref() {
        let length = text.chars().count();
        if length > PURPOSE_MAX_CHARS {
            return Err(ReservationServiceError::InvalidPurpose {
                length,
                max: PURPOSE_MAX_CHARS,
            });
        }
    }
    Ok(purpose)
}

fn conflict_or(
    err: RepoError,
    resource_id: ResourceId,
    date: NaiveDate,
) -> ReservationServiceError {
    match err {
        RepoError::Conflict { blocking } => {
            info!(
                "event=reservation_conflict module=reservation status=rejected room_id={} date={} blocking_count={}",
                resource_id,
                date,
                blocking.len()
            );
            ReservationServiceError::SchedulingConflict {
                resource_id,
                date,
                blocking,
            }
        }
        RepoError::Busy => {
            warn!(
                "event=reservation_write module=reservation status=busy room_id={} date={}",
                resource_id, date
            );
            ReservationServiceError::Busy
        }
        other => other.into(),
    }
}
