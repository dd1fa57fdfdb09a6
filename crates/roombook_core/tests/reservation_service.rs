use chrono::{NaiveDate, NaiveTime};
use roombook_core::db::open_db_in_memory;
use roombook_core::{
    CreateReservationRequest, FixedClock, IntervalError, Principal, ReservationService,
    ReservationServiceError, ReservationStatus, Resource, ResourceId, Role,
    SqlitePrincipalDirectory, SqliteReservationRepository, SqliteRoomDirectory,
    UpdateReservationRequest,
};
use rusqlite::Connection;
use uuid::Uuid;

type Service<'conn> = ReservationService<
    SqliteReservationRepository<'conn>,
    SqliteRoomDirectory<'conn>,
    SqlitePrincipalDirectory<'conn>,
    FixedClock,
>;

struct Fixture {
    conn: Connection,
    room: ResourceId,
    alice: Principal,
    bob: Principal,
    admin: Principal,
}

impl Fixture {
    fn new() -> Self {
        let conn = open_db_in_memory().unwrap();
        let room = Resource::new("Conference Room A", 10).with_location("Floor 1, Building A");
        let alice = Principal::new("Alice", Role::User);
        let bob = Principal::new("Bob", Role::User);
        let admin = Principal::new("Admin User", Role::Admin);
        {
            let rooms = SqliteRoomDirectory::try_new(&conn).unwrap();
            rooms.register_room(&room).unwrap();
            let principals = SqlitePrincipalDirectory::try_new(&conn).unwrap();
            for principal in [&alice, &bob, &admin] {
                principals.register_principal(principal).unwrap();
            }
        }
        Self {
            conn,
            room: room.id,
            alice,
            bob,
            admin,
        }
    }

    fn service(&self) -> Service<'_> {
        ReservationService::with_clock(
            SqliteReservationRepository::try_new(&self.conn).unwrap(),
            SqliteRoomDirectory::try_new(&self.conn).unwrap(),
            SqlitePrincipalDirectory::try_new(&self.conn).unwrap(),
            FixedClock::on(today()),
        )
    }
}

fn today() -> NaiveDate {
    d(2024, 6, 1)
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn request(room: ResourceId, start: NaiveTime, end: NaiveTime) -> CreateReservationRequest {
    CreateReservationRequest {
        resource_id: room,
        date: today(),
        start_time: start,
        end_time: end,
        purpose: Some("Team sync".to_string()),
    }
}

fn reschedule(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> UpdateReservationRequest {
    UpdateReservationRequest {
        date,
        start_time: start,
        end_time: end,
        purpose: None,
    }
}

#[test]
fn create_returns_confirmed_reservation_with_display_fields() {
    let fx = Fixture::new();
    let service = fx.service();

    let created = service
        .create(&fx.alice, &request(fx.room, t(10, 0), t(11, 0)))
        .unwrap();

    assert_eq!(created.reservation.status, ReservationStatus::Confirmed);
    assert_eq!(created.reservation.owner_id, fx.alice.id);
    assert_eq!(created.reservation.resource_id, fx.room);
    assert_eq!(created.reservation.created_at, created.reservation.updated_at);
    assert_eq!(created.resource_name.as_deref(), Some("Conference Room A"));
    assert_eq!(created.resource_capacity, Some(10));
    assert_eq!(created.owner_display_name.as_deref(), Some("Alice"));
    assert_eq!(service.get(created.reservation.id).unwrap(), created);
}

#[test]
fn overlapping_request_conflicts_but_adjacent_request_succeeds() {
    let fx = Fixture::new();
    let service = fx.service();

    let existing = service
        .create(&fx.alice, &request(fx.room, t(10, 0), t(11, 0)))
        .unwrap();

    let err = service
        .create(&fx.bob, &request(fx.room, t(10, 30), t(11, 30)))
        .unwrap_err();
    match err {
        ReservationServiceError::SchedulingConflict {
            resource_id,
            date,
            blocking,
        } => {
            assert_eq!(resource_id, fx.room);
            assert_eq!(date, today());
            assert_eq!(blocking, vec![existing.reservation.id]);
        }
        other => panic!("unexpected error: {other}"),
    }

    service
        .create(&fx.bob, &request(fx.room, t(11, 0), t(12, 0)))
        .expect("adjacent slot should be free");
}

#[test]
fn empty_or_inverted_range_is_invalid_interval() {
    let fx = Fixture::new();
    let service = fx.service();

    for (start, end) in [(t(10, 0), t(10, 0)), (t(11, 0), t(10, 0))] {
        let err = service
            .create(&fx.alice, &request(fx.room, start, end))
            .unwrap_err();
        assert!(matches!(
            err,
            ReservationServiceError::InvalidInterval(IntervalError::EmptyRange { .. })
        ));
    }
    assert!(service.list_all().unwrap().is_empty());
}

#[test]
fn past_date_is_invalid_interval() {
    let fx = Fixture::new();
    let service = fx.service();

    let mut past = request(fx.room, t(10, 0), t(11, 0));
    past.date = d(2024, 5, 31);
    let err = service.create(&fx.alice, &past).unwrap_err();
    assert!(matches!(
        err,
        ReservationServiceError::InvalidInterval(IntervalError::PastDate { .. })
    ));
}

#[test]
fn unknown_or_inactive_room_is_resource_not_found() {
    let fx = Fixture::new();
    let service = fx.service();

    let missing = Uuid::new_v4();
    let err = service
        .create(&fx.alice, &request(missing, t(10, 0), t(11, 0)))
        .unwrap_err();
    assert!(matches!(err, ReservationServiceError::ResourceNotFound(id) if id == missing));

    SqliteRoomDirectory::try_new(&fx.conn)
        .unwrap()
        .deactivate_room(fx.room, 1_717_200_000_000)
        .unwrap();
    let err = service
        .create(&fx.alice, &request(fx.room, t(10, 0), t(11, 0)))
        .unwrap_err();
    assert!(matches!(err, ReservationServiceError::ResourceNotFound(id) if id == fx.room));
}

#[test]
fn overlong_purpose_is_rejected() {
    let fx = Fixture::new();
    let service = fx.service();

    let mut long = request(fx.room, t(10, 0), t(11, 0));
    long.purpose = Some("x".repeat(501));
    let err = service.create(&fx.alice, &long).unwrap_err();
    assert!(matches!(
        err,
        ReservationServiceError::InvalidPurpose {
            length: 501,
            max: 500
        }
    ));
}

#[test]
fn purpose_is_stored_verbatim_and_padding_counts_toward_the_limit() {
    let fx = Fixture::new();
    let service = fx.service();

    let mut padded = request(fx.room, t(9, 0), t(10, 0));
    padded.purpose = Some("  hi ".to_string());
    let created = service.create(&fx.alice, &padded).unwrap();
    assert_eq!(created.reservation.purpose.as_deref(), Some("  hi "));

    let mut blank = request(fx.room, t(10, 0), t(11, 0));
    blank.purpose = Some("   ".to_string());
    let created = service.create(&fx.alice, &blank).unwrap();
    assert_eq!(created.reservation.purpose, None);

    let mut overlong = request(fx.room, t(11, 0), t(12, 0));
    overlong.purpose = Some(format!("  {}  ", "x".repeat(500)));
    let err = service.create(&fx.alice, &overlong).unwrap_err();
    assert!(matches!(
        err,
        ReservationServiceError::InvalidPurpose {
            length: 504,
            max: 500
        }
    ));
}

#[test]
fn cancel_frees_the_slot_for_an_identical_booking() {
    let fx = Fixture::new();
    let service = fx.service();

    let first = service
        .create(&fx.alice, &request(fx.room, t(10, 0), t(11, 0)))
        .unwrap();
    service.cancel(&fx.alice, first.reservation.id).unwrap();

    let second = service
        .create(&fx.bob, &request(fx.room, t(10, 0), t(11, 0)))
        .expect("cancelled slot should be bookable again");
    assert_ne!(second.reservation.id, first.reservation.id);

    let cancelled = service.get(first.reservation.id).unwrap();
    assert_eq!(cancelled.reservation.status, ReservationStatus::Cancelled);
}

#[test]
fn only_owner_or_admin_may_cancel() {
    let fx = Fixture::new();
    let service = fx.service();

    let booked = service
        .create(&fx.alice, &request(fx.room, t(10, 0), t(11, 0)))
        .unwrap();
    let id = booked.reservation.id;

    let err = service.cancel(&fx.bob, id).unwrap_err();
    assert!(matches!(
        err,
        ReservationServiceError::Forbidden { reservation_id, principal_id }
            if reservation_id == id && principal_id == fx.bob.id
    ));
    assert_eq!(
        service.get(id).unwrap().reservation.status,
        ReservationStatus::Confirmed
    );

    service.cancel(&fx.admin, id).expect("admin may cancel");
    assert_eq!(
        service.get(id).unwrap().reservation.status,
        ReservationStatus::Cancelled
    );
}

#[test]
fn cancelling_twice_is_a_no_op() {
    let fx = Fixture::new();
    let service = fx.service();

    let booked = service
        .create(&fx.alice, &request(fx.room, t(10, 0), t(11, 0)))
        .unwrap();
    service.cancel(&fx.alice, booked.reservation.id).unwrap();
    service.cancel(&fx.alice, booked.reservation.id).unwrap();

    let err = service.cancel(&fx.bob, booked.reservation.id).unwrap_err();
    assert!(matches!(err, ReservationServiceError::Forbidden { .. }));
}

#[test]
fn cancel_or_update_unknown_reservation_is_not_found() {
    let fx = Fixture::new();
    let service = fx.service();
    let missing = Uuid::new_v4();

    assert!(matches!(
        service.cancel(&fx.admin, missing).unwrap_err(),
        ReservationServiceError::NotFound(id) if id == missing
    ));
    assert!(matches!(
        service
            .update(&fx.admin, missing, &reschedule(today(), t(9, 0), t(10, 0)))
            .unwrap_err(),
        ReservationServiceError::NotFound(id) if id == missing
    ));
    assert!(matches!(
        service.get(missing).unwrap_err(),
        ReservationServiceError::NotFound(id) if id == missing
    ));
}

#[test]
fn owner_can_reschedule_over_its_own_slot() {
    let fx = Fixture::new();
    let service = fx.service();

    let booked = service
        .create(&fx.alice, &request(fx.room, t(10, 0), t(11, 0)))
        .unwrap();

    let moved = service
        .update(
            &fx.alice,
            booked.reservation.id,
            &reschedule(today(), t(10, 30), t(11, 30)),
        )
        .expect("overlap with itself is not a conflict");

    assert_eq!(moved.reservation.start_time, t(10, 30));
    assert_eq!(moved.reservation.end_time, t(11, 30));
    assert_eq!(moved.reservation.purpose, None);
    assert_eq!(moved.reservation.owner_id, fx.alice.id);
    assert_eq!(moved.reservation.resource_id, fx.room);
    assert_eq!(moved.reservation.created_at, booked.reservation.created_at);
}

#[test]
fn update_checks_authorization_conflicts_and_dates() {
    let fx = Fixture::new();
    let service = fx.service();

    let alices = service
        .create(&fx.alice, &request(fx.room, t(10, 0), t(11, 0)))
        .unwrap();
    let bobs = service
        .create(&fx.bob, &request(fx.room, t(13, 0), t(14, 0)))
        .unwrap();

    let err = service
        .update(
            &fx.bob,
            alices.reservation.id,
            &reschedule(today(), t(8, 0), t(9, 0)),
        )
        .unwrap_err();
    assert!(matches!(err, ReservationServiceError::Forbidden { .. }));

    let err = service
        .update(
            &fx.alice,
            alices.reservation.id,
            &reschedule(today(), t(13, 30), t(14, 30)),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ReservationServiceError::SchedulingConflict { ref blocking, .. }
            if blocking == &vec![bobs.reservation.id]
    ));

    let err = service
        .update(
            &fx.alice,
            alices.reservation.id,
            &reschedule(d(2024, 5, 1), t(10, 0), t(11, 0)),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ReservationServiceError::InvalidInterval(IntervalError::PastDate { .. })
    ));

    let moved = service
        .update(
            &fx.admin,
            alices.reservation.id,
            &reschedule(d(2024, 6, 2), t(13, 30), t(14, 30)),
        )
        .expect("admin may move to a free slot on another day");
    assert_eq!(moved.reservation.date, d(2024, 6, 2));
    assert_eq!(moved.reservation.owner_id, fx.alice.id);
}

#[test]
fn cancelled_reservation_cannot_be_rescheduled() {
    let fx = Fixture::new();
    let service = fx.service();

    let booked = service
        .create(&fx.alice, &request(fx.room, t(10, 0), t(11, 0)))
        .unwrap();
    service.cancel(&fx.alice, booked.reservation.id).unwrap();

    let err = service
        .update(
            &fx.alice,
            booked.reservation.id,
            &reschedule(today(), t(12, 0), t(13, 0)),
        )
        .unwrap_err();
    assert!(matches!(err, ReservationServiceError::Cancelled(id) if id == booked.reservation.id));
}

#[test]
fn availability_matches_create_outcome() {
    let fx = Fixture::new();
    let service = fx.service();

    service
        .create(&fx.alice, &request(fx.room, t(10, 0), t(11, 0)))
        .unwrap();

    let probes = [
        (t(9, 0), t(10, 0)),
        (t(9, 30), t(10, 30)),
        (t(10, 15), t(10, 45)),
        (t(10, 59), t(12, 0)),
        (t(11, 0), t(12, 0)),
    ];
    for (start, end) in probes {
        let available = service
            .check_availability(fx.room, today(), start, end)
            .unwrap();
        let created = service.create(&fx.bob, &request(fx.room, start, end));
        match created {
            Ok(details) => {
                assert!(available, "{start}-{end} was bookable but reported busy");
                service.cancel(&fx.bob, details.reservation.id).unwrap();
            }
            Err(ReservationServiceError::SchedulingConflict { .. }) => {
                assert!(!available, "{start}-{end} conflicted but reported free");
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}

#[test]
fn availability_rejects_empty_range() {
    let fx = Fixture::new();
    let service = fx.service();

    let err = service
        .check_availability(fx.room, today(), t(10, 0), t(10, 0))
        .unwrap_err();
    assert!(matches!(err, ReservationServiceError::InvalidInterval(_)));
}

#[test]
fn listings_filter_by_owner_and_room() {
    let fx = Fixture::new();
    let service = fx.service();
    let other_room = Resource::new("Board Room", 15);
    SqliteRoomDirectory::try_new(&fx.conn)
        .unwrap()
        .register_room(&other_room)
        .unwrap();

    service
        .create(&fx.alice, &request(fx.room, t(9, 0), t(10, 0)))
        .unwrap();
    service
        .create(&fx.alice, &request(other_room.id, t(9, 0), t(10, 0)))
        .unwrap();
    service
        .create(&fx.bob, &request(fx.room, t(10, 0), t(11, 0)))
        .unwrap();

    assert_eq!(service.list_all().unwrap().len(), 3);
    assert_eq!(service.list_by_owner(fx.alice.id).unwrap().len(), 2);
    assert_eq!(service.list_by_owner(fx.admin.id).unwrap().len(), 0);

    let board = service.list_by_resource(other_room.id).unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].resource_name.as_deref(), Some("Board Room"));
}

#[test]
fn sub_second_times_are_truncated_before_validation() {
    let fx = Fixture::new();
    let service = fx.service();

    let start = NaiveTime::from_hms_milli_opt(10, 0, 0, 100).unwrap();
    let end = NaiveTime::from_hms_milli_opt(10, 0, 0, 900).unwrap();
    let err = service
        .create(&fx.alice, &request(fx.room, start, end))
        .unwrap_err();
    assert!(matches!(err, ReservationServiceError::InvalidInterval(_)));
}

#[test]
fn details_serialize_flat() {
    let fx = Fixture::new();
    let service = fx.service();

    let created = service
        .create(&fx.alice, &request(fx.room, t(10, 0), t(11, 0)))
        .unwrap();
    let json = serde_json::to_value(&created).unwrap();

    assert_eq!(json["status"], "confirmed");
    assert_eq!(json["date"], "2024-06-01");
    assert_eq!(json["start_time"], "10:00:00");
    assert_eq!(json["resource_name"], "Conference Room A");
    assert_eq!(json["owner_display_name"], "Alice");
}
