//! Domain model for rooms, principals, and reservations.
//!
//! # Invariants
//! - Every record is identified by a stable UUID that is never reused.
//! - Nothing is hard-deleted: rooms carry an active flag, reservations a
//!   terminal `Cancelled` status.

pub mod principal;
pub mod reservation;
pub mod room;
