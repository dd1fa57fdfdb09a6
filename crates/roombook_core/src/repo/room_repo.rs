//! Resource directory contract and SQLite-backed room store.
//!
//! # Invariants
//! - Room names are unique, case-insensitively.
//! - Deactivation flips `is_active`; rooms are never deleted.

use crate::model::room::{Resource, ResourceId};
use crate::repo::{
    bool_to_int, ensure_connection_ready, is_unique_violation, parse_uuid, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row};

const ROOM_SELECT_SQL: &str = "SELECT
    id,
    name,
    location,
    capacity,
    description,
    is_active
FROM rooms";

/// Lookup contract the reservation manager uses to resolve resources.
pub trait ResourceDirectory {
    /// Returns the resource, active or not.
    fn get_resource(&self, id: ResourceId) -> RepoResult<Option<Resource>>;

    /// Returns the resource only when it exists and accepts reservations.
    fn get_active_resource(&self, id: ResourceId) -> RepoResult<Option<Resource>> {
        Ok(self.get_resource(id)?.filter(Resource::is_bookable))
    }
}

/// SQLite-backed room directory.
pub struct SqliteRoomDirectory<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRoomDirectory<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["rooms"])?;
        Ok(Self { conn })
    }

    /// Registers a room. Fails with `DuplicateName` on a name clash.
    pub fn register_room(&self, room: &Resource) -> RepoResult<ResourceId> {
        let inserted = self.conn.execute(
            "INSERT INTO rooms (id, name, location, capacity, description, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                room.id.to_string(),
                room.name.trim(),
                room.location.as_deref(),
                room.capacity,
                room.description.as_deref(),
                bool_to_int(room.is_active),
            ],
        );
        match inserted {
            Ok(_) => Ok(room.id),
            Err(err) if is_unique_violation(&err) => {
                Err(RepoError::DuplicateName(room.name.trim().to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Soft-deletes a room, stamping `updated_at` (epoch ms). Existing
    /// reservations are left untouched.
    pub fn deactivate_room(&self, id: ResourceId, updated_at: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE rooms
             SET
                is_active = 0,
                updated_at = ?2
             WHERE id = ?1;",
            params![id.to_string(), updated_at],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "room", id });
        }
        Ok(())
    }

    /// Lists rooms ordered by name.
    pub fn list_rooms(&self, active_only: bool) -> RepoResult<Vec<Resource>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ROOM_SELECT_SQL}
             WHERE (?1 = 0 OR is_active = 1)
             ORDER BY name COLLATE NOCASE ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(active_only)])?;
        let mut rooms = Vec::new();
        while let Some(row) = rows.next()? {
            rooms.push(parse_room_row(row)?);
        }
        Ok(rooms)
    }
}

impl ResourceDirectory for SqliteRoomDirectory<'_> {
    fn get_resource(&self, id: ResourceId) -> RepoResult<Option<Resource>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ROOM_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_room_row(row)?));
        }
        Ok(None)
    }
}

fn parse_room_row(row: &Row<'_>) -> RepoResult<Resource> {
    let id_text: String = row.get("id")?;
    let capacity: i64 = row.get("capacity")?;
    let capacity = u32::try_from(capacity).map_err(|_| {
        RepoError::InvalidData(format!("invalid capacity `{capacity}` in rooms.capacity"))
    })?;
    let is_active = match row.get::<_, i64>("is_active")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_active value `{other}` in rooms.is_active"
            )));
        }
    };

    Ok(Resource {
        id: parse_uuid(&id_text, "rooms.id")?,
        name: row.get("name")?,
        location: row.get("location")?,
        capacity,
        description: row.get("description")?,
        is_active,
    })
}
