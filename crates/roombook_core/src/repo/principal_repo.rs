//! Identity provider contract and SQLite-backed principal store.

use crate::model::principal::{Principal, PrincipalId, Role};
use crate::repo::{ensure_connection_ready, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

/// Lookup contract for principals referenced by reservations.
pub trait IdentityProvider {
    fn get_principal(&self, id: PrincipalId) -> RepoResult<Option<Principal>>;
}

/// SQLite-backed principal directory.
pub struct SqlitePrincipalDirectory<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePrincipalDirectory<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["principals"])?;
        Ok(Self { conn })
    }

    pub fn register_principal(&self, principal: &Principal) -> RepoResult<PrincipalId> {
        self.conn.execute(
            "INSERT INTO principals (id, display_name, role) VALUES (?1, ?2, ?3);",
            params![
                principal.id.to_string(),
                principal.display_name.as_str(),
                principal.role.as_str(),
            ],
        )?;
        Ok(principal.id)
    }

    pub fn list_principals(&self) -> RepoResult<Vec<Principal>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, display_name, role
             FROM principals
             ORDER BY display_name ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut principals = Vec::new();
        while let Some(row) = rows.next()? {
            principals.push(parse_principal_row(row)?);
        }
        Ok(principals)
    }
}

impl IdentityProvider for SqlitePrincipalDirectory<'_> {
    fn get_principal(&self, id: PrincipalId) -> RepoResult<Option<Principal>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, display_name, role
             FROM principals
             WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_principal_row(row)?));
        }
        Ok(None)
    }
}

fn parse_principal_row(row: &Row<'_>) -> RepoResult<Principal> {
    let id_text: String = row.get("id")?;
    let role_text: String = row.get("role")?;
    let role = Role::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in principals.role"))
    })?;

    Ok(Principal {
        id: parse_uuid(&id_text, "principals.id")?,
        display_name: row.get("display_name")?,
        role,
    })
}
