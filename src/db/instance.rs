//! Instance repository for provider-session state

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::{Error, Result};

/// Lifecycle state of a provider session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Uninitialized,
    Pending,
    WaitingQr,
    Connected,
    Disconnected,
    Error,
    Canceled,
    LoggedOut,
}

impl InstanceStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Pending => "pending",
            Self::WaitingQr => "waiting_qr",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
            Self::Canceled => "canceled",
            Self::LoggedOut => "logged_out",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "uninitialized" => Some(Self::Uninitialized),
            "pending" => Some(Self::Pending),
            "waiting_qr" => Some(Self::WaitingQr),
            "connected" => Some(Self::Connected),
            "disconnected" => Some(Self::Disconnected),
            "error" => Some(Self::Error),
            "canceled" => Some(Self::Canceled),
            "logged_out" => Some(Self::LoggedOut),
            _ => None,
        }
    }
}

/// One organization's connection to the messaging provider
#[derive(Debug, Clone)]
pub struct Instance {
    pub id: String,
    pub organization_id: String,
    pub label: String,
    pub phone_number: Option<String>,
    pub provider_session_id: Option<String>,
    pub provider_token: Option<String>,
    pub status: InstanceStatus,
    pub is_connected: bool,
    pub qr_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Instance {
    /// Whether the provider session id and credential are both present
    #[must_use]
    pub const fn has_credentials(&self) -> bool {
        self.provider_session_id.is_some() && self.provider_token.is_some()
    }
}

/// Instance repository
#[derive(Clone)]
pub struct InstanceRepo {
    pool: DbPool,
}

const COLUMNS: &str = "id, organization_id, label, phone_number, provider_session_id, \
                       provider_token, status, is_connected, qr_code, created_at, updated_at";

impl InstanceRepo {
    /// Create a new instance repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new instance row in `uninitialized` state
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn create(
        &self,
        organization_id: &str,
        label: &str,
        phone_number: Option<&str>,
    ) -> Result<Instance> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO instances (id, organization_id, label, phone_number, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            rusqlite::params![&id, organization_id, label, phone_number, &now],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        // Release the pooled connection before find_required re-acquires one;
        // holding it would deadlock a single-connection pool.
        drop(conn);

        self.find_required(&id)
    }

    /// Find an instance by id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find(&self, id: &str) -> Result<Option<Instance>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let instance = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM instances WHERE id = ?1"),
                [id],
                row_to_instance,
            )
            .ok();

        Ok(instance)
    }

    /// Find an instance by id, failing when it does not exist
    ///
    /// # Errors
    ///
    /// Returns `InstanceNotFound` if the row is missing
    pub fn find_required(&self, id: &str) -> Result<Instance> {
        self.find(id)?
            .ok_or_else(|| Error::InstanceNotFound(id.to_string()))
    }

    /// Persist the provider session id and credential after session creation
    /// and move the instance to `pending`
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn set_provider_session(&self, id: &str, session_id: &str, token: &str) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "UPDATE instances
             SET provider_session_id = ?1, provider_token = ?2, status = 'pending',
                 updated_at = ?3
             WHERE id = ?4",
            rusqlite::params![session_id, token, Utc::now().to_rfc3339(), id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Store a freshly retrieved QR payload and mark the instance waiting
    /// for a scan
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn set_qr_code(&self, id: &str, qr_code: &str) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "UPDATE instances
             SET qr_code = ?1, status = 'waiting_qr', updated_at = ?2
             WHERE id = ?3",
            rusqlite::params![qr_code, Utc::now().to_rfc3339(), id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Mark the instance connected, persisting the bound number
    ///
    /// The stored QR payload is cleared in the same statement: it must never
    /// be served once the session is connected.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn mark_connected(&self, id: &str, phone_number: Option<&str>) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "UPDATE instances
             SET status = 'connected', is_connected = 1, qr_code = NULL,
                 phone_number = COALESCE(?1, phone_number), updated_at = ?2
             WHERE id = ?3",
            rusqlite::params![phone_number, Utc::now().to_rfc3339(), id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Mark the instance not connected with the given terminal or side state
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn mark_disconnected(&self, id: &str, status: InstanceStatus) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "UPDATE instances
             SET status = ?1, is_connected = 0, updated_at = ?2
             WHERE id = ?3",
            rusqlite::params![status.as_str(), Utc::now().to_rfc3339(), id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// List all instances for an organization
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_for_organization(&self, organization_id: &str) -> Result<Vec<Instance>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM instances WHERE organization_id = ?1 ORDER BY created_at"
            ))
            .map_err(|e| Error::Database(e.to_string()))?;

        let instances = stmt
            .query_map([organization_id], row_to_instance)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(instances)
    }
}

fn row_to_instance(row: &rusqlite::Row<'_>) -> rusqlite::Result<Instance> {
    Ok(Instance {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        label: row.get(2)?,
        phone_number: row.get(3)?,
        provider_session_id: row.get(4)?,
        provider_token: row.get(5)?,
        status: InstanceStatus::from_str(&row.get::<_, String>(6)?)
            .unwrap_or(InstanceStatus::Uninitialized),
        is_connected: row.get::<_, i64>(7)? != 0,
        qr_code: row.get(8)?,
        created_at: parse_datetime(&row.get::<_, String>(9)?),
        updated_at: parse_datetime(&row.get::<_, String>(10)?),
    })
}

pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn setup() -> InstanceRepo {
        InstanceRepo::new(init_memory().unwrap())
    }

    #[test]
    fn test_create_and_find() {
        let repo = setup();

        let instance = repo
            .create("org-1", "Sales line", Some("+55 11 99999-8888"))
            .unwrap();

        assert_eq!(instance.organization_id, "org-1");
        assert_eq!(instance.status, InstanceStatus::Uninitialized);
        assert!(!instance.is_connected);
        assert!(!instance.has_credentials());

        let found = repo.find(&instance.id).unwrap().unwrap();
        assert_eq!(found.label, "Sales line");
    }

    #[test]
    fn test_credentials_move_to_pending() {
        let repo = setup();
        let instance = repo.create("org-1", "Line", Some("5511999998888")).unwrap();

        repo.set_provider_session(&instance.id, "sess-abc", "tok-xyz")
            .unwrap();

        let updated = repo.find_required(&instance.id).unwrap();
        assert_eq!(updated.status, InstanceStatus::Pending);
        assert!(updated.has_credentials());
    }

    #[test]
    fn test_connect_clears_qr_in_same_update() {
        let repo = setup();
        let instance = repo.create("org-1", "Line", Some("5511999998888")).unwrap();

        repo.set_provider_session(&instance.id, "sess", "tok").unwrap();
        repo.set_qr_code(&instance.id, "qr-payload").unwrap();

        let waiting = repo.find_required(&instance.id).unwrap();
        assert_eq!(waiting.status, InstanceStatus::WaitingQr);
        assert_eq!(waiting.qr_code.as_deref(), Some("qr-payload"));

        repo.mark_connected(&instance.id, Some("5511999998888")).unwrap();

        let connected = repo.find_required(&instance.id).unwrap();
        assert!(connected.is_connected);
        assert_eq!(connected.status, InstanceStatus::Connected);
        // QR payload and a connected flag never coexist
        assert!(connected.qr_code.is_none());
    }

    #[test]
    fn test_disconnect_keeps_credentials() {
        let repo = setup();
        let instance = repo.create("org-1", "Line", None).unwrap();

        repo.set_provider_session(&instance.id, "sess", "tok").unwrap();
        repo.mark_connected(&instance.id, None).unwrap();
        repo.mark_disconnected(&instance.id, InstanceStatus::Disconnected)
            .unwrap();

        let updated = repo.find_required(&instance.id).unwrap();
        assert!(!updated.is_connected);
        assert_eq!(updated.status, InstanceStatus::Disconnected);
        // Soft state change: credentials survive a disconnect
        assert!(updated.has_credentials());
    }

    #[test]
    fn test_find_required_missing() {
        let repo = setup();
        let err = repo.find_required("nope").unwrap_err();
        assert!(matches!(err, Error::InstanceNotFound(_)));
    }
}
