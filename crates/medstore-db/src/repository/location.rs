//! # Location Repository
//!
//! Database operations for the Room → Rack → Shelf tree.
//!
//! ## Delete Guards
//! ```text
//! DELETE location
//!      │
//!      ├── has child locations?   ─► DbError::InUse (nothing deleted)
//!      ├── items placed in it?    ─► DbError::InUse (nothing deleted)
//!      └── otherwise              ─► row removed
//! ```

use chrono::Utc;
use medstore_core::input::{patch_text, LocationDraft, LocationPatch};
use medstore_core::location::{build_tree, validate_parent, LocationNode};
use medstore_core::{Location, LocationType};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const LOCATION_COLUMNS: &str =
    "id, name, description, location_type, parent_id, created_at, updated_at";

/// Filters for the flat location list.
#[derive(Debug, Clone, Default)]
pub struct LocationFilter {
    pub location_type: Option<LocationType>,
    pub parent: Option<String>,
}

/// Repository for location database operations.
#[derive(Debug, Clone)]
pub struct LocationRepository {
    pool: SqlitePool,
}

impl LocationRepository {
    /// Creates a new LocationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LocationRepository { pool }
    }

    /// Creates a location after checking the parent rules.
    ///
    /// ## Returns
    /// * `Err(DbError::InvalidReference)` - parent id does not exist
    /// * `Err(DbError::Core(Hierarchy))` - Room with parent, Rack outside a Room, ...
    pub async fn create(&self, draft: LocationDraft) -> DbResult<Location> {
        let draft = draft.normalize()?;
        debug!(name = %draft.name, kind = %draft.location_type, "Creating location");

        let mut conn = self.pool.acquire().await?;

        let parent = match draft.parent.as_deref() {
            Some(parent_id) => Some(
                fetch_location(&mut *conn, parent_id)
                    .await?
                    .ok_or_else(|| DbError::invalid_reference("parent location", parent_id))?,
            ),
            None => None,
        };
        validate_parent(draft.location_type, parent.as_ref().map(|p| p.location_type))?;

        let now = Utc::now();
        let location = Location {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            description: draft.description,
            location_type: draft.location_type,
            parent_id: parent.map(|p| p.id),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO locations (id, name, description, location_type, parent_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&location.id)
        .bind(&location.name)
        .bind(&location.description)
        .bind(location.location_type)
        .bind(&location.parent_id)
        .bind(location.created_at)
        .bind(location.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(location)
    }

    /// Gets a location by its ID.
    pub async fn get(&self, id: &str) -> DbResult<Location> {
        let mut conn = self.pool.acquire().await?;
        fetch_location(&mut *conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Location", id))
    }

    /// Lists locations, sorted by type then name.
    pub async fn list(&self, filter: &LocationFilter) -> DbResult<Vec<Location>> {
        let mut query = sqlx::QueryBuilder::new(format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE 1 = 1"
        ));
        if let Some(kind) = filter.location_type {
            query.push(" AND location_type = ").push_bind(kind);
        }
        if let Some(parent) = &filter.parent {
            query.push(" AND parent_id = ").push_bind(parent.clone());
        }
        query.push(
            " ORDER BY CASE location_type WHEN 'room' THEN 0 WHEN 'rack' THEN 1 ELSE 2 END, name",
        );

        let locations = query
            .build_query_as::<Location>()
            .fetch_all(&self.pool)
            .await?;
        Ok(locations)
    }

    /// Builds the nested Room → Rack → Shelf view with item counts.
    pub async fn hierarchy(&self) -> DbResult<Vec<LocationNode>> {
        let locations = self.list(&LocationFilter::default()).await?;

        let counts: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT loc_id, COUNT(*) FROM (
                SELECT room_id AS loc_id FROM items
                UNION ALL SELECT rack_id FROM items WHERE rack_id IS NOT NULL
                UNION ALL SELECT shelf_id FROM items WHERE shelf_id IS NOT NULL
            )
            GROUP BY loc_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let counts: HashMap<String, i64> = counts.into_iter().collect();
        Ok(build_tree(locations, &counts))
    }

    /// Renames or re-describes a location. Type and parent never change.
    pub async fn update(&self, id: &str, patch: LocationPatch) -> DbResult<Location> {
        let patch = patch.normalize()?;
        let mut location = self.get(id).await?;
        debug!(id = %id, "Updating location");

        if let Some(name) = patch.name {
            location.name = name;
        }
        location.description = patch_text(location.description, patch.description);
        location.updated_at = Utc::now();

        sqlx::query("UPDATE locations SET name = ?2, description = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(&location.id)
            .bind(&location.name)
            .bind(&location.description)
            .bind(location.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(location)
    }

    /// Deletes a location that has no children and holds no items.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        if fetch_location(&mut *tx, id).await?.is_none() {
            return Err(DbError::not_found("Location", id));
        }

        let children: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations WHERE parent_id = ?1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if children > 0 {
            return Err(DbError::in_use(
                "location",
                format!("it contains {children} child location(s)"),
            ));
        }

        let items: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM items WHERE room_id = ?1 OR rack_id = ?1 OR shelf_id = ?1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if items > 0 {
            return Err(DbError::in_use(
                "location",
                format!("{items} item(s) are stored there"),
            ));
        }

        debug!(id = %id, "Deleting location");
        sqlx::query("DELETE FROM locations WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Counts locations.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Shared helpers (also used inside other repositories' transactions)
// =============================================================================

pub(crate) async fn fetch_location(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Location>> {
    let location = sqlx::query_as::<_, Location>(&format!(
        "SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(location)
}

/// Loads `id` followed by its ancestors, nearest first.
pub(crate) async fn location_path(conn: &mut SqliteConnection, id: &str) -> DbResult<Vec<Location>> {
    let mut path = Vec::with_capacity(3);
    let mut next = Some(id.to_string());

    // Three tiers at most; the bound also stops a corrupted cycle.
    while let Some(current) = next.take() {
        if path.len() == 3 {
            break;
        }
        let location = fetch_location(&mut *conn, &current)
            .await?
            .ok_or_else(|| DbError::invalid_reference("location", current.as_str()))?;
        next = location.parent_id.clone();
        path.push(location);
    }

    Ok(path)
}

// =============================================================================
// Unit Tests
// =============================================================================
