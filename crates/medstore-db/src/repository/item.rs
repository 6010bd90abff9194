//! # Item Repository
//!
//! Database operations for catalog items.
//!
//! ## Key Operations
//! - Create with barcode assignment and placement checks
//! - Filtered, paginated listing
//! - Descriptive updates (counters are only ever written by the ledger)
//! - Barcode lookup for the scanner page
//!
//! ## Barcode Assignment
//! ```text
//! barcodeType = existing ──► validate_barcode() ──┐
//! barcodeType = generate ──► generate_barcode() ──┤
//!                                                 ▼
//!                                INSERT ... (UNIQUE index on barcode)
//!                                                 │
//!                         collision ──► "Barcode 'X' already exists"
//! ```

use chrono::Utc;
use medstore_core::barcode::generate_barcode;
use medstore_core::input::{patch_text, BarcodeChoice, ItemDraft, ItemPatch};
use medstore_core::location::{check_placement_shape, validate_placement};
use medstore_core::validation::validate_search_query;
use medstore_core::{
    CategoryType, CurrentState, Item, ItemLocation, ItemStatus, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::location::fetch_location;
use super::Page;
use crate::error::{DbError, DbResult};

pub(crate) const ITEM_COLUMNS: &str = "id, name, description, category, category_type, barcode, \
     room_id, rack_id, shelf_id, supplier_id, \
     quantity, available_quantity, in_maintenance, in_session, rented, \
     reorder_level, unit_cost_cents, last_maintenance_date, notes, \
     created_at, updated_at, version";

/// SQL form of [`ItemStatus::derive`]; the two must agree.
pub(crate) const STATUS_SQL: &str = "CASE \
     WHEN quantity <= 0 THEN 'Out of Stock' \
     WHEN available_quantity <= 0 THEN 'Fully Allocated' \
     WHEN quantity <= reorder_level THEN 'Low Stock' \
     ELSE 'Available' END";

/// Filters for the item list.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub category: Option<String>,
    pub category_type: Option<CategoryType>,
    pub status: Option<ItemStatus>,
    pub room: Option<String>,
    pub supplier: Option<String>,
    /// Matches name, barcode or category.
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Repository for item database operations.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    /// Creates a new ItemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Creates an item with everything available.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - barcode in use; nothing is written
    /// * `Err(DbError::InvalidReference)` - unknown room/rack/shelf/supplier
    /// * `Err(DbError::Core(..))` - invalid field or placement
    pub async fn create(&self, draft: ItemDraft) -> DbResult<Item> {
        let draft = draft.normalize()?;
        let now = Utc::now();
        let barcode = match draft.barcode_choice()? {
            BarcodeChoice::Existing(code) => code,
            BarcodeChoice::Generate => generate_barcode(now, &mut rand::thread_rng()),
        };

        debug!(name = %draft.name, barcode = %barcode, "Creating item");

        let mut conn = self.pool.acquire().await?;
        check_item_placement(&mut *conn, &draft.location).await?;
        if let Some(supplier) = draft.supplier.as_deref() {
            check_supplier(&mut *conn, supplier).await?;
        }

        let item = Item {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            description: draft.description,
            category: draft.category,
            category_type: draft.category_type.unwrap_or_default(),
            barcode,
            location: draft.location,
            supplier_id: draft.supplier,
            quantity: draft.quantity,
            available_quantity: draft.quantity,
            current_state: CurrentState::default(),
            reorder_level: draft.reorder_level,
            unit_cost_cents: draft.unit_cost,
            last_maintenance_date: None,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        sqlx::query(&format!(
            "INSERT INTO items ({ITEM_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)"
        ))
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.category)
        .bind(item.category_type)
        .bind(&item.barcode)
        .bind(&item.location.room_id)
        .bind(&item.location.rack_id)
        .bind(&item.location.shelf_id)
        .bind(&item.supplier_id)
        .bind(item.quantity)
        .bind(item.available_quantity)
        .bind(item.current_state.in_maintenance)
        .bind(item.current_state.in_session)
        .bind(item.current_state.rented)
        .bind(item.reorder_level)
        .bind(item.unit_cost_cents)
        .bind(item.last_maintenance_date)
        .bind(&item.notes)
        .bind(item.created_at)
        .bind(item.updated_at)
        .bind(item.version)
        .execute(&mut *conn)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("Barcode", &item.barcode))?;

        Ok(item)
    }

    /// Gets an item by its ID.
    pub async fn get(&self, id: &str) -> DbResult<Item> {
        let mut conn = self.pool.acquire().await?;
        fetch_item(&mut *conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))
    }

    /// Looks an item up by barcode (exact match after trimming).
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Item> {
        let barcode = barcode.trim();
        sqlx::query_as::<_, Item>(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE barcode = ?1"))
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Item with barcode", barcode))
    }

    /// Lists items matching `filter`, sorted by name.
    pub async fn list(&self, filter: &ItemFilter) -> DbResult<Page<Item>> {
        let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = filter.offset.unwrap_or(0);
        let search = match filter.search.as_deref() {
            Some(s) => Some(validate_search_query(s)?).filter(|s| !s.is_empty()),
            None => None,
        };

        debug!(?filter, "Listing items");

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM items WHERE 1 = 1");
        push_filters(&mut count, filter, search.as_deref());
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {ITEM_COLUMNS} FROM items WHERE 1 = 1"));
        push_filters(&mut query, filter, search.as_deref());
        query
            .push(" ORDER BY name COLLATE NOCASE, id LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(offset));

        let items = query.build_query_as::<Item>().fetch_all(&self.pool).await?;

        Ok(Page {
            data: items,
            total,
            limit,
            offset,
        })
    }

    /// Applies a descriptive update. Counters are left untouched.
    pub async fn update(&self, id: &str, patch: ItemPatch) -> DbResult<Item> {
        let patch = patch.normalize()?;
        let barcode_choice = patch.barcode_choice()?;

        let mut conn = self.pool.acquire().await?;
        let mut item = fetch_item(&mut *conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))?;
        let seen_version = item.version;

        debug!(id = %id, version = seen_version, "Updating item");

        if let Some(name) = patch.name {
            item.name = name;
        }
        item.description = patch_text(item.description, patch.description);
        if let Some(category) = patch.category {
            item.category = category;
        }
        if let Some(category_type) = patch.category_type {
            item.category_type = category_type;
        }
        match barcode_choice {
            Some(BarcodeChoice::Existing(code)) => item.barcode = code,
            Some(BarcodeChoice::Generate) => {
                item.barcode = generate_barcode(Utc::now(), &mut rand::thread_rng())
            }
            None => {}
        }
        if let Some(location) = patch.location {
            check_item_placement(&mut *conn, &location).await?;
            item.location = location;
        }
        if patch.supplier.is_some() {
            item.supplier_id = patch_text(item.supplier_id, patch.supplier);
            if let Some(supplier) = item.supplier_id.as_deref() {
                check_supplier(&mut *conn, supplier).await?;
            }
        }
        if let Some(level) = patch.reorder_level {
            item.reorder_level = level;
        }
        if let Some(cost) = patch.unit_cost {
            item.unit_cost_cents = cost;
        }
        item.notes = patch_text(item.notes, patch.notes);
        item.updated_at = Utc::now();
        item.version = seen_version + 1;

        let result = sqlx::query(
            r#"
            UPDATE items SET
                name = ?3, description = ?4, category = ?5, category_type = ?6,
                barcode = ?7, room_id = ?8, rack_id = ?9, shelf_id = ?10,
                supplier_id = ?11, reorder_level = ?12, unit_cost_cents = ?13,
                notes = ?14, updated_at = ?15, version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(&item.id)
        .bind(seen_version)
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.category)
        .bind(item.category_type)
        .bind(&item.barcode)
        .bind(&item.location.room_id)
        .bind(&item.location.rack_id)
        .bind(&item.location.shelf_id)
        .bind(&item.supplier_id)
        .bind(item.reorder_level)
        .bind(item.unit_cost_cents)
        .bind(&item.notes)
        .bind(item.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("Barcode", &item.barcode))?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict {
                entity: "Item".to_string(),
                id: id.to_string(),
            });
        }

        Ok(item)
    }

    /// Deletes an item together with its ledger and sub-records.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting item");

        let result = sqlx::query("DELETE FROM items WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }
        Ok(())
    }

    /// Counts items.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub(crate) async fn fetch_item(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Item>> {
    let item = sqlx::query_as::<_, Item>(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(item)
}

/// Loads the referenced locations and checks the Room → Rack → Shelf nesting.
async fn check_item_placement(conn: &mut SqliteConnection, placement: &ItemLocation) -> DbResult<()> {
    check_placement_shape(placement)?;

    let room = fetch_location(&mut *conn, &placement.room_id)
        .await?
        .ok_or_else(|| DbError::invalid_reference("room", placement.room_id.as_str()))?;

    let rack = match placement.rack_id.as_deref() {
        Some(id) => Some(
            fetch_location(&mut *conn, id)
                .await?
                .ok_or_else(|| DbError::invalid_reference("rack", id))?,
        ),
        None => None,
    };

    let shelf = match placement.shelf_id.as_deref() {
        Some(id) => Some(
            fetch_location(&mut *conn, id)
                .await?
                .ok_or_else(|| DbError::invalid_reference("shelf", id))?,
        ),
        None => None,
    };

    validate_placement(&room, rack.as_ref(), shelf.as_ref())?;
    Ok(())
}

async fn check_supplier(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM suppliers WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    match exists {
        Some(_) => Ok(()),
        None => Err(DbError::invalid_reference("supplier", id)),
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &ItemFilter, search: Option<&str>) {
    if let Some(category) = &filter.category {
        query.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(category_type) = filter.category_type {
        query.push(" AND category_type = ").push_bind(category_type);
    }
    if let Some(status) = filter.status {
        query
            .push(format!(" AND ({STATUS_SQL}) = "))
            .push_bind(status.label());
    }
    if let Some(room) = &filter.room {
        query.push(" AND room_id = ").push_bind(room.clone());
    }
    if let Some(supplier) = &filter.supplier {
        query.push(" AND supplier_id = ").push_bind(supplier.clone());
    }
    if let Some(term) = search {
        let pattern = like_pattern(term);
        query
            .push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR barcode LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR category LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use medstore_core::{BarcodeType, StockCounters};

    fn draft(room: &str, name: &str) -> ItemDraft {
        ItemDraft {
            name: name.to_string(),
            description: None,
            category: "Manikins".to_string(),
            category_type: Some(CategoryType::Manikin),
            barcode_type: None,
            barcode: None,
            location: ItemLocation::room(room),
            supplier: None,
            quantity: 6,
            reorder_level: 2,
            unit_cost: 125_000,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_starts_fully_available() {
        let db = test_db().await;
        let room = room(&db, "A").await;

        let item = db.items().create(draft(&room.id, "SimMan")).await.unwrap();
        assert_eq!(item.counters(), StockCounters::new_stock(6));
        assert_eq!(item.barcode.len(), 13);
        assert!(item.barcode.starts_with("20"));

        let fetched = db.items().get(&item.id).await.unwrap();
        assert_eq!(fetched.id, item.id);
        assert_eq!(fetched.barcode, item.barcode);
        assert_eq!(fetched.counters(), item.counters());
    }

    #[tokio::test]
    async fn test_duplicate_existing_barcode_creates_nothing() {
        let db = test_db().await;
        let room = room(&db, "A").await;

        let mut first = draft(&room.id, "First");
        first.barcode_type = Some(BarcodeType::Existing);
        first.barcode = Some("0360-0001".to_string());
        db.items().create(first.clone()).await.unwrap();

        first.name = "Second".to_string();
        let err = db.items().create(first).await.unwrap_err();
        assert_eq!(err.to_string(), "Barcode '0360-0001' already exists");
        assert_eq!(db.items().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_placement_must_nest() {
        let db = test_db().await;
        let a = room(&db, "A").await;
        let b = room(&db, "B").await;
        let rack_in_b = rack(&db, &b, "R1").await;

        let mut bad = draft(&a.id, "Misplaced");
        bad.location.rack_id = Some(rack_in_b.id.clone());
        assert!(db.items().create(bad).await.is_err());

        let mut unknown = draft("no-such-room", "Lost");
        unknown.location = ItemLocation::room("no-such-room");
        assert!(matches!(
            db.items().create(unknown).await,
            Err(DbError::InvalidReference { .. })
        ));
        assert_eq!(db.items().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_barcode_lookup() {
        let db = test_db().await;
        let room = room(&db, "A").await;
        let item = db.items().create(draft(&room.id, "SimMan")).await.unwrap();

        let found = db.items().get_by_barcode(&format!(" {} ", item.barcode)).await.unwrap();
        assert_eq!(found.id, item.id);
        assert!(matches!(
            db.items().get_by_barcode("nope").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_filters_and_search() {
        let db = test_db().await;
        let a = room(&db, "A").await;
        let b = room(&db, "B").await;
        db.items().create(draft(&a.id, "IV Arm")).await.unwrap();
        db.items().create(draft(&b.id, "Airway Trainer")).await.unwrap();
        let mut gloves = draft(&b.id, "Nitrile Gloves 100%");
        gloves.category = "Consumables".to_string();
        gloves.category_type = Some(CategoryType::Consumable);
        gloves.quantity = 1;
        db.items().create(gloves).await.unwrap();

        let in_b = db
            .items()
            .list(&ItemFilter {
                room: Some(b.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(in_b.total, 2);
        assert_eq!(in_b.data[0].name, "Airway Trainer");

        let searched = db
            .items()
            .list(&ItemFilter {
                search: Some("100%".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(searched.total, 1);

        let low = db
            .items()
            .list(&ItemFilter {
                status: Some(ItemStatus::LowStock),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(low.data.len(), 1);
        assert_eq!(low.data[0].status(), ItemStatus::LowStock);

        let paged = db
            .items()
            .list(&ItemFilter {
                limit: Some(1),
                offset: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(paged.total, 3);
        assert_eq!(paged.data.len(), 1);
        assert_eq!(paged.data[0].name, "IV Arm");
    }

    #[tokio::test]
    async fn test_update_leaves_counters_and_bumps_version() {
        let db = test_db().await;
        let room = room(&db, "A").await;
        let item = db.items().create(draft(&room.id, "SimMan")).await.unwrap();

        let updated = db
            .items()
            .update(
                &item.id,
                ItemPatch {
                    name: Some("SimMan 3G".to_string()),
                    notes: Some("serial 42".to_string()),
                    reorder_level: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "SimMan 3G");
        assert_eq!(updated.counters(), item.counters());
        assert_eq!(updated.version, item.version + 1);
        assert_eq!(db.items().get(&item.id).await.unwrap().version, updated.version);
    }

    #[tokio::test]
    async fn test_delete_cascades_and_reports_missing() {
        let db = test_db().await;
        let room = room(&db, "A").await;
        let item = db.items().create(draft(&room.id, "SimMan")).await.unwrap();

        db.items().delete(&item.id).await.unwrap();
        assert!(matches!(
            db.items().delete(&item.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }
}
