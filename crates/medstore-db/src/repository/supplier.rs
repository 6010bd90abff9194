//! # Supplier Repository
//!
//! Database operations for suppliers. Names are unique regardless of case,
//! and a supplier referenced by items cannot be deleted.

use chrono::Utc;
use medstore_core::input::{patch_text, SupplierInput};
use medstore_core::{Item, Supplier};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::item::ITEM_COLUMNS;
use crate::error::{DbError, DbResult};

const SUPPLIER_COLUMNS: &str =
    "id, name, contact_person, email, phone, address, website, notes, created_at, updated_at";

/// Repository for supplier database operations.
#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    /// Creates a new SupplierRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    /// Creates a supplier.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - "Supplier name 'X' already exists"
    pub async fn create(&self, input: SupplierInput) -> DbResult<Supplier> {
        let input = input.normalize_new()?;
        let now = Utc::now();

        let supplier = Supplier {
            id: Uuid::new_v4().to_string(),
            name: input.name.unwrap_or_default(),
            contact_person: patch_text(None, input.contact_person),
            email: patch_text(None, input.email),
            phone: patch_text(None, input.phone),
            address: patch_text(None, input.address),
            website: patch_text(None, input.website),
            notes: patch_text(None, input.notes),
            created_at: now,
            updated_at: now,
        };

        debug!(name = %supplier.name, "Creating supplier");

        sqlx::query(&format!(
            "INSERT INTO suppliers ({SUPPLIER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ))
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.contact_person)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(&supplier.website)
        .bind(&supplier.notes)
        .bind(supplier.created_at)
        .bind(supplier.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("Supplier name", &supplier.name))?;

        Ok(supplier)
    }

    /// Gets a supplier by ID.
    pub async fn get(&self, id: &str) -> DbResult<Supplier> {
        sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Supplier", id))
    }

    /// Lists all suppliers by name.
    pub async fn list(&self) -> DbResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers ORDER BY name COLLATE NOCASE"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(suppliers)
    }

    /// Updates the fields present in `input`; empty strings clear.
    pub async fn update(&self, id: &str, input: SupplierInput) -> DbResult<Supplier> {
        let input = input.normalize_patch()?;
        let mut supplier = self.get(id).await?;

        if let Some(name) = input.name {
            supplier.name = name;
        }
        supplier.contact_person = patch_text(supplier.contact_person, input.contact_person);
        supplier.email = patch_text(supplier.email, input.email);
        supplier.phone = patch_text(supplier.phone, input.phone);
        supplier.address = patch_text(supplier.address, input.address);
        supplier.website = patch_text(supplier.website, input.website);
        supplier.notes = patch_text(supplier.notes, input.notes);
        supplier.updated_at = Utc::now();

        debug!(id = %id, "Updating supplier");

        sqlx::query(
            r#"
            UPDATE suppliers SET
                name = ?2, contact_person = ?3, email = ?4, phone = ?5,
                address = ?6, website = ?7, notes = ?8, updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.contact_person)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(&supplier.website)
        .bind(&supplier.notes)
        .bind(supplier.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("Supplier name", &supplier.name))?;

        Ok(supplier)
    }

    /// Deletes a supplier no item refers to.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM suppliers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Supplier", id));
        }

        let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE supplier_id = ?1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if items > 0 {
            return Err(DbError::in_use(
                "supplier",
                format!("{items} item(s) still reference it"),
            ));
        }

        debug!(id = %id, "Deleting supplier");
        sqlx::query("DELETE FROM suppliers WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Items bought from this supplier.
    pub async fn items(&self, id: &str) -> DbResult<Vec<Item>> {
        self.get(id).await?;
        let items = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE supplier_id = ?1 ORDER BY name COLLATE NOCASE"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Counts suppliers.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM suppliers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use medstore_core::input::ItemPatch;

    fn input(name: &str) -> SupplierInput {
        SupplierInput {
            name: Some(name.to_string()),
            contact_person: Some("Dana Reyes".to_string()),
            email: Some("orders@laerdal.example".to_string()),
            phone: Some("   ".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_case_insensitive_duplicate() {
        let db = test_db().await;
        let created = db.suppliers().create(input("Laerdal")).await.unwrap();
        assert_eq!(created.phone, None);

        let err = db.suppliers().create(input("LAERDAL")).await.unwrap_err();
        assert_eq!(err.to_string(), "Supplier name 'LAERDAL' already exists");
        assert_eq!(db.suppliers().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_clears_with_empty_string() {
        let db = test_db().await;
        let created = db.suppliers().create(input("Gaumard")).await.unwrap();

        let updated = db
            .suppliers()
            .update(
                &created.id,
                SupplierInput {
                    contact_person: Some(String::new()),
                    website: Some("https://gaumard.example".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Gaumard");
        assert_eq!(updated.contact_person, None);
        assert_eq!(updated.email.as_deref(), Some("orders@laerdal.example"));
        assert_eq!(updated.website.as_deref(), Some("https://gaumard.example"));
    }

    #[tokio::test]
    async fn test_delete_blocked_while_referenced() {
        let db = test_db().await;
        let supplier = db.suppliers().create(input("CAE")).await.unwrap();
        let room = room(&db, "A").await;
        let item = item(&db, &room.id, 2).await;
        db.items()
            .update(
                &item.id,
                ItemPatch {
                    supplier: Some(supplier.id.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(db.suppliers().items(&supplier.id).await.unwrap().len(), 1);
        assert!(matches!(
            db.suppliers().delete(&supplier.id).await,
            Err(DbError::InUse { .. })
        ));

        db.items()
            .update(
                &item.id,
                ItemPatch {
                    supplier: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        db.suppliers().delete(&supplier.id).await.unwrap();
        assert!(matches!(
            db.suppliers().get(&supplier.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
