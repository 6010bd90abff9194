//! # Seed Data Generator
//!
//! Populates a database with a small simulation-center inventory for
//! development and demos.
//!
//! ## Usage
//! ```bash
//! # Seed ./medstore_dev.db
//! cargo run -p medstore-db --bin seed
//!
//! # Specify database path
//! cargo run -p medstore-db --bin seed -- --db ./data/medstore.db
//! ```
//!
//! ## Generated Data
//! - Two rooms, each with racks and shelves
//! - Three suppliers
//! - A dozen items across every category type
//! - A few transactions per item (sessions, rentals, maintenance)
//!
//! Users are not seeded; the API creates the bootstrap admin.

use anyhow::{bail, Context};
use chrono::{Duration, Utc};
use medstore_core::input::{ItemDraft, LocationDraft, SupplierInput};
use medstore_core::{
    CategoryType, ItemLocation, Location, LocationType, MaintenanceDetails, RentalDetails,
    SessionDetails, TransactionRequest, TransactionType,
};
use medstore_db::{Database, DbConfig};
use std::env;

/// Ledger author for seeded transactions.
const SEED_USER: &str = "seed";

/// `(room, [(rack, [shelf])])`
const LAYOUT: &[(&str, &[(&str, &[&str])])] = &[
    (
        "Sim Lab A",
        &[
            ("Rack A1", &["Shelf A1-1", "Shelf A1-2", "Shelf A1-3"]),
            ("Rack A2", &["Shelf A2-1", "Shelf A2-2"]),
        ],
    ),
    (
        "Storage Room B",
        &[("Rack B1", &["Shelf B1-1", "Shelf B1-2"]), ("Rack B2", &[])],
    ),
];

const SUPPLIERS: &[(&str, &str, &str)] = &[
    ("Laerdal Medical", "Orders Desk", "orders@laerdal.example"),
    ("Gaumard Scientific", "Kim Alvarez", "sales@gaumard.example"),
    ("Simulab", "Support", "help@simulab.example"),
];

/// `(name, category, type, quantity, reorder level, unit cost cents)`
const ITEMS: &[(&str, &str, CategoryType, i64, i64, i64)] = &[
    ("SimMan 3G", "Manikins", CategoryType::Manikin, 2, 0, 9_500_000),
    ("Resusci Anne QCPR", "Manikins", CategoryType::Manikin, 6, 2, 320_000),
    ("Newborn Anne", "Manikins", CategoryType::Manikin, 3, 1, 450_000),
    ("IV Arm Trainer", "Task Trainers", CategoryType::TaskTrainer, 8, 3, 85_000),
    ("Airway Management Trainer", "Task Trainers", CategoryType::TaskTrainer, 4, 1, 160_000),
    ("Suture Pad", "Task Trainers", CategoryType::TaskTrainer, 40, 15, 2_500),
    ("AED Trainer", "Equipment", CategoryType::Equipment, 10, 4, 42_000),
    ("Infusion Pump", "Equipment", CategoryType::Equipment, 5, 2, 210_000),
    ("Laryngoscope Set", "Instruments", CategoryType::Instrument, 6, 2, 38_000),
    ("Nitrile Gloves (box)", "Consumables", CategoryType::Consumable, 60, 20, 900),
    ("IV Start Kit", "Consumables", CategoryType::Consumable, 35, 25, 650),
    ("Moulage Kit", "Other", CategoryType::Other, 3, 1, 27_500),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./medstore_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("MedStore Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./medstore_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => bail!("unknown argument: {other}"),
        }
        i += 1;
    }

    println!("🌱 MedStore Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening {db_path}"))?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.items().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} items", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Locations
    let mut placements: Vec<ItemLocation> = Vec::new();
    for (room_name, racks) in LAYOUT {
        let room = create_location(&db, room_name, LocationType::Room, None).await?;
        placements.push(ItemLocation::room(room.id.clone()));

        for (rack_name, shelves) in racks.iter() {
            let rack = create_location(&db, rack_name, LocationType::Rack, Some(&room)).await?;
            placements.push(ItemLocation {
                room_id: room.id.clone(),
                rack_id: Some(rack.id.clone()),
                shelf_id: None,
            });

            for shelf_name in shelves.iter() {
                let shelf =
                    create_location(&db, shelf_name, LocationType::Shelf, Some(&rack)).await?;
                placements.push(ItemLocation {
                    room_id: room.id.clone(),
                    rack_id: Some(rack.id.clone()),
                    shelf_id: Some(shelf.id.clone()),
                });
            }
        }
    }
    println!("✓ Created {} locations", db.locations().count().await?);

    // Suppliers
    let mut supplier_ids = Vec::new();
    for (name, contact, email) in SUPPLIERS {
        let supplier = db
            .suppliers()
            .create(SupplierInput {
                name: Some(name.to_string()),
                contact_person: Some(contact.to_string()),
                email: Some(email.to_string()),
                ..Default::default()
            })
            .await
            .with_context(|| format!("creating supplier {name}"))?;
        supplier_ids.push(supplier.id);
    }
    println!("✓ Created {} suppliers", supplier_ids.len());

    // Items
    let mut item_ids = Vec::new();
    for (idx, (name, category, category_type, quantity, reorder_level, unit_cost)) in
        ITEMS.iter().enumerate()
    {
        let item = db
            .items()
            .create(ItemDraft {
                name: name.to_string(),
                description: None,
                category: category.to_string(),
                category_type: Some(*category_type),
                barcode_type: None,
                barcode: None,
                location: placements[idx % placements.len()].clone(),
                supplier: Some(supplier_ids[idx % supplier_ids.len()].clone()),
                quantity: *quantity,
                reorder_level: *reorder_level,
                unit_cost: *unit_cost,
                notes: None,
            })
            .await
            .with_context(|| format!("creating item {name}"))?;
        item_ids.push(item.id);
    }
    println!("✓ Created {} items", item_ids.len());

    // Ledger activity
    let mut recorded = 0;
    for (idx, item_id) in item_ids.iter().enumerate() {
        for request in demo_transactions(idx) {
            match db.transactions().record(item_id, &request, SEED_USER).await {
                Ok(_) => recorded += 1,
                // Small items can't cover every demo request; skip those.
                Err(e) => eprintln!("  Skipped {} on item {}: {}", request.transaction_type, idx, e),
            }
        }
    }
    println!("✓ Recorded {} transactions", recorded);

    let dashboard = db.reports().dashboard().await?;
    let elapsed = start.elapsed();
    println!();
    println!("  Units: {} ({} available)", dashboard.totals.total_units, dashboard.totals.available_units);
    println!("  Inventory value: {}", dashboard.inventory_value);
    println!("  Low stock: {}", dashboard.totals.low_stock_count);
    println!();
    println!("✓ Seed complete in {:?}", elapsed);

    Ok(())
}

async fn create_location(
    db: &Database,
    name: &str,
    location_type: LocationType,
    parent: Option<&Location>,
) -> anyhow::Result<Location> {
    db.locations()
        .create(LocationDraft {
            name: name.to_string(),
            description: None,
            location_type,
            parent: parent.map(|p| p.id.clone()),
        })
        .await
        .with_context(|| format!("creating {location_type} {name}"))
}

/// A few representative transactions, varied by item index.
fn demo_transactions(idx: usize) -> Vec<TransactionRequest> {
    let now = Utc::now();
    let mut requests = vec![TransactionRequest::new(TransactionType::StockAddition, 2)];

    match idx % 4 {
        0 => requests.push(TransactionRequest {
            session: Some(SessionDetails {
                name: Some(format!("ACLS Cohort {}", idx + 1)),
                location: Some("Sim Lab A".to_string()),
            }),
            ..TransactionRequest::new(TransactionType::CheckOutForSession, 1)
        }),
        1 => requests.push(TransactionRequest {
            rental: Some(RentalDetails {
                rented_to: Some("County EMS Academy".to_string()),
                expected_return_date: Some(now + Duration::days(14)),
            }),
            ..TransactionRequest::new(TransactionType::RentOut, 1)
        }),
        2 => requests.push(TransactionRequest {
            maintenance: Some(MaintenanceDetails {
                provider: Some("BioMed Services".to_string()),
                expected_end_date: Some(now - Duration::days(2)),
            }),
            ..TransactionRequest::new(TransactionType::SendToMaintenance, 1)
        }),
        _ => requests.push(TransactionRequest::new(TransactionType::StockRemoval, 3)),
    }

    requests
}
