//! # Location Hierarchy
//!
//! Rules for the three-tier storage tree and assembly of the nested view.
//!
//! ```text
//! Room "Sim Lab A"                 (no parent)
//!  ├── Rack "R1"                   (parent must be a Room)
//!  │    ├── Shelf "R1-S1"          (parent must be a Rack)
//!  │    └── Shelf "R1-S2"
//!  └── Rack "R2"
//! ```
//!
//! Locations are stored flat with a parent reference; the database layer
//! loads rows and calls into this module for every rule decision.

use serde::Serialize;
use std::collections::HashMap;
use ts_rs::TS;

use crate::error::HierarchyError;
use crate::types::{ItemLocation, Location, LocationType};

// =============================================================================
// Creation Rules
// =============================================================================

/// Checks the parent of a location about to be created.
///
/// ## Example
/// ```rust
/// use medstore_core::location::validate_parent;
/// use medstore_core::LocationType;
///
/// assert!(validate_parent(LocationType::Room, None).is_ok());
/// assert!(validate_parent(LocationType::Rack, None).is_err());
/// ```
pub fn validate_parent(
    kind: LocationType,
    parent_type: Option<LocationType>,
) -> Result<(), HierarchyError> {
    match (kind.parent_type(), parent_type) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(HierarchyError::RoomWithParent),
        (Some(_), None) => Err(HierarchyError::MissingParent { kind }),
        (Some(expected), Some(found)) if expected == found => Ok(()),
        (Some(expected), Some(found)) => Err(HierarchyError::WrongParentType {
            kind,
            expected,
            found,
        }),
    }
}

// =============================================================================
// Item Placement
// =============================================================================

/// Checks the shape of a placement before any lookup.
pub fn check_placement_shape(placement: &ItemLocation) -> Result<(), HierarchyError> {
    if placement.shelf_id.is_some() && placement.rack_id.is_none() {
        return Err(HierarchyError::ShelfWithoutRack);
    }
    Ok(())
}

/// Checks the loaded locations of an item placement.
///
/// ## Rules
/// - `room` must be a Room
/// - `rack`, if given, must be a Rack whose parent is the room
/// - `shelf`, if given, must be a Shelf whose parent is the rack
pub fn validate_placement(
    room: &Location,
    rack: Option<&Location>,
    shelf: Option<&Location>,
) -> Result<(), HierarchyError> {
    expect_slot(room, LocationType::Room)?;

    match (rack, shelf) {
        (None, Some(_)) => Err(HierarchyError::ShelfWithoutRack),
        (None, None) => Ok(()),
        (Some(rack), shelf) => {
            expect_slot(rack, LocationType::Rack)?;
            expect_child_of(rack, room)?;
            if let Some(shelf) = shelf {
                expect_slot(shelf, LocationType::Shelf)?;
                expect_child_of(shelf, rack)?;
            }
            Ok(())
        }
    }
}

/// Resolves the full placement implied by a relocation target.
///
/// `path` is the target followed by its ancestors, nearest first.
///
/// ## Example
/// ```text
/// path = [Shelf S1, Rack R1, Room A]  →  { room: A, rack: R1, shelf: S1 }
/// path = [Rack R1, Room A]            →  { room: A, rack: R1 }
/// path = [Room A]                     →  { room: A }
/// ```
pub fn resolve_destination(path: &[Location]) -> Result<ItemLocation, HierarchyError> {
    let target = path.first().ok_or(HierarchyError::MissingParent {
        kind: LocationType::Room,
    })?;

    // Walk the ancestors checking each link against the type rules.
    for pair in path.windows(2) {
        let (child, parent) = (&pair[0], &pair[1]);
        validate_parent(child.location_type, Some(parent.location_type))?;
        expect_child_of(child, parent)?;
    }

    let ancestor = |depth: usize| {
        path.get(depth).ok_or(HierarchyError::MissingParent {
            kind: target.location_type,
        })
    };

    match target.location_type {
        LocationType::Room => Ok(ItemLocation::room(target.id.clone())),
        LocationType::Rack => Ok(ItemLocation {
            room_id: ancestor(1)?.id.clone(),
            rack_id: Some(target.id.clone()),
            shelf_id: None,
        }),
        LocationType::Shelf => Ok(ItemLocation {
            room_id: ancestor(2)?.id.clone(),
            rack_id: Some(ancestor(1)?.id.clone()),
            shelf_id: Some(target.id.clone()),
        }),
    }
}

fn expect_slot(location: &Location, expected: LocationType) -> Result<(), HierarchyError> {
    if location.location_type != expected {
        return Err(HierarchyError::WrongSlot {
            id: location.id.clone(),
            expected,
            found: location.location_type,
        });
    }
    Ok(())
}

fn expect_child_of(child: &Location, parent: &Location) -> Result<(), HierarchyError> {
    if child.parent_id.as_deref() != Some(parent.id.as_str()) {
        return Err(HierarchyError::NotNested {
            child: child.name.clone(),
            parent: parent.name.clone(),
        });
    }
    Ok(())
}

// =============================================================================
// Tree Assembly
// =============================================================================

/// A location with its children and the number of items placed in it.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LocationNode {
    #[serde(flatten)]
    pub location: Location,
    pub item_count: i64,
    pub children: Vec<LocationNode>,
}

/// Nests flat location rows into Room → Rack → Shelf trees.
///
/// Children are sorted by name. A row whose parent is missing from the input
/// is promoted to a root so nothing disappears from the view.
pub fn build_tree(locations: Vec<Location>, item_counts: &HashMap<String, i64>) -> Vec<LocationNode> {
    let known: std::collections::HashSet<String> =
        locations.iter().map(|l| l.id.clone()).collect();

    let mut roots = Vec::new();
    let mut children: HashMap<String, Vec<Location>> = HashMap::new();
    for location in locations {
        match location.parent_id.clone() {
            Some(parent) if known.contains(&parent) => {
                children.entry(parent).or_default().push(location)
            }
            _ => roots.push(location),
        }
    }

    let mut nodes: Vec<LocationNode> = roots
        .into_iter()
        .map(|root| attach(root, &mut children, item_counts))
        .collect();
    nodes.sort_by(|a, b| a.location.name.cmp(&b.location.name));
    nodes
}

fn attach(
    location: Location,
    children: &mut HashMap<String, Vec<Location>>,
    item_counts: &HashMap<String, i64>,
) -> LocationNode {
    let mut kids: Vec<LocationNode> = children
        .remove(&location.id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| attach(child, children, item_counts))
        .collect();
    kids.sort_by(|a, b| a.location.name.cmp(&b.location.name));

    LocationNode {
        item_count: item_counts.get(&location.id).copied().unwrap_or(0),
        location,
        children: kids,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn loc(id: &str, kind: LocationType, parent: Option<&str>) -> Location {
        let now = Utc::now();
        Location {
            id: id.to_string(),
            name: id.to_uppercase(),
            description: None,
            location_type: kind,
            parent_id: parent.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_parent_rules() {
        use LocationType::*;
        assert!(validate_parent(Room, None).is_ok());
        assert!(validate_parent(Rack, Some(Room)).is_ok());
        assert!(validate_parent(Shelf, Some(Rack)).is_ok());

        assert_eq!(validate_parent(Room, Some(Room)), Err(HierarchyError::RoomWithParent));
        assert_eq!(
            validate_parent(Rack, None),
            Err(HierarchyError::MissingParent { kind: Rack })
        );
        assert_eq!(
            validate_parent(Rack, Some(Shelf)),
            Err(HierarchyError::WrongParentType {
                kind: Rack,
                expected: Room,
                found: Shelf
            })
        );
        assert!(validate_parent(Shelf, Some(Room)).is_err());
    }

    #[test]
    fn test_placement_accepts_nested_slots() {
        let room = loc("a", LocationType::Room, None);
        let rack = loc("r1", LocationType::Rack, Some("a"));
        let shelf = loc("s1", LocationType::Shelf, Some("r1"));

        assert!(validate_placement(&room, None, None).is_ok());
        assert!(validate_placement(&room, Some(&rack), None).is_ok());
        assert!(validate_placement(&room, Some(&rack), Some(&shelf)).is_ok());
    }

    #[test]
    fn test_placement_rejects_foreign_rack() {
        let room = loc("a", LocationType::Room, None);
        let rack = loc("r9", LocationType::Rack, Some("b"));

        assert!(matches!(
            validate_placement(&room, Some(&rack), None),
            Err(HierarchyError::NotNested { .. })
        ));
    }

    #[test]
    fn test_placement_rejects_wrong_slot_type() {
        let rack = loc("r1", LocationType::Rack, Some("a"));
        assert!(matches!(
            validate_placement(&rack, None, None),
            Err(HierarchyError::WrongSlot { expected: LocationType::Room, .. })
        ));
    }

    #[test]
    fn test_shelf_without_rack() {
        let placement = ItemLocation {
            room_id: "a".to_string(),
            rack_id: None,
            shelf_id: Some("s1".to_string()),
        };
        assert_eq!(
            check_placement_shape(&placement),
            Err(HierarchyError::ShelfWithoutRack)
        );
    }

    #[test]
    fn test_resolve_destination_from_shelf() {
        let path = vec![
            loc("s1", LocationType::Shelf, Some("r1")),
            loc("r1", LocationType::Rack, Some("a")),
            loc("a", LocationType::Room, None),
        ];
        let resolved = resolve_destination(&path).unwrap();
        assert_eq!(resolved.room_id, "a");
        assert_eq!(resolved.rack_id.as_deref(), Some("r1"));
        assert_eq!(resolved.shelf_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_resolve_destination_from_room() {
        let path = vec![loc("a", LocationType::Room, None)];
        assert_eq!(resolve_destination(&path).unwrap(), ItemLocation::room("a"));
    }

    #[test]
    fn test_resolve_destination_with_broken_chain() {
        let path = vec![loc("r1", LocationType::Rack, Some("a"))];
        assert!(resolve_destination(&path).is_err());
    }

    #[test]
    fn test_build_tree_nests_and_counts() {
        let rows = vec![
            loc("s1", LocationType::Shelf, Some("r1")),
            loc("b", LocationType::Room, None),
            loc("r1", LocationType::Rack, Some("a")),
            loc("a", LocationType::Room, None),
        ];
        let counts = HashMap::from([("a".to_string(), 4), ("s1".to_string(), 2)]);

        let tree = build_tree(rows, &counts);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].location.id, "a");
        assert_eq!(tree[0].item_count, 4);
        assert_eq!(tree[0].children[0].location.id, "r1");
        assert_eq!(tree[0].children[0].children[0].item_count, 2);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn test_tree_node_json_is_flat() {
        let tree = build_tree(vec![loc("a", LocationType::Room, None)], &HashMap::new());
        let json = serde_json::to_value(&tree[0]).unwrap();
        assert_eq!(json["type"], "Room");
        assert_eq!(json["itemCount"], 0);
        assert!(json["children"].as_array().unwrap().is_empty());
    }
}
