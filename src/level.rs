//! Level definitions as stored in the game's level JSON files.
//!
//! The solver only reads these records; it never writes level files. Unknown JSON
//! fields (positions, sprites, timers, movement tracks) are ignored.

use crate::engine::{ContainerKind, MATCH_SIZE};
use crate::error::LevelError;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

const DEFAULT_SLOT_COUNT: usize = 3;
const DEFAULT_MAX_ROWS: usize = 4;

/// One item in a container's starting layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPlacement {
    #[serde(alias = "item_type")]
    pub id: String,
    #[serde(default)]
    pub slot: i32,
    #[serde(default)]
    pub row: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerDef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub container_type: ContainerKind,
    #[serde(default)]
    pub slot_count: i32,
    #[serde(default)]
    pub max_rows_per_slot: i32,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub unlock_matches_required: u32,
    #[serde(default)]
    pub is_moving: bool,
    #[serde(default)]
    pub initial_items: Vec<ItemPlacement>,
}

impl ContainerDef {
    /// Slot count with the game's defaults applied: single-slot containers have one slot,
    /// a missing or non-positive count means 3.
    pub fn effective_slot_count(&self) -> usize {
        match self.container_type {
            ContainerKind::SingleSlot => 1,
            ContainerKind::Standard => usize::try_from(self.slot_count)
                .ok()
                .filter(|&n| n > 0)
                .unwrap_or(DEFAULT_SLOT_COUNT),
        }
    }

    /// Row depth with the game's default of 4 for a missing or non-positive value.
    pub fn effective_max_rows(&self) -> usize {
        usize::try_from(self.max_rows_per_slot)
            .ok()
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MAX_ROWS)
    }
}

/// A complete level as loaded from JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelDefinition {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub world_id: String,
    #[serde(default)]
    pub name: String,
    /// Move counts for the star rating. Not used by the solver itself.
    #[serde(default)]
    pub star_move_thresholds: Vec<u32>,
    /// Moves the generator spent building the layout, or 0 when unknown. The ensemble
    /// solve uses it as its starting move cap.
    #[serde(default, alias = "_construction_moves")]
    pub construction_moves: u32,
    #[serde(default)]
    pub containers: Vec<ContainerDef>,
}

impl LevelDefinition {
    pub fn from_json_str(json: &str) -> Result<Self, LevelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| LevelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Total number of placed items.
    pub fn item_count(&self) -> usize {
        self.containers.iter().map(|c| c.initial_items.len()).sum()
    }

    /// The distinct item types placed in this level, sorted.
    pub fn item_types(&self) -> BTreeSet<&str> {
        self.containers
            .iter()
            .flat_map(|c| c.initial_items.iter().map(|i| i.id.as_str()))
            .collect()
    }

    /// A short label for reports: the level name, or its numeric id.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("level_{:03}", self.id)
        } else {
            self.name.clone()
        }
    }

    /// Generates a reproducible random level made of complete triples.
    ///
    /// Items are shuffled into the containers row by row, front row first. The last
    /// `params.free_front_cells` front cells of the shuffled order are left empty so the
    /// level has room to move. The same seed always produces the same level.
    pub fn new_random_with_seed(seed: u64, params: &RandomLevelParams) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let slot_count = params.slot_count.max(MATCH_SIZE);
        let max_rows = params.max_rows.max(1);
        let container_count = params.containers.max(2);

        let mut front_cells = Vec::new();
        let mut buried_cells = Vec::new();
        for c in 0..container_count {
            for row in 0..max_rows {
                for slot in 0..slot_count {
                    if row == 0 {
                        front_cells.push((c, slot, row));
                    } else {
                        buried_cells.push((c, slot, row));
                    }
                }
            }
        }
        front_cells.shuffle(&mut rng);
        let free = params.free_front_cells.clamp(1, front_cells.len());
        front_cells.truncate(front_cells.len() - free);
        // Buried cells fill in row order so deeper rows stay emptier.
        buried_cells.sort_by_key(|&(c, slot, row)| (row, c, slot));

        let max_types = (front_cells.len() + buried_cells.len()) / MATCH_SIZE;
        let mut items: Vec<String> = (0..params.item_types.min(max_types))
            .flat_map(|t| std::iter::repeat(format!("item_{t:02}")).take(MATCH_SIZE))
            .collect();
        items.shuffle(&mut rng);

        let locked_from = container_count.saturating_sub(params.locked_containers);
        let mut containers: Vec<ContainerDef> = (0..container_count)
            .map(|c| ContainerDef {
                id: format!("container_{}", c + 1),
                container_type: ContainerKind::Standard,
                slot_count: slot_count as i32,
                max_rows_per_slot: max_rows as i32,
                is_locked: c >= locked_from && c > 0,
                unlock_matches_required: params.unlock_matches_required,
                is_moving: false,
                initial_items: Vec::new(),
            })
            .collect();

        let cells = front_cells.into_iter().chain(buried_cells);
        for (item, (c, slot, row)) in items.into_iter().zip(cells) {
            containers[c].initial_items.push(ItemPlacement {
                id: item,
                slot: slot as i32,
                row: row as i32,
            });
        }

        LevelDefinition {
            id: (seed % 1000) as u32,
            world_id: "random".to_string(),
            name: format!("random_{seed}"),
            star_move_thresholds: Vec::new(),
            construction_moves: 0,
            containers,
        }
    }
}

/// Shape of a generated random level.
#[derive(Clone, Debug)]
pub struct RandomLevelParams {
    pub containers: usize,
    pub slot_count: usize,
    pub max_rows: usize,
    pub item_types: usize,
    pub free_front_cells: usize,
    pub locked_containers: usize,
    pub unlock_matches_required: u32,
}

impl Default for RandomLevelParams {
    fn default() -> Self {
        RandomLevelParams {
            containers: 6,
            slot_count: 3,
            max_rows: 2,
            item_types: 10,
            free_front_cells: 4,
            locked_containers: 0,
            unlock_matches_required: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": 7,
        "world_id": "island",
        "name": "level_007",
        "star_move_thresholds": [4, 5, 6, 7],
        "time_limit_seconds": 30,
        "containers": [
            {
                "id": "container_1",
                "container_type": "standard",
                "slot_count": 3,
                "max_rows_per_slot": 2,
                "initial_items": [
                    {"id": "apple", "row": 0, "slot": 0},
                    {"id": "apple", "row": 0, "slot": 1}
                ]
            },
            {
                "id": "container_2",
                "container_type": "single_slot",
                "slot_count": 3,
                "initial_items": [{"item_type": "apple", "slot": 0, "row": 0}]
            },
            {
                "id": "container_3",
                "slot_count": 0,
                "is_locked": true,
                "unlock_matches_required": 1,
                "is_moving": true
            }
        ],
        "moving_tracks": []
    }"#;

    #[test]
    fn test_parse_level_json() {
        let level = LevelDefinition::from_json_str(SAMPLE).unwrap();
        assert_eq!(level.id, 7);
        assert_eq!(level.star_move_thresholds, vec![4, 5, 6, 7]);
        assert_eq!(level.containers.len(), 3);
        assert_eq!(level.item_count(), 3);
        assert_eq!(level.item_types().into_iter().collect::<Vec<_>>(), vec!["apple"]);

        let single = &level.containers[1];
        assert_eq!(single.container_type, ContainerKind::SingleSlot);
        assert_eq!(single.effective_slot_count(), 1);
        assert_eq!(single.effective_max_rows(), DEFAULT_MAX_ROWS);

        let locked = &level.containers[2];
        assert!(locked.is_locked && locked.is_moving);
        assert_eq!(locked.effective_slot_count(), DEFAULT_SLOT_COUNT);
    }

    #[test]
    fn test_construction_moves_field() {
        assert_eq!(LevelDefinition::from_json_str(SAMPLE).unwrap().construction_moves, 0);
        let level = LevelDefinition::from_json_str(r#"{"construction_moves": 12}"#).unwrap();
        assert_eq!(level.construction_moves, 12);
        let level = LevelDefinition::from_json_str(r#"{"_construction_moves": 9}"#).unwrap();
        assert_eq!(level.construction_moves, 9);
    }

    #[test]
    fn test_unknown_container_type_is_standard() {
        let level = LevelDefinition::from_json_str(
            r#"{"containers": [{"container_type": "carousel", "slot_count": 3}]}"#,
        )
        .unwrap();
        assert_eq!(level.containers[0].container_type, ContainerKind::Standard);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            LevelDefinition::from_json_str("{ not json"),
            Err(LevelError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = LevelDefinition::from_path("/nonexistent/level_999.json").unwrap_err();
        assert!(matches!(err, LevelError::Io { .. }));
    }

    #[test]
    fn test_random_level_determinism() {
        let params = RandomLevelParams::default();
        let a = LevelDefinition::new_random_with_seed(11, &params);
        let b = LevelDefinition::new_random_with_seed(11, &params);
        let c = LevelDefinition::new_random_with_seed(12, &params);
        assert_eq!(a, b);
        assert_ne!(a.containers, c.containers);
    }

    #[test]
    fn test_random_level_uses_complete_triples() {
        let params = RandomLevelParams::default();
        let level = LevelDefinition::new_random_with_seed(3, &params);
        assert_eq!(level.item_count(), params.item_types * MATCH_SIZE);
        for item in level.item_types() {
            let copies = level
                .containers
                .iter()
                .flat_map(|c| c.initial_items.iter())
                .filter(|i| i.id == item)
                .count();
            assert_eq!(copies, MATCH_SIZE);
        }
        let front_items = level
            .containers
            .iter()
            .flat_map(|c| c.initial_items.iter())
            .filter(|i| i.row == 0)
            .count();
        assert!(front_items <= params.containers * params.slot_count - params.free_front_cells);
    }
}
