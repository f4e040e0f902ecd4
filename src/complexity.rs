//! Level difficulty rating.
//!
//! A level is rated from two passes. The static pass measures the layout (item types,
//! locks, depth, free space, items with no near-term way to be paired). The dynamic pass
//! solves the level and measures the solution (moves, moves per match, temporary parking
//! moves). Both are combined with fixed linear weights into a score and a [`DifficultyTier`].
use crate::engine::{Board, ContainerKind, Move, MATCH_SIZE};
use crate::heuristics::analyze_accessibility;
use crate::level::LevelDefinition;
use crate::solver::{solve_level, SolveResult};
use serde::Serialize;
use std::fmt;

const TIER_THRESHOLDS: [(f64, DifficultyTier); 5] = [
    (30.0, DifficultyTier::Tutorial),
    (60.0, DifficultyTier::Easy),
    (100.0, DifficultyTier::Medium),
    (150.0, DifficultyTier::Hard),
    (200.0, DifficultyTier::Expert),
];

/// Score added when the solver could not clear the level.
const UNSOLVED_PENALTY: f64 = 50.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DifficultyTier {
    Tutorial,
    Easy,
    Medium,
    Hard,
    Expert,
    Master,
}

impl DifficultyTier {
    /// Maps a total score onto a tier. Each threshold is inclusive.
    pub fn from_score(total: f64) -> Self {
        TIER_THRESHOLDS
            .iter()
            .find(|(limit, _)| total <= *limit)
            .map_or(DifficultyTier::Master, |(_, tier)| *tier)
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DifficultyTier::Tutorial => "Tutorial",
            DifficultyTier::Easy => "Easy",
            DifficultyTier::Medium => "Medium",
            DifficultyTier::Hard => "Hard",
            DifficultyTier::Expert => "Expert",
            DifficultyTier::Master => "Master",
        };
        f.pad(name)
    }
}

/// Layout measurements taken before any move.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StructureMetrics {
    pub item_types: usize,
    pub total_items: usize,
    pub containers: usize,
    pub locked_containers: usize,
    pub moving_containers: usize,
    pub single_slot_containers: usize,
    pub max_rows: usize,
    /// Item types that cannot be paired soon at the start of play.
    pub stuck_item_types: usize,
    pub actionable_item_types: usize,
    /// Share of front cells that are empty at the start of play.
    pub empty_space_ratio: f64,
}

impl StructureMetrics {
    pub fn score(&self) -> f64 {
        2.0 * self.item_types as f64
            + 0.5 * self.total_items as f64
            + 5.0 * self.locked_containers as f64
            + 4.0 * self.moving_containers as f64
            + 3.0 * self.single_slot_containers as f64
            + 8.0 * self.max_rows.saturating_sub(1) as f64
            + 3.0 * self.stuck_item_types as f64
            + 20.0 * (1.0 - self.empty_space_ratio)
    }
}

/// Measurements of the solver's solution.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SolverMetrics {
    pub solved: bool,
    pub moves: u32,
    pub matches: u32,
    pub moves_per_match: f64,
    /// Moves into a container holding none of the moved type.
    pub temporary_moves: u32,
    pub failure_reason: Option<String>,
}

impl SolverMetrics {
    pub fn score(&self) -> f64 {
        let mut score = self.moves as f64
            + 10.0 * (self.moves_per_match - 1.0).max(0.0)
            + 2.0 * self.temporary_moves as f64;
        if !self.solved {
            score += UNSOLVED_PENALTY;
        }
        score
    }
}

/// The difficulty report for one level.
#[derive(Clone, Debug, Serialize)]
pub struct ComplexityResult {
    pub level_id: u32,
    pub world_id: String,
    pub name: String,
    pub star_move_thresholds: Vec<u32>,
    pub structure: StructureMetrics,
    pub solver: SolverMetrics,
    pub structure_score: f64,
    pub solver_score: f64,
    pub total_score: f64,
    pub tier: DifficultyTier,
}

/// Measures the layout of `level`.
///
/// Accessibility is judged after pre-existing matches are resolved. A level that cannot be
/// built into a board only gets its definition-level counts.
pub fn structure_metrics(level: &LevelDefinition) -> StructureMetrics {
    let mut metrics = StructureMetrics {
        item_types: level.item_types().len(),
        total_items: level.item_count(),
        containers: level.containers.len(),
        locked_containers: level.containers.iter().filter(|c| c.is_locked).count(),
        moving_containers: level.containers.iter().filter(|c| c.is_moving).count(),
        single_slot_containers: level
            .containers
            .iter()
            .filter(|c| c.container_type == ContainerKind::SingleSlot)
            .count(),
        max_rows: level
            .containers
            .iter()
            .map(|c| c.effective_max_rows())
            .max()
            .unwrap_or(0),
        ..StructureMetrics::default()
    };

    let Ok(mut board) = Board::from_level(level) else {
        return metrics;
    };
    board.resolve_cascade();

    let access = analyze_accessibility(&board);
    metrics.actionable_item_types = access.values().filter(|a| a.is_actionable()).count();
    metrics.stuck_item_types = access.len() - metrics.actionable_item_types;

    let capacity: usize = board.containers().iter().map(|c| c.slot_count()).sum();
    let occupied: usize = board
        .containers()
        .iter()
        .map(|c| c.occupied_front_count())
        .sum();
    if capacity > 0 {
        metrics.empty_space_ratio = 1.0 - occupied as f64 / capacity as f64;
    }
    metrics
}

/// Front rows of every container, ignoring depth. Only used to classify moves.
struct FrontTracker {
    fronts: Vec<Vec<Option<String>>>,
}

impl FrontTracker {
    fn new(level: &LevelDefinition) -> Self {
        let fronts = level
            .containers
            .iter()
            .map(|def| {
                let mut row = vec![None; def.effective_slot_count()];
                for item in def.initial_items.iter().filter(|i| i.row == 0) {
                    if let Some(cell) = usize::try_from(item.slot).ok().and_then(|s| row.get_mut(s)) {
                        *cell = Some(item.id.clone());
                    }
                }
                row
            })
            .collect();
        FrontTracker { fronts }
    }

    fn count_at(&self, container: usize, item: &str) -> usize {
        self.fronts.get(container).map_or(0, |row| {
            row.iter().filter(|c| c.as_deref() == Some(item)).count()
        })
    }

    fn apply(&mut self, mv: &Move) {
        if let Some(cell) = self
            .fronts
            .get_mut(mv.from_container)
            .and_then(|row| row.get_mut(mv.from_slot))
        {
            *cell = None;
        }
        if let Some(row) = self.fronts.get_mut(mv.to_container) {
            if let Some(cell) = row.get_mut(mv.to_slot) {
                *cell = Some(mv.item_type.clone());
            }
            let item = Some(mv.item_type.as_str());
            if row.len() >= MATCH_SIZE && row.iter().all(|c| c.as_deref() == item) {
                row.iter_mut().for_each(|c| *c = None);
            }
        }
    }
}

/// Counts the moves of `moves` that park an item where none of its type sits.
pub fn count_temporary_moves(level: &LevelDefinition, moves: &[Move]) -> u32 {
    let mut tracker = FrontTracker::new(level);
    let mut temporary = 0;
    for mv in moves {
        if tracker.count_at(mv.to_container, &mv.item_type) == 0 {
            temporary += 1;
        }
        tracker.apply(mv);
    }
    temporary
}

/// Rates `level` using a clean solve with the default configuration.
pub fn analyze_level(level: &LevelDefinition) -> ComplexityResult {
    analyze_level_with(level, &solve_level(level))
}

/// Rates `level` from a solve that has already been run.
pub fn analyze_level_with(level: &LevelDefinition, solve: &SolveResult) -> ComplexityResult {
    let structure = structure_metrics(level);
    let moves_per_match = if solve.total_matches > 0 {
        solve.total_moves as f64 / solve.total_matches as f64
    } else {
        solve.total_moves as f64
    };
    let solver = SolverMetrics {
        solved: solve.success,
        moves: solve.total_moves,
        matches: solve.total_matches,
        moves_per_match,
        temporary_moves: count_temporary_moves(level, &solve.move_sequence),
        failure_reason: solve.failure_reason(),
    };

    let structure_score = structure.score();
    let solver_score = solver.score();
    let total_score = structure_score + solver_score;
    ComplexityResult {
        level_id: level.id,
        world_id: level.world_id.clone(),
        name: level.label(),
        star_move_thresholds: level.star_move_thresholds.clone(),
        structure,
        solver,
        structure_score,
        solver_score,
        total_score,
        tier: DifficultyTier::from_score(total_score),
    }
}
