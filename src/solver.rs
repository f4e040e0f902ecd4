//! The greedy solver driver.
//!
//! A [`Solver`] repeatedly asks the heuristics for the best move, applies it, settles the
//! board and loops until the board is empty, no move is left, the move cap is reached or
//! the caller cancels. It never backtracks: the result is a good solution, not necessarily
//! the shortest one. [`solve_level_best`] runs several strategy profiles and keeps the
//! shortest success.
use crate::engine::{Board, Move};
use crate::error::FailureReason;
use crate::heuristics::{choose_move, SearchMemory, SolverStrategy, ALL_STRATEGIES, BALANCED};
use crate::level::LevelDefinition;
use log::{debug, info};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use std::time::Instant;

/// Safety cap on moves per solve.
pub const MAX_MOVES: u32 = 500;
/// Score noise used for the restarts of [`solve_level_best`].
pub const DEFAULT_NOISE_MAGNITUDE: i32 = 8;

/// Settings for a single solve.
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// Move cap. Zero means [`MAX_MOVES`].
    pub max_moves: u32,
    pub strategy: SolverStrategy,
    /// Seed for score noise; only used when the strategy has a non-zero noise magnitude.
    pub noise_seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            max_moves: MAX_MOVES,
            strategy: BALANCED,
            noise_seed: 0,
        }
    }
}

impl SolverConfig {
    pub fn with_strategy(strategy: SolverStrategy) -> Self {
        SolverConfig {
            strategy,
            ..SolverConfig::default()
        }
    }

    /// The effective move cap.
    pub fn move_cap(&self) -> u32 {
        if self.max_moves == 0 {
            MAX_MOVES
        } else {
            self.max_moves
        }
    }
}

/// Why the solver committed a move.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MoveNote {
    pub score: i32,
    pub reason: String,
}

/// The outcome of one solve.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SolveResult {
    pub success: bool,
    pub total_moves: u32,
    pub total_matches: u32,
    pub move_sequence: Vec<Move>,
    #[serde(rename = "failure_reason")]
    pub failure: Option<FailureReason>,
    pub solve_time_ms: f64,
    /// One note per entry of `move_sequence`.
    #[serde(skip)]
    pub notes: Vec<MoveNote>,
    /// Name of the strategy profile that produced this result.
    #[serde(skip)]
    pub strategy: String,
}

impl SolveResult {
    fn failed(reason: FailureReason) -> Self {
        SolveResult {
            failure: Some(reason),
            ..SolveResult::default()
        }
    }

    /// The human readable failure reason, if the solve failed.
    pub fn failure_reason(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }
}

/// Where the driver is in its run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverPhase {
    Idle,
    Resolving,
    Searching,
    Executing,
    Solved,
    Stuck,
    MoveCapExceeded,
    Cancelled,
}

/// Polled once per iteration with the move count, items remaining and elapsed seconds.
/// Returning `true` stops the solve.
pub type CancelCallback<'a> = Box<dyn FnMut(u32, usize, f64) -> bool + 'a>;

pub struct Solver<'a> {
    config: SolverConfig,
    phase: SolverPhase,
    cancel: Option<CancelCallback<'a>>,
}

impl<'a> Solver<'a> {
    pub fn new(config: SolverConfig) -> Self {
        Solver {
            config,
            phase: SolverPhase::Idle,
            cancel: None,
        }
    }

    /// Installs a cooperative cancellation callback.
    pub fn with_cancel(mut self, callback: impl FnMut(u32, usize, f64) -> bool + 'a) -> Self {
        self.cancel = Some(Box::new(callback));
        self
    }

    pub fn phase(&self) -> SolverPhase {
        self.phase
    }

    /// Builds the board for `level` and solves it.
    ///
    /// A level without containers fails with `InitializationFailed` before any search.
    pub fn solve(&mut self, level: &LevelDefinition) -> SolveResult {
        match Board::from_level(level) {
            Ok(board) => self.solve_board(board),
            Err(err) => {
                debug!("cannot build board for {}: {}", level.label(), err);
                self.phase = SolverPhase::Idle;
                let mut result = SolveResult::failed(FailureReason::InitializationFailed);
                result.strategy = self.config.strategy.name.to_string();
                result
            }
        }
    }

    /// Solves an already-built board. Pre-existing matches are resolved before the first move.
    pub fn solve_board(&mut self, mut board: Board) -> SolveResult {
        let start = Instant::now();
        let strategy = self.config.strategy.clone();
        let cap = self.config.move_cap();
        let mut rng = (strategy.noise_magnitude > 0)
            .then(|| SmallRng::seed_from_u64(self.config.noise_seed));
        let mut memory = SearchMemory::new();
        let mut result = SolveResult {
            strategy: strategy.name.to_string(),
            ..SolveResult::default()
        };

        self.phase = SolverPhase::Resolving;
        board.resolve_cascade();
        memory.remember_layout(&board);

        loop {
            if board.is_complete() {
                self.phase = SolverPhase::Solved;
                result.success = true;
                break;
            }
            if result.total_moves >= cap {
                self.phase = SolverPhase::MoveCapExceeded;
                result.failure = Some(FailureReason::MoveCapExceeded { cap });
                break;
            }
            let items_remaining = board.total_item_count();
            if let Some(cancel) = self.cancel.as_mut() {
                if cancel(result.total_moves, items_remaining, start.elapsed().as_secs_f64()) {
                    self.phase = SolverPhase::Cancelled;
                    result.failure = Some(FailureReason::Cancelled { items_remaining });
                    break;
                }
            }

            self.phase = SolverPhase::Searching;
            let Some(choice) = choose_move(&board, &memory, &strategy, rng.as_mut()) else {
                self.phase = SolverPhase::Stuck;
                result.failure = Some(FailureReason::Stuck { items_remaining });
                break;
            };

            self.phase = SolverPhase::Executing;
            if !board.apply_move(&choice.mv) {
                self.phase = SolverPhase::Stuck;
                result.failure = Some(FailureReason::Stuck { items_remaining });
                break;
            }
            debug!(
                "move {}: {} [score {}] {}",
                result.total_moves + 1,
                choice.mv,
                choice.score,
                choice.reason
            );
            memory.record_move(&choice.mv);
            result.total_moves += 1;
            result.move_sequence.push(choice.mv);
            result.notes.push(MoveNote {
                score: choice.score,
                reason: choice.reason,
            });

            if board.resolve_cascade() > 0 {
                memory.forget();
            }
            memory.remember_layout(&board);
        }

        result.total_matches = board.match_count();
        result.solve_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result.failure {
            None => info!(
                "[{}] solved in {} moves, {} matches ({:.1}ms)",
                result.strategy, result.total_moves, result.total_matches, result.solve_time_ms
            ),
            Some(reason) => info!(
                "[{}] failed after {} moves: {}",
                result.strategy, result.total_moves, reason
            ),
        }
        result
    }
}

/// Solves `level` with the default configuration.
pub fn solve_level(level: &LevelDefinition) -> SolveResult {
    Solver::new(SolverConfig::default()).solve(level)
}

/// Solves `level` with every built-in strategy plus seeded noise restarts and returns the
/// shortest successful solution.
///
/// Each profile is run once without noise and then `noise_runs` times with noise of
/// `noise_magnitude`, seeded `1..=noise_runs`. The move cap starts at the level's
/// `construction_moves` (or [`MAX_MOVES`] when that is 0) and shrinks to the best solution
/// found so far. If nothing succeeds, the clean [`BALANCED`] result is returned.
/// `solve_time_ms` covers the whole ensemble.
pub fn solve_level_best(level: &LevelDefinition, noise_runs: u32, noise_magnitude: i32) -> SolveResult {
    let start = Instant::now();
    let mut best: Option<SolveResult> = None;
    let mut cap = match level.construction_moves {
        0 => MAX_MOVES,
        moves => moves,
    };

    for strategy in ALL_STRATEGIES {
        for run in 0..=noise_runs {
            let (label, profile) = if run == 0 {
                (strategy.name.to_string(), strategy.clone())
            } else {
                (
                    format!("{}_n{}", strategy.name, run),
                    strategy.clone().with_noise(noise_magnitude),
                )
            };
            let config = SolverConfig {
                max_moves: cap,
                strategy: profile,
                noise_seed: u64::from(run),
            };
            let mut result = Solver::new(config).solve(level);
            result.strategy = label;
            let improves = best
                .as_ref()
                .map_or(true, |b| result.total_moves < b.total_moves);
            if result.success && improves {
                cap = result.total_moves.max(1);
                best = Some(result);
            }
        }
    }

    let mut best = best.unwrap_or_else(|| solve_level(level));
    best.solve_time_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!(
        "best for {}: {} moves via {}",
        level.label(),
        best.total_moves,
        best.strategy
    );
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::CAUTIOUS;
    use crate::level::RandomLevelParams;
    use crate::utils::{board_from_rows, level_from_rows};

    fn replay_is_legal(level: &LevelDefinition, result: &SolveResult) -> bool {
        let mut board = Board::from_level(level).unwrap();
        board.resolve_cascade();
        for mv in &result.move_sequence {
            if !board.apply_move(mv) {
                return false;
            }
            board.resolve_cascade();
        }
        board.is_complete() == result.success
    }

    #[test]
    fn test_solve_single_forced_move() {
        let level = level_from_rows(&["X X .", "X . ."]).unwrap();
        let result = solve_level(&level);
        assert!(result.success);
        assert_eq!(result.move_sequence, vec![Move::new(1, 0, 0, 2, "X")]);
        assert_eq!(result.total_matches, 1);
        assert_eq!(result.notes[0].reason, "1-move match (always taken)");
        assert!(result.failure_reason().is_none());
    }

    #[test]
    fn test_solve_pre_matched_level_needs_no_moves() {
        let level = level_from_rows(&["A A A", ". . ."]).unwrap();
        let mut solver = Solver::new(SolverConfig::default());
        let result = solver.solve(&level);
        assert!(result.success);
        assert_eq!(result.total_moves, 0);
        assert_eq!(result.total_matches, 1);
        assert_eq!(solver.phase(), SolverPhase::Solved);
    }

    #[test]
    fn test_solve_with_reveals() {
        let level = level_from_rows(&[
            "A B . / C A .",
            "B C . / A B .",
            "C . . / . . .",
        ])
        .unwrap();
        let result = solve_level(&level);
        assert!(result.success, "{:?}", result.failure_reason());
        assert_eq!(result.total_matches, 3);
        assert!(replay_is_legal(&level, &result));
    }

    #[test]
    fn test_stuck_board_reports_remaining_items() {
        let level = level_from_rows(&["A B C", "D E F"]).unwrap();
        let mut solver = Solver::new(SolverConfig::default());
        let result = solver.solve(&level);
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureReason::Stuck { items_remaining: 6 }));
        assert_eq!(
            result.failure_reason().as_deref(),
            Some("No valid moves. 6 items remaining.")
        );
        assert_eq!(solver.phase(), SolverPhase::Stuck);
    }

    #[test]
    fn test_move_cap_exceeded() {
        let level = level_from_rows(&["A B . / C A .", "B C . / A B .", "C . . / . . ."]).unwrap();
        let config = SolverConfig {
            max_moves: 1,
            ..SolverConfig::default()
        };
        let mut solver = Solver::new(config);
        let result = solver.solve(&level);
        assert!(!result.success);
        assert_eq!(result.total_moves, 1);
        assert_eq!(result.failure, Some(FailureReason::MoveCapExceeded { cap: 1 }));
        assert_eq!(solver.phase(), SolverPhase::MoveCapExceeded);
    }

    #[test]
    fn test_zero_cap_means_default() {
        let config = SolverConfig {
            max_moves: 0,
            ..SolverConfig::default()
        };
        assert_eq!(config.move_cap(), MAX_MOVES);
    }

    #[test]
    fn test_cancel_callback_sees_progress() {
        let level = level_from_rows(&["A B . / C A .", "B C . / A B .", "C . . / . . ."]).unwrap();
        let mut polls = Vec::new();
        let result = Solver::new(SolverConfig::default())
            .with_cancel(|moves, items, _elapsed| {
                polls.push((moves, items));
                moves >= 2
            })
            .solve(&level);
        assert_eq!(result.total_moves, 2);
        assert_eq!(result.move_sequence.len(), 2);
        assert!(matches!(result.failure, Some(FailureReason::Cancelled { .. })));
        assert_eq!(polls.first(), Some(&(0, 9)));
        assert_eq!(polls.len(), 3);
    }

    #[test]
    fn test_solve_board_directly() {
        let board = board_from_rows(&["X X .", "Y X .", "Y Y ."]).unwrap();
        let result = Solver::new(SolverConfig::with_strategy(CAUTIOUS)).solve_board(board);
        assert!(result.success);
        assert_eq!(result.strategy, "Cautious");
        assert_eq!(result.total_matches, 2);
    }

    #[test]
    fn test_solve_best_is_no_worse_than_balanced() {
        let params = RandomLevelParams::default();
        for seed in 0..3 {
            let level = LevelDefinition::new_random_with_seed(seed, &params);
            let clean = solve_level(&level);
            let best = solve_level_best(&level, 1, 8);
            if clean.success {
                assert!(best.success);
                assert!(best.total_moves <= clean.total_moves);
            }
            assert!(replay_is_legal(&level, &best));
        }
    }

    #[test]
    fn test_solve_best_starts_from_construction_moves() {
        let mut level = level_from_rows(&["A B . / C A .", "B C . / A B .", "C . . / . . ."]).unwrap();
        let clean = solve_level(&level);
        assert!(clean.success);

        level.construction_moves = clean.total_moves;
        let best = solve_level_best(&level, 0, DEFAULT_NOISE_MAGNITUDE);
        assert!(best.success);
        assert!(best.total_moves <= clean.total_moves);

        // No profile clears the board within two moves: the clean run is the fallback.
        level.construction_moves = 2;
        let best = solve_level_best(&level, 0, DEFAULT_NOISE_MAGNITUDE);
        assert!(best.success);
        assert_eq!(best.move_sequence, clean.move_sequence);
        assert_eq!(best.strategy, BALANCED.name);
    }

    #[test]
    fn test_solve_result_json_shape() {
        let level = level_from_rows(&["X X .", "X . ."]).unwrap();
        let value = serde_json::to_value(solve_level(&level)).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["failure_reason"], serde_json::Value::Null);
        assert_eq!(value["move_sequence"][0]["from_container_index"], 1);
        assert_eq!(value["move_sequence"][0]["to_slot"], 2);
        assert!(value.get("notes").is_none());
    }
}
