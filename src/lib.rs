//! # Sort Resort Solver Library
//!
//! This library models the Sort Resort tile-sorting puzzle and provides a greedy
//! heuristic solver and a difficulty analyzer built on top of it.
//!
//! It is used by three binaries:
//! - `solve_level`: Solves one level JSON file and prints the move list (or the result as JSON).
//! - `rate_levels`: Rates a set of level files and prints a difficulty table per world.
//! - `strategy_evaluator`: Compares the built-in strategy profiles over seeded random levels.
//!
//! ## Modules
//! - `level`: Level definitions as read from the game's JSON files, plus random level generation.
//! - `engine`: The board representation (`Board`, `Container`, `Move`) and all game mechanics
//!   (moves, matches, row advancement, unlocking, legal move enumeration).
//! - `heuristics`: Move scoring, strategy profiles and the two-tier move choice.
//! - `solver`: The solver driver (`Solver`, `solve_level`, `solve_level_best`) and `SolveResult`.
//! - `complexity`: Difficulty scores and tiers for levels.
//! - `replay`: Best-effort playback of a move list onto a live, possibly diverged board.
//! - `error`: Error and failure types.
//! - `utils`: Utility functions, such as building levels from a compact text notation.

pub mod complexity;
pub mod engine;
pub mod error;
pub mod heuristics;
pub mod level;
pub mod replay;
pub mod solver;
pub mod utils;
