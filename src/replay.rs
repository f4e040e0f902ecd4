//! Best-effort playback of a solved move list onto a live board.
//!
//! The live board may not match the board the solver planned against (external unlock
//! events, a player touching the board mid-playback). Each planned move is matched to the
//! live board by container, slot and item type; small differences are adjusted and moves
//! that cannot be placed are skipped with a warning. Playback never fails outright.
use crate::engine::{Board, Move};
use crate::error::LevelError;
use crate::level::LevelDefinition;
use crate::solver::SolveResult;
use log::{debug, warn};
use serde::Serialize;
use std::fmt;

/// How the live board differed from the plan for one move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Divergence {
    /// A container index does not exist on the live board.
    ContainerMissing,
    /// The source or destination is locked on the live board.
    ContainerLocked,
    /// The planned source cell is empty.
    ItemMissing,
    /// The planned source cell holds another item type.
    WrongItem { found: String },
    /// The planned destination cell is taken.
    DestinationOccupied,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Divergence::ContainerMissing => write!(f, "container missing"),
            Divergence::ContainerLocked => write!(f, "container locked"),
            Divergence::ItemMissing => write!(f, "item missing at source"),
            Divergence::WrongItem { found } => write!(f, "found {found} at source"),
            Divergence::DestinationOccupied => write!(f, "destination occupied"),
        }
    }
}

/// What happened to one planned move.
#[derive(Clone, Debug, PartialEq)]
pub enum ReplayStep {
    Applied(Move),
    Adjusted {
        planned: Move,
        applied: Move,
        divergence: Divergence,
    },
    Skipped {
        planned: Move,
        divergence: Divergence,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub applied: u32,
    pub adjusted: u32,
    pub skipped: u32,
    pub matches: u32,
    pub board_cleared: bool,
}

/// Playback state for one level: the live board, the plan and the position in it.
pub struct ReplaySession {
    board: Board,
    moves: Vec<Move>,
    next: usize,
    report: ReplayReport,
}

impl ReplaySession {
    /// Starts playback of `moves` on `board`. Pending matches are resolved first.
    pub fn new(mut board: Board, moves: Vec<Move>) -> Self {
        board.resolve_cascade();
        ReplaySession {
            board,
            moves,
            next: 0,
            report: ReplayReport::default(),
        }
    }

    /// Starts playback of a solve result on a fresh board built from `level`.
    pub fn from_level(level: &LevelDefinition, result: &SolveResult) -> Result<Self, LevelError> {
        let board = Board::from_level(level)?;
        Ok(ReplaySession::new(board, result.move_sequence.clone()))
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn remaining(&self) -> usize {
        self.moves.len() - self.next
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.moves.len()
    }

    /// Plays the next planned move.
    ///
    /// # Returns
    /// `None` once every planned move has been handled.
    pub fn step(&mut self) -> Option<ReplayStep> {
        let planned = self.moves.get(self.next)?.clone();
        self.next += 1;

        let step = match self.locate(&planned) {
            Ok((applied, divergence)) => {
                if !self.board.apply_move(&applied) {
                    self.skip(planned, Divergence::ItemMissing)
                } else {
                    self.report.matches += self.board.resolve_cascade();
                    match divergence {
                        None => {
                            self.report.applied += 1;
                            ReplayStep::Applied(applied)
                        }
                        Some(divergence) => {
                            warn!("{planned} diverged ({divergence}), played {applied}");
                            self.report.adjusted += 1;
                            ReplayStep::Adjusted {
                                planned,
                                applied,
                                divergence,
                            }
                        }
                    }
                }
            }
            Err(divergence) => self.skip(planned, divergence),
        };
        self.report.board_cleared = self.board.is_complete();
        Some(step)
    }

    /// Plays every remaining move and returns the final report.
    pub fn run_to_end(&mut self) -> ReplayReport {
        while let Some(step) = self.step() {
            debug!("replay: {step:?}");
        }
        self.report()
    }

    pub fn report(&self) -> ReplayReport {
        self.report.clone()
    }

    fn skip(&mut self, planned: Move, divergence: Divergence) -> ReplayStep {
        warn!("skipping {planned}: {divergence}");
        self.report.skipped += 1;
        ReplayStep::Skipped {
            planned,
            divergence,
        }
    }

    /// Maps a planned move onto the live board.
    ///
    /// The source slot falls back to any front slot of the same container holding the item
    /// type; the destination slot falls back to the first free front slot.
    fn locate(&self, planned: &Move) -> Result<(Move, Option<Divergence>), Divergence> {
        let containers = self.board.containers();
        let (Some(from), Some(to)) = (
            containers.get(planned.from_container),
            containers.get(planned.to_container),
        ) else {
            return Err(Divergence::ContainerMissing);
        };
        if from.is_locked() || to.is_locked() {
            return Err(Divergence::ContainerLocked);
        }

        let mut applied = planned.clone();
        let mut divergence = None;

        match from.front_item(planned.from_slot) {
            Some(item) if item == planned.item_type => {}
            found => {
                let reason = match found {
                    Some(item) => Divergence::WrongItem {
                        found: item.to_string(),
                    },
                    None => Divergence::ItemMissing,
                };
                applied.from_slot = (0..from.slot_count())
                    .find(|&s| from.front_item(s) == Some(planned.item_type.as_str()))
                    .ok_or_else(|| reason.clone())?;
                divergence = Some(reason);
            }
        }

        if !to.is_front_slot_empty(planned.to_slot) || planned.to_slot >= to.slot_count() {
            applied.to_slot = to
                .first_empty_front_slot()
                .ok_or(Divergence::DestinationOccupied)?;
            if divergence.is_none() {
                divergence = Some(Divergence::DestinationOccupied);
            }
        }

        Ok((applied, divergence))
    }
}
