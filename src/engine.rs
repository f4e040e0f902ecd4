//! Core board model for the Sort Resort puzzle.
//!
//! This module defines the game's fundamental components:
//! - `Container`: a multi-slot, multi-row holder of items. Cell 0 of each slot is the
//!   front (reachable) cell, deeper cells are buried.
//! - `Board`: every container of a level plus the move and match counters. It applies
//!   moves, resolves matches and row advances to a fixed point, and enumerates legal moves.
//! - `Move`: a single front-cell-to-front-cell transfer between two unlocked containers.
use crate::error::LevelError;
use crate::level::LevelDefinition;
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Item types are opaque strings; items of one type are interchangeable.
pub type ItemId = String;

/// Number of identical front items needed to form a match in a standard container.
pub const MATCH_SIZE: usize = 3;

/// The kind of a container, which controls how it takes part in matching.
///
/// Single-slot containers expose exactly one slot and never match; they only serve
/// as parking space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    SingleSlot,
    #[default]
    #[serde(other)]
    Standard,
}

impl ContainerKind {
    /// Returns `true` if containers of this kind can clear their front row.
    pub fn participates_in_matches(self) -> bool {
        matches!(self, ContainerKind::Standard)
    }
}

/// One container on the board.
///
/// `slots[s][r]` holds the item at slot `s`, row `r`. Row 0 is the front row.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Container {
    id: String,
    kind: ContainerKind,
    max_rows: usize,
    locked: bool,
    unlock_matches_required: u32,
    unlock_progress: u32,
    slots: Vec<Vec<Option<ItemId>>>,
}

impl Container {
    /// Creates an empty, unlocked container.
    ///
    /// A single-slot container always gets exactly one slot regardless of `slot_count`.
    /// Both dimensions are clamped to at least one.
    pub fn new(id: impl Into<String>, kind: ContainerKind, slot_count: usize, max_rows: usize) -> Self {
        let slot_count = match kind {
            ContainerKind::SingleSlot => 1,
            ContainerKind::Standard => slot_count.max(1),
        };
        let max_rows = max_rows.max(1);
        Container {
            id: id.into(),
            kind,
            max_rows,
            locked: false,
            unlock_matches_required: 0,
            unlock_progress: 0,
            slots: vec![vec![None; max_rows]; slot_count],
        }
    }

    /// Marks the container as locked until `matches_required` board-wide matches occur.
    pub fn with_lock(mut self, matches_required: u32) -> Self {
        self.locked = true;
        self.unlock_matches_required = matches_required;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn unlock_matches_required(&self) -> u32 {
        self.unlock_matches_required
    }

    pub fn unlock_progress(&self) -> u32 {
        self.unlock_progress
    }

    /// Number of further matches before a locked container opens. Zero when unlocked.
    pub fn matches_until_unlock(&self) -> u32 {
        if self.locked {
            self.unlock_matches_required
                .saturating_sub(self.unlock_progress)
        } else {
            0
        }
    }

    /// Returns `true` if this container can clear its front row by matching.
    pub fn can_match(&self) -> bool {
        self.kind.participates_in_matches() && self.slot_count() >= MATCH_SIZE
    }

    /// Returns the item at `(slot, row)`, or `None` for an empty or out-of-range cell.
    pub fn cell(&self, slot: usize, row: usize) -> Option<&str> {
        self.slots.get(slot)?.get(row)?.as_deref()
    }

    /// Places (or clears) an item at `(slot, row)`.
    ///
    /// # Returns
    /// `false` if the coordinates are outside the container.
    pub fn set_cell(&mut self, slot: usize, row: usize, item: Option<ItemId>) -> bool {
        match self.slots.get_mut(slot).and_then(|s| s.get_mut(row)) {
            Some(cell) => {
                *cell = item;
                true
            }
            None => false,
        }
    }

    pub fn front_item(&self, slot: usize) -> Option<&str> {
        self.cell(slot, 0)
    }

    pub fn is_front_slot_empty(&self, slot: usize) -> bool {
        self.front_item(slot).is_none()
    }

    pub fn empty_front_slot_count(&self) -> usize {
        self.slots.iter().filter(|s| s[0].is_none()).count()
    }

    pub fn occupied_front_count(&self) -> usize {
        self.slot_count() - self.empty_front_slot_count()
    }

    pub fn first_empty_front_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s[0].is_none())
    }

    /// The occupied front cells, in slot order.
    pub fn front_items(&self) -> Vec<&str> {
        self.slots.iter().filter_map(|s| s[0].as_deref()).collect()
    }

    /// How many front cells hold `item`.
    pub fn front_count_of(&self, item: &str) -> usize {
        self.slots
            .iter()
            .filter(|s| s[0].as_deref() == Some(item))
            .count()
    }

    pub fn has_buried_items(&self) -> bool {
        self.slots.iter().any(|s| s[1..].iter().any(Option::is_some))
    }

    pub fn buried_item_count(&self) -> usize {
        self.slots
            .iter()
            .map(|s| s[1..].iter().filter(|c| c.is_some()).count())
            .sum()
    }

    /// Every buried item, slot by slot.
    pub fn buried_items(&self) -> Vec<&str> {
        self.slots
            .iter()
            .flat_map(|s| s[1..].iter().filter_map(|c| c.as_deref()))
            .collect()
    }

    /// The items that would reach the front row if the front row were cleared now:
    /// the shallowest buried item of each slot.
    pub fn items_that_would_advance(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter_map(|s| s[1..].iter().find_map(|c| c.as_deref()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.iter().all(Option::is_none))
    }

    pub fn item_count(&self) -> usize {
        self.slots
            .iter()
            .map(|s| s.iter().filter(|c| c.is_some()).count())
            .sum()
    }

    /// Returns the matched item type if every front cell is filled with the same type.
    pub fn front_match(&self) -> Option<&str> {
        if !self.can_match() {
            return None;
        }
        let first = self.slots[0][0].as_deref()?;
        self.slots
            .iter()
            .all(|s| s[0].as_deref() == Some(first))
            .then_some(first)
    }

    fn take_front(&mut self, slot: usize) -> Option<ItemId> {
        self.slots.get_mut(slot)?[0].take()
    }

    fn clear_front_row(&mut self) {
        for slot in &mut self.slots {
            slot[0] = None;
        }
    }

    /// Shifts every slot's buried items forward once the whole front row is empty.
    ///
    /// Each slot moves independently: its shallowest buried item lands in the front cell
    /// and everything behind it keeps its relative order.
    ///
    /// # Returns
    /// `true` if any item moved.
    pub fn advance_rows_if_cleared(&mut self) -> bool {
        if self.occupied_front_count() > 0 || !self.has_buried_items() {
            return false;
        }
        for slot in &mut self.slots {
            if let Some(offset) = slot.iter().position(Option::is_some) {
                slot.rotate_left(offset);
            }
        }
        true
    }

    /// Counts one board-wide match towards unlocking.
    ///
    /// # Returns
    /// `true` if this call unlocked the container.
    fn record_match_progress(&mut self) -> bool {
        if !self.locked {
            return false;
        }
        self.unlock_progress += 1;
        if self.unlock_progress >= self.unlock_matches_required {
            self.locked = false;
            return true;
        }
        false
    }
}

/// A single transfer of a front item into an empty front cell of another container.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    #[serde(rename = "from_container_index")]
    pub from_container: usize,
    pub from_slot: usize,
    #[serde(rename = "to_container_index")]
    pub to_container: usize,
    pub to_slot: usize,
    pub item_type: ItemId,
}

impl Move {
    pub fn new(
        from_container: usize,
        from_slot: usize,
        to_container: usize,
        to_slot: usize,
        item_type: impl Into<ItemId>,
    ) -> Self {
        Move {
            from_container,
            from_slot,
            to_container,
            to_slot,
            item_type: item_type.into(),
        }
    }

    /// Returns `true` if this move carries the same item type back along `other`'s path.
    pub fn reverses(&self, other: &Move) -> bool {
        self.item_type == other.item_type
            && self.from_container == other.to_container
            && self.to_container == other.from_container
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Move {} from C[{}].S[{}] to C[{}].S[{}]",
            self.item_type, self.from_container, self.from_slot, self.to_container, self.to_slot
        )
    }
}

/// The full state of a level during solving.
///
/// Cloning a `Board` is a deep copy; clones are used for lookahead and never share
/// state with the original.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Board {
    containers: Vec<Container>,
    move_count: u32,
    match_count: u32,
}

impl Board {
    /// Creates a board from already-built containers. Counters start at zero.
    pub fn new(containers: Vec<Container>) -> Self {
        Board {
            containers,
            move_count: 0,
            match_count: 0,
        }
    }

    /// Builds the board described by a level definition.
    ///
    /// Placements outside a container's dimensions are ignored. Pre-existing matches are
    /// left in place; call [`Board::resolve_cascade`] to settle them.
    ///
    /// # Errors
    /// Returns `LevelError::Empty` if the level has no containers.
    pub fn from_level(level: &LevelDefinition) -> Result<Self, LevelError> {
        if level.containers.is_empty() {
            return Err(LevelError::Empty);
        }

        let mut containers = Vec::with_capacity(level.containers.len());
        for def in &level.containers {
            let mut container = Container::new(
                def.id.clone(),
                def.container_type,
                def.effective_slot_count(),
                def.effective_max_rows(),
            );
            if def.is_locked {
                container = container.with_lock(def.unlock_matches_required);
            }
            for placement in &def.initial_items {
                let placed = usize::try_from(placement.slot)
                    .ok()
                    .zip(usize::try_from(placement.row).ok())
                    .is_some_and(|(slot, row)| {
                        container.set_cell(slot, row, Some(placement.id.clone()))
                    });
                if !placed {
                    trace!(
                        "ignoring {} at slot {} row {} in container {}",
                        placement.id,
                        placement.slot,
                        placement.row,
                        def.id
                    );
                }
            }
            containers.push(container);
        }
        Ok(Board::new(containers))
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    /// # Panics
    /// Panics if `index` is out of range.
    pub fn container(&self, index: usize) -> &Container {
        &self.containers[index]
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn match_count(&self) -> u32 {
        self.match_count
    }

    pub fn total_item_count(&self) -> usize {
        self.containers.iter().map(Container::item_count).sum()
    }

    /// Returns `true` once every container is empty.
    pub fn is_complete(&self) -> bool {
        self.containers.iter().all(Container::is_empty)
    }

    /// Returns `true` if any container's front row is ready to clear.
    pub fn has_pending_match(&self) -> bool {
        self.containers.iter().any(|c| c.front_match().is_some())
    }

    /// Returns `true` if `mv` can be applied to the current state.
    pub fn is_legal(&self, mv: &Move) -> bool {
        if mv.from_container == mv.to_container {
            return false;
        }
        let (Some(from), Some(to)) = (
            self.containers.get(mv.from_container),
            self.containers.get(mv.to_container),
        ) else {
            return false;
        };
        !from.is_locked()
            && !to.is_locked()
            && from.front_item(mv.from_slot) == Some(mv.item_type.as_str())
            && mv.to_slot < to.slot_count()
            && to.is_front_slot_empty(mv.to_slot)
    }

    /// Applies a move: lifts the source front item, drops it into the destination front
    /// cell and increments the move counter. If the source front row is now empty, its
    /// buried items advance immediately.
    ///
    /// Matches are not resolved here; see [`Board::resolve_cascade`].
    ///
    /// # Returns
    /// * `true` if the move was legal and has been applied.
    /// * `false` if the move was rejected; the board is unchanged.
    pub fn apply_move(&mut self, mv: &Move) -> bool {
        if !self.is_legal(mv) {
            return false;
        }
        let item = self.containers[mv.from_container].take_front(mv.from_slot);
        self.containers[mv.to_container].set_cell(mv.to_slot, 0, item);
        self.move_count += 1;
        self.containers[mv.from_container].advance_rows_if_cleared();
        true
    }

    /// Clears matches and advances rows until the board stops changing.
    ///
    /// Each pass visits every container: a full, uniform front row is cleared (counting a
    /// match, advancing unlock progress on every locked container and then advancing that
    /// container's rows), and any container whose front row is empty while buried items
    /// remain has its rows advanced. Passes repeat until one changes nothing, so chains of
    /// reveal-then-match are fully settled.
    ///
    /// # Returns
    /// The number of matches cleared by this call.
    pub fn resolve_cascade(&mut self) -> u32 {
        let mut matches = 0;
        loop {
            let mut changed = false;
            for index in 0..self.containers.len() {
                let matched = self.containers[index].front_match().map(str::to_owned);
                if let Some(item) = matched {
                    self.containers[index].clear_front_row();
                    self.match_count += 1;
                    matches += 1;
                    trace!("match of {} in container {}", item, self.containers[index].id);
                    for container in &mut self.containers {
                        if container.record_match_progress() {
                            trace!("container {} unlocked", container.id);
                        }
                    }
                    self.containers[index].advance_rows_if_cleared();
                    changed = true;
                } else if self.containers[index].advance_rows_if_cleared() {
                    changed = true;
                }
            }
            if !changed {
                return matches;
            }
        }
    }

    /// Enumerates every legal move.
    ///
    /// For each occupied front cell of an unlocked container, one move is produced per empty
    /// front cell of every other unlocked container. Locked containers never appear.
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        for (from_ci, from_c) in self.containers.iter().enumerate() {
            if from_c.is_locked() {
                continue;
            }
            for from_s in 0..from_c.slot_count() {
                let Some(item) = from_c.front_item(from_s) else {
                    continue;
                };
                for (to_ci, to_c) in self.containers.iter().enumerate() {
                    if to_ci == from_ci || to_c.is_locked() {
                        continue;
                    }
                    for to_s in (0..to_c.slot_count()).filter(|&s| to_c.is_front_slot_empty(s)) {
                        moves.push(Move::new(from_ci, from_s, to_ci, to_s, item));
                    }
                }
            }
        }
        moves
    }

    /// Enumerates the legal moves with score-equivalent duplicates removed.
    ///
    /// Only the first empty front slot of each destination is used, and among completely
    /// empty unlocked containers only the first one of each slot count is a destination.
    pub fn distinct_moves(&self) -> Vec<Move> {
        let mut seen_empty_shapes = HashSet::new();
        let destinations: Vec<(usize, usize)> = self
            .containers
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_locked())
            .filter(|(_, c)| !c.is_empty() || seen_empty_shapes.insert(c.slot_count()))
            .filter_map(|(ci, c)| c.first_empty_front_slot().map(|s| (ci, s)))
            .collect();

        let mut moves = Vec::new();
        for (from_ci, from_c) in self.containers.iter().enumerate() {
            if from_c.is_locked() {
                continue;
            }
            for from_s in 0..from_c.slot_count() {
                let Some(item) = from_c.front_item(from_s) else {
                    continue;
                };
                for &(to_ci, to_s) in destinations.iter().filter(|(ci, _)| *ci != from_ci) {
                    moves.push(Move::new(from_ci, from_s, to_ci, to_s, item));
                }
            }
        }
        moves
    }
}

impl fmt::Display for Board {
    /// One line per container: rows from front to back, `.` for an empty cell.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, container) in self.containers.iter().enumerate() {
            write!(f, "{:>2} {:<12}", index, container.id)?;
            for row in 0..container.max_rows() {
                let cells: Vec<&str> = (0..container.slot_count())
                    .map(|s| container.cell(s, row).unwrap_or("."))
                    .collect();
                write!(f, " [{}]", cells.join(" "))?;
            }
            if container.is_locked() {
                write!(
                    f,
                    " locked {}/{}",
                    container.unlock_progress(),
                    container.unlock_matches_required()
                )?;
            }
            if index + 1 < self.containers.len() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::board_from_rows;

    #[test]
    fn test_single_slot_container_has_one_slot() {
        let container = Container::new("s", ContainerKind::SingleSlot, 3, 2);
        assert_eq!(container.slot_count(), 1);
        assert!(!container.can_match());
    }

    #[test]
    fn test_front_match_requires_full_uniform_row() {
        let board = board_from_rows(&["A A A", "A A .", "A B A"]).unwrap();
        assert_eq!(board.container(0).front_match(), Some("A"));
        assert_eq!(board.container(1).front_match(), None);
        assert_eq!(board.container(2).front_match(), None);
    }

    #[test]
    fn test_apply_move_transfers_front_item() {
        let mut board = board_from_rows(&["A B .", "C . ."]).unwrap();
        let mv = Move::new(0, 1, 1, 2, "B");
        assert!(board.apply_move(&mv));
        assert_eq!(board.container(0).front_item(1), None);
        assert_eq!(board.container(1).front_item(2), Some("B"));
        assert_eq!(board.move_count(), 1);
    }

    #[test]
    fn test_apply_move_rejects_illegal_moves() {
        let mut board = board_from_rows(&["A B .", "C D E", "L1:F . ."]).unwrap();
        let before = board.clone();
        // Destination cell occupied.
        assert!(!board.apply_move(&Move::new(0, 0, 1, 0, "A")));
        // Wrong item type at source.
        assert!(!board.apply_move(&Move::new(0, 0, 0, 2, "B")));
        // Same container.
        assert!(!board.apply_move(&Move::new(0, 0, 0, 2, "A")));
        // Locked destination.
        assert!(!board.apply_move(&Move::new(0, 0, 2, 1, "A")));
        assert_eq!(board, before);
    }

    #[test]
    fn test_apply_move_advances_source_rows() {
        let mut board = board_from_rows(&["A . . / B C .", ". . ."]).unwrap();
        assert!(board.apply_move(&Move::new(0, 0, 1, 0, "A")));
        let source = board.container(0);
        assert_eq!(source.front_items(), vec!["B", "C"]);
        assert!(!source.has_buried_items());
    }

    #[test]
    fn test_resolve_cascade_clears_match_and_reveals() {
        let mut board = board_from_rows(&["A A A / B . C", ". . ."]).unwrap();
        assert_eq!(board.resolve_cascade(), 1);
        assert_eq!(board.match_count(), 1);
        assert_eq!(board.container(0).front_item(0), Some("B"));
        assert_eq!(board.container(0).front_item(1), None);
        assert_eq!(board.container(0).front_item(2), Some("C"));
        assert_eq!(board.total_item_count(), 2);
    }

    #[test]
    fn test_resolve_cascade_chains_to_fixed_point() {
        // The first match reveals a second match, which reveals a third row.
        let mut board = board_from_rows(&["A A A / B B B / C . ."]).unwrap();
        assert_eq!(board.resolve_cascade(), 2);
        assert_eq!(board.container(0).front_items(), vec!["C"]);
    }

    #[test]
    fn test_resolve_cascade_is_idempotent_on_stable_board() {
        let mut board = board_from_rows(&["A B . / C C C", "D . ."]).unwrap();
        let before = board.clone();
        assert_eq!(board.resolve_cascade(), 0);
        assert_eq!(board, before);
    }

    #[test]
    fn test_unlock_after_required_matches() {
        let mut board = board_from_rows(&["A A A / B B B", "L2:C . ."]).unwrap();
        assert!(board.container(1).is_locked());
        assert_eq!(board.resolve_cascade(), 2);
        assert!(!board.container(1).is_locked());
        assert_eq!(board.container(1).unlock_progress(), 2);
    }

    #[test]
    fn test_item_count_drops_by_slot_count_per_match() {
        let mut board = board_from_rows(&["A A A / B C .", "D . ."]).unwrap();
        let before = board.total_item_count();
        let matches = board.resolve_cascade() as usize;
        assert_eq!(before - board.total_item_count(), matches * 3);
    }

    #[test]
    fn test_legal_moves_skip_locked_and_same_container() {
        let board = board_from_rows(&["A . .", "B C .", "L1:D . ."]).unwrap();
        let moves = board.legal_moves();
        // A -> two empty cells in container 1; B and C -> two empty cells in container 0.
        assert_eq!(moves.len(), 1 + 2 + 2);
        for mv in &moves {
            assert_ne!(mv.from_container, mv.to_container);
            assert_ne!(mv.from_container, 2);
            assert_ne!(mv.to_container, 2);
        }
    }

    #[test]
    fn test_legal_moves_empty_when_no_free_cell() {
        let board = board_from_rows(&["A B C", "D E F"]).unwrap();
        assert!(board.legal_moves().is_empty());
        assert!(board.distinct_moves().is_empty());
    }

    #[test]
    fn test_distinct_moves_prunes_equivalent_destinations() {
        let board = board_from_rows(&["A B .", ". . .", ". . ."]).unwrap();
        let moves = board.distinct_moves();
        // A and B each go to the first empty slot of container 1 only.
        assert_eq!(
            moves,
            vec![Move::new(0, 0, 1, 0, "A"), Move::new(0, 1, 1, 0, "B")]
        );
        assert_eq!(board.legal_moves().len(), 2 * 6);
    }

    #[test]
    fn test_move_reverses() {
        let mv = Move::new(0, 1, 2, 0, "X");
        assert!(Move::new(2, 0, 0, 1, "X").reverses(&mv));
        assert!(Move::new(2, 2, 0, 0, "X").reverses(&mv));
        assert!(!Move::new(2, 0, 0, 1, "Y").reverses(&mv));
        assert!(!Move::new(0, 1, 2, 0, "X").reverses(&mv));
    }

    #[test]
    fn test_display_board_formatting() {
        let board = board_from_rows(&["A . / B C", "L2:D"]).unwrap();
        let text = board.to_string();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("[A .] [B C]"));
        assert!(text.contains("locked 0/2"));
    }
}
