//! Move selection heuristics for the greedy solver.
//!
//! Selection is two-tiered. A one-move match (a single transfer that completes a front
//! row) is always taken first. Otherwise every distinct legal move is simulated on a clone
//! of the board and scored with an additive model; the highest score wins. The score
//! bands keep a fixed priority: certain match > completable pair > reveal > stuck shuffle,
//! and the oscillation penalties outweigh everything else.
use crate::engine::{Board, Container, Move};
use log::debug;
use rand::rngs::SmallRng;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Score reported for a forced one-move match.
pub const ONE_MOVE_MATCH_SCORE: i32 = 999;
/// Penalty for undoing the previous move.
pub const REVERSAL_PENALTY: i32 = 1000;
/// Penalty for undoing any move still in the recent-move window.
pub const PATTERN_PENALTY: i32 = 500;
/// Number of committed moves remembered for the pattern penalty.
pub const PATTERN_WINDOW: usize = 10;

/// Locked containers this close to opening count as "about to unlock" for deadlock checks.
const DEADLOCK_UNLOCK_HORIZON: u32 = 2;
/// How many candidates are written to the debug log per decision.
const LOGGED_CANDIDATES: usize = 3;

/// Weight profile applied on top of the base scores.
///
/// Each weight rescales one category of score contributions; `1.0` leaves it untouched.
/// `noise_magnitude` adds a uniform random offset in `-n..=n` to every candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverStrategy {
    pub name: &'static str,
    pub pair_weight: f64,
    pub reveal_weight: f64,
    pub caution_weight: f64,
    pub noise_magnitude: i32,
}

pub const BALANCED: SolverStrategy = SolverStrategy {
    name: "Balanced",
    pair_weight: 1.0,
    reveal_weight: 1.0,
    caution_weight: 1.0,
    noise_magnitude: 0,
};

pub const PAIR_FOCUSED: SolverStrategy = SolverStrategy {
    name: "PairFocused",
    pair_weight: 1.4,
    reveal_weight: 0.85,
    caution_weight: 1.0,
    noise_magnitude: 0,
};

pub const REVEAL_FOCUSED: SolverStrategy = SolverStrategy {
    name: "RevealFocused",
    pair_weight: 0.85,
    reveal_weight: 1.4,
    caution_weight: 1.0,
    noise_magnitude: 0,
};

pub const CAUTIOUS: SolverStrategy = SolverStrategy {
    name: "Cautious",
    pair_weight: 1.0,
    reveal_weight: 0.9,
    caution_weight: 1.6,
    noise_magnitude: 0,
};

pub const AGGRESSIVE: SolverStrategy = SolverStrategy {
    name: "Aggressive",
    pair_weight: 1.1,
    reveal_weight: 1.3,
    caution_weight: 0.5,
    noise_magnitude: 0,
};

pub const ALL_STRATEGIES: [SolverStrategy; 5] =
    [BALANCED, PAIR_FOCUSED, REVEAL_FOCUSED, CAUTIOUS, AGGRESSIVE];

impl SolverStrategy {
    /// The same profile with random score noise enabled.
    pub fn with_noise(mut self, magnitude: i32) -> Self {
        self.noise_magnitude = magnitude.max(0);
        self
    }

    /// Looks up a built-in profile by name, ignoring case and `-`/`_`.
    pub fn by_name(name: &str) -> Option<SolverStrategy> {
        let wanted: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        ALL_STRATEGIES
            .into_iter()
            .find(|s| s.name.to_lowercase() == wanted)
    }
}

impl Default for SolverStrategy {
    fn default() -> Self {
        BALANCED
    }
}

/// How reachable the copies of one item type are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ItemAccess {
    /// Copies in an unlocked container's front row.
    pub accessible: u32,
    /// Copies that will become accessible after one more match or one more move.
    pub nearly_accessible: u32,
    pub total: u32,
}

impl ItemAccess {
    /// An item type is actionable when a pair of it is realistically completable soon.
    pub fn is_actionable(&self) -> bool {
        self.accessible + self.nearly_accessible >= 2
    }
}

/// Classifies every item type on the board by accessibility.
///
/// A front-row copy in an unlocked container is accessible. A copy is nearly accessible when
/// it sits in the front row of a locked container one match away from opening, or in row 1
/// of an unlocked container whose front row holds at most one item and would advance.
pub fn analyze_accessibility(board: &Board) -> BTreeMap<String, ItemAccess> {
    let mut result: BTreeMap<String, ItemAccess> = BTreeMap::new();

    for container in board.containers() {
        let near_unlock = container.is_locked() && container.matches_until_unlock() <= 1;
        let near_advance = !container.is_locked()
            && container.occupied_front_count() <= 1
            && container.has_buried_items();

        for slot in 0..container.slot_count() {
            for row in 0..container.max_rows() {
                let Some(item) = container.cell(slot, row) else {
                    continue;
                };
                let entry = result.entry(item.to_string()).or_default();
                entry.total += 1;
                if row == 0 && !container.is_locked() {
                    entry.accessible += 1;
                } else if (row == 0 && near_unlock) || (row == 1 && near_advance) {
                    entry.nearly_accessible += 1;
                }
            }
        }
    }
    result
}

/// Returns `true` if some unlocked container holds all but one copy of `item` needed for a
/// match plus a free front cell, i.e. it is waiting for exactly this item.
pub fn has_waiting_pair_for_item(board: &Board, item: &str) -> bool {
    board.containers().iter().any(|c| {
        !c.is_locked()
            && c.can_match()
            && c.front_count_of(item) == c.slot_count() - 1
            && c.empty_front_slot_count() >= 1
    })
}

/// Finds a single move that completes a match right away.
///
/// The destination must be an unlocked, matchable container whose front row holds all but
/// one copy of a type and exactly one free cell; the missing copy must sit in the front row
/// of another unlocked container. When several such moves exist, the one revealing the most
/// buried items wins (reveals at the source, reveals completing a waiting pair elsewhere,
/// and reveals at the destination once it clears). Ties keep the first move found.
pub fn find_one_move_match(board: &Board) -> Option<Move> {
    let mut best: Option<(i32, Move)> = None;

    for (ci, container) in board.containers().iter().enumerate() {
        if container.is_locked() || !container.can_match() {
            continue;
        }
        if container.empty_front_slot_count() != 1 {
            continue;
        }
        let Some(empty_slot) = container.first_empty_front_slot() else {
            continue;
        };
        let front = container.front_items();
        let Some(target) = front
            .iter()
            .find(|item| container.front_count_of(item) == container.slot_count() - 1)
        else {
            continue;
        };

        for (oci, other) in board.containers().iter().enumerate() {
            if oci == ci || other.is_locked() {
                continue;
            }
            for os in 0..other.slot_count() {
                if other.front_item(os) != Some(*target) {
                    continue;
                }
                let mut reveal_score = 0;
                if other.occupied_front_count() == 1 && other.has_buried_items() {
                    let revealed = other.items_that_would_advance();
                    reveal_score += 100 + revealed.len() as i32 * 20;
                    for item in &revealed {
                        if has_waiting_pair_for_item(board, item) {
                            reveal_score += 50;
                        }
                    }
                }
                if container.has_buried_items() {
                    reveal_score += 50 + container.items_that_would_advance().len() as i32 * 15;
                }

                if best.as_ref().map_or(true, |(score, _)| reveal_score > *score) {
                    best = Some((reveal_score, Move::new(oci, os, ci, empty_slot, *target)));
                }
            }
        }
    }
    best.map(|(_, mv)| mv)
}

/// Running score of one candidate, split into the categories the strategy weights scale.
#[derive(Debug, Default)]
struct ScoreCard {
    score: i32,
    pair: i32,
    reveal: i32,
    penalty: i32,
    reasons: Vec<String>,
}

impl ScoreCard {
    fn add(&mut self, points: i32, reason: impl Into<String>) {
        self.score += points;
        self.reasons.push(reason.into());
    }

    fn pair(&mut self, points: i32, reason: impl Into<String>) {
        self.pair += points;
        self.add(points, reason);
    }

    fn reveal(&mut self, points: i32, reason: impl Into<String>) {
        self.reveal += points;
        self.add(points, reason);
    }

    fn penalty(&mut self, points: i32, reason: impl Into<String>) {
        self.penalty += points;
        self.add(points, reason);
    }

    fn finish(self, strategy: &SolverStrategy) -> (i32, String) {
        let mut score = self.score;
        score += (self.pair as f64 * (strategy.pair_weight - 1.0)) as i32;
        score += (self.reveal as f64 * (strategy.reveal_weight - 1.0)) as i32;
        score += (self.penalty as f64 * (strategy.caution_weight - 1.0)) as i32;
        let reason = if self.reasons.is_empty() {
            "neutral".to_string()
        } else {
            self.reasons.join(", ")
        };
        (score, reason)
    }
}

/// Counts front-row copies of `item` across unlocked containers.
fn accessible_front_count(board: &Board, item: &str) -> usize {
    board
        .containers()
        .iter()
        .filter(|c| !c.is_locked())
        .map(|c| c.front_count_of(item))
        .sum()
}

/// Returns `true` if two or more of `items` share a type.
fn contains_pair<'a>(items: impl IntoIterator<Item = &'a str>) -> bool {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for item in items {
        *counts.entry(item).or_default() += 1;
    }
    counts.values().any(|&n| n >= 2)
}

/// Scores one candidate move.
///
/// `board` is the state before the move and `after` the same state with the move applied
/// (source rows advanced, matches not yet resolved). Higher is better.
///
/// # Returns
/// The weighted score and a comma separated list of the factors that contributed.
pub fn score_move(
    board: &Board,
    after: &Board,
    mv: &Move,
    access: &BTreeMap<String, ItemAccess>,
    strategy: &SolverStrategy,
) -> (i32, String) {
    let mut card = ScoreCard::default();
    let item = mv.item_type.as_str();
    let from_c = board.container(mv.from_container);
    let to_c = board.container(mv.to_container);

    let status = access.get(item).copied().unwrap_or_default();
    let acc = status.accessible;
    let near = status.nearly_accessible;
    let actionable = status.is_actionable();

    let dest_items = to_c.front_items();
    let matching_at_dest = to_c.front_count_of(item);
    let dest_hides_item = to_c.buried_items().contains(&item);

    // Match creation and match enabling.
    let mut creates_match = false;
    let mut enables_match = false;
    let mut enables_with_pair = false;
    let mut temporary_parking = false;
    if after.has_pending_match() {
        card.add(200, "creates match");
        creates_match = true;
    } else if let Some(follow_up) = find_one_move_match(after) {
        enables_match = true;
        if matching_at_dest >= 1 {
            card.add(120, "enables match + creates pair");
            enables_with_pair = true;
        } else if dest_items.is_empty() {
            card.add(80, "enables match (to empty)");
        } else {
            card.add(40, "enables match (temp location)");
            temporary_parking = true;
        }

        let fu_from = after.container(follow_up.from_container);
        if fu_from.occupied_front_count() == 1 && fu_from.has_buried_items() {
            let revealed = fu_from.items_that_would_advance().len() as i32;
            card.reveal(20 + revealed * 10, format!("follow-up reveals {revealed} items"));
        }

        let mut fu_state = after.clone();
        if fu_state.apply_move(&follow_up) {
            fu_state.resolve_cascade();
            if find_one_move_match(&fu_state).is_some() {
                card.reveal(15, "follow-up chains into match");
            }
        }
    }

    // Pair creation at the destination.
    let mut pair_credit = false;
    let mut pair_room_will_open = false;
    if matching_at_dest == 1 && !enables_with_pair {
        let third_accessible = acc >= 3;
        let third_nearly = acc + near >= 3;
        let has_room_for_third = to_c.empty_front_slot_count() >= 2;

        if third_accessible && has_room_for_third {
            card.pair(180, "creates completable pair");
            pair_credit = true;
        } else if third_accessible {
            card.pair(-50, "creates BLOCKED pair (no room for 3rd)");
        } else if third_nearly && has_room_for_third {
            if dest_hides_item {
                card.pair(-200, "SELF-BLOCKING pair (3rd hidden HERE)");
            } else {
                card.pair(100, "creates near-completable pair (3rd nearly accessible)");
                pair_credit = true;
            }
        } else if has_room_for_third {
            card.pair(20, "creates waiting pair (3rd hidden)");
            pair_credit = true;
            if to_c.has_buried_items() {
                card.pair(-80, "pair blocks reveals");
            }
        } else {
            let blocking: BTreeSet<&str> =
                dest_items.iter().copied().filter(|i| *i != item).collect();
            let room_will_open = !blocking.is_empty()
                && blocking
                    .iter()
                    .all(|blocker| accessible_front_count(after, blocker) >= 3);
            if room_will_open {
                card.pair(30, "creates pair (room will open - blocking type clearable)");
                pair_credit = true;
                pair_room_will_open = true;
            } else {
                card.pair(-100, "creates useless pair (hidden + blocked)");
            }
        }
    } else if matching_at_dest == 0 && !dest_items.is_empty() && !temporary_parking {
        card.penalty(-10, "mixes items");
    }

    if enables_with_pair && dest_hides_item {
        card.pair(-200, "SELF-BLOCKING pair (3rd hidden HERE)");
    }

    // Actionability.
    if actionable {
        card.add(30, "actionable item");
    } else if !(creates_match || enables_match || pair_credit) {
        card.penalty(-40, "stuck item shuffle");
    }

    // Breaking up a pair at the source.
    if from_c.front_count_of(item) == 2 && matching_at_dest != 2 && acc >= 3 {
        if from_c.empty_front_slot_count() >= 1 {
            card.pair(-150, "DESTROYS completable pair");
        } else {
            card.pair(-30, "breaks blocked pair");
        }
    }

    // Row advancement at the source.
    let from_occupied = from_c.occupied_front_count();
    let triggers_reveal = from_occupied == 1 && from_c.has_buried_items();
    if triggers_reveal {
        let revealed = from_c.items_that_would_advance();
        card.reveal(
            100 + revealed.len() as i32 * 25,
            format!("triggers row advance ({} items)", revealed.len()),
        );
        if let Some(waited) = revealed
            .iter()
            .find(|r| has_waiting_pair_for_item(board, r))
        {
            card.reveal(80, format!("reveals {waited} for waiting pair"));
        }
        if matching_at_dest == 1 && acc >= 3 {
            card.reveal(60, "combo: completable pair + reveal");
        } else if matching_at_dest == 1 && acc + near >= 3 {
            card.reveal(50, "combo: near-pair + reveal");
        }
        if contains_pair(revealed) {
            card.pair(40, "reveals source pair");
        }
    } else if from_c.has_buried_items() {
        let hidden = from_c.buried_item_count() as i32;
        card.reveal(30 + hidden * 10, format!("progress toward reveal ({hidden} hidden)"));
    }
    if !triggers_reveal && from_occupied > 1 {
        let remaining = (0..from_c.slot_count())
            .filter(|&s| s != mv.from_slot)
            .filter_map(|s| from_c.front_item(s));
        if contains_pair(remaining) {
            card.pair(25, "exposes source pair");
        }
    }

    // Destination quality, judged on the cells left free once the item has landed.
    if after.container(mv.to_container).empty_front_slot_count() <= 1 && !pair_room_will_open {
        card.penalty(-15, "fills container");
    }

    // Deadlock prevention.
    let mut settled = after.clone();
    if settled.resolve_cascade() == 0 {
        let free_cells: usize = settled
            .containers()
            .iter()
            .filter(|c| !c.is_locked())
            .map(Container::empty_front_slot_count)
            .sum();
        let unlocks_coming = settled
            .containers()
            .iter()
            .any(|c| c.is_locked() && c.matches_until_unlock() <= DEADLOCK_UNLOCK_HORIZON);
        match (free_cells, unlocks_coming) {
            (0, false) => card.penalty(-500, "DEADLOCK: leaves 0 empty slots"),
            (0, true) => card.penalty(-150, "tight board (unlocks coming)"),
            (1, false) => card.penalty(-100, "near-deadlock: only 1 empty slot left"),
            (2, false) => card.penalty(-30, "low slots remaining"),
            _ => {}
        }
    }

    // Staging into an empty container.
    if dest_items.is_empty() {
        if triggers_reveal {
            card.add(20, "productive staging");
        } else {
            card.penalty(-5, "staging move");
        }
    }

    // Moving an actionable item away from a container with room to match it in place.
    if from_c.empty_front_slot_count() >= 2 && actionable && matching_at_dest == 0 && !triggers_reveal {
        card.penalty(-35, "disrupts match-in-place potential");
    }

    // Completing a match in a container that hides more items.
    let will_complete = matching_at_dest >= 2 || (matching_at_dest == 1 && acc >= 3);
    if to_c.has_buried_items() && matching_at_dest >= 1 && will_complete {
        let hidden = to_c.buried_item_count() as i32;
        card.reveal(50 + hidden * 20, format!("triple reveals {hidden} hidden item(s)"));
        if to_c.buried_items().iter().any(|h| *h != item) {
            card.reveal(30, "clears container for revealed items");
        }
    }

    card.finish(strategy)
}

/// A chosen move with its score and the factors behind it.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredMove {
    pub mv: Move,
    pub score: i32,
    pub reason: String,
}

/// What the solver remembers between decisions to avoid going in circles.
///
/// Holds the last committed move, a window of the last [`PATTERN_WINDOW`] moves and every
/// board layout produced since the last match. All of it is cleared when a match occurs.
#[derive(Debug, Default)]
pub struct SearchMemory {
    last_move: Option<Move>,
    recent: VecDeque<Move>,
    visited: HashSet<Vec<Container>>,
}

impl SearchMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a committed move.
    pub fn record_move(&mut self, mv: &Move) {
        self.last_move = Some(mv.clone());
        self.recent.push_back(mv.clone());
        if self.recent.len() > PATTERN_WINDOW {
            self.recent.pop_front();
        }
    }

    /// Records the layout of a settled board.
    ///
    /// # Returns
    /// `false` if the layout had already been seen.
    pub fn remember_layout(&mut self, board: &Board) -> bool {
        self.visited.insert(board.containers().to_vec())
    }

    pub fn has_seen(&self, board: &Board) -> bool {
        self.visited.contains(board.containers())
    }

    /// Clears everything; called after a match changes the board.
    pub fn forget(&mut self) {
        self.last_move = None;
        self.recent.clear();
        self.visited.clear();
    }

    pub fn recent_moves(&self) -> impl Iterator<Item = &Move> {
        self.recent.iter()
    }

    /// Returns `true` if `mv` undoes the immediately preceding move.
    pub fn is_reversal(&self, mv: &Move) -> bool {
        self.last_move.as_ref().is_some_and(|last| mv.reverses(last))
    }

    /// Returns `true` if `mv` undoes any move in the recent window.
    pub fn repeats_recent_pattern(&self, mv: &Move) -> bool {
        self.recent.iter().any(|recent| mv.reverses(recent))
    }
}

/// Picks the next move, or `None` when nothing useful remains.
///
/// Tier 1 returns any one-move match. Tier 2 scores every distinct legal move whose
/// result is a layout not yet seen since the last match, applies the oscillation penalties
/// and optional noise, and returns the best. Ties go to the earliest generated move.
pub fn choose_move(
    board: &Board,
    memory: &SearchMemory,
    strategy: &SolverStrategy,
    mut noise: Option<&mut SmallRng>,
) -> Option<ScoredMove> {
    if let Some(mv) = find_one_move_match(board) {
        return Some(ScoredMove {
            mv,
            score: ONE_MOVE_MATCH_SCORE,
            reason: "1-move match (always taken)".to_string(),
        });
    }

    let access = analyze_accessibility(board);
    let mut scored = Vec::new();
    for mv in board.distinct_moves() {
        let mut after = board.clone();
        if !after.apply_move(&mv) || memory.has_seen(&after) {
            continue;
        }

        let (mut score, mut reason) = score_move(board, &after, &mv, &access, strategy);
        if memory.is_reversal(&mv) {
            score -= REVERSAL_PENALTY;
            reason.push_str(", REVERSAL PENALTY");
        }
        if memory.repeats_recent_pattern(&mv) {
            score -= PATTERN_PENALTY;
            reason.push_str(", PATTERN PENALTY");
        }
        if let Some(rng) = noise.as_deref_mut() {
            if strategy.noise_magnitude > 0 {
                score += rng.gen_range(-strategy.noise_magnitude..=strategy.noise_magnitude);
            }
        }
        scored.push(ScoredMove { mv, score, reason });
    }

    // Stable sort keeps generation order among equal scores.
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    for candidate in scored.iter().take(LOGGED_CANDIDATES) {
        debug!("  candidate {} score {} ({})", candidate.mv, candidate.score, candidate.reason);
    }
    scored.into_iter().next()
}
