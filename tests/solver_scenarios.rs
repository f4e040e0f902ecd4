use rstest::rstest;
use sort_resort_solver::engine::{Board, Move};
use sort_resort_solver::error::FailureReason;
use sort_resort_solver::heuristics::{choose_move, SearchMemory, BALANCED};
use sort_resort_solver::level::{LevelDefinition, RandomLevelParams};
use sort_resort_solver::solver::{solve_level, SolveResult, Solver, SolverConfig, MAX_MOVES};
use sort_resort_solver::utils::level_from_rows;

fn notation(rows: &[&str]) -> LevelDefinition {
    level_from_rows(rows).unwrap()
}

fn random_level(seed: u64, locked: usize) -> LevelDefinition {
    let params = RandomLevelParams {
        locked_containers: locked,
        ..RandomLevelParams::default()
    };
    LevelDefinition::new_random_with_seed(seed, &params)
}

/// Replays a result on a fresh board, checking every move is legal when it is played.
fn replay(level: &LevelDefinition, result: &SolveResult) -> Board {
    let mut board = Board::from_level(level).unwrap();
    board.resolve_cascade();
    for mv in &result.move_sequence {
        assert!(board.legal_moves().contains(mv), "illegal move in solution: {mv}");
        assert!(board.apply_move(mv));
        board.resolve_cascade();
    }
    board
}

#[rstest]
#[case::forced(notation(&["X X .", "X . ."]))]
#[case::reveals(notation(&["A B . / C A .", "B C . / A B .", "C . . / . . ."]))]
#[case::locked(notation(&["A A . / B . .", "A B .", "L1:B C . / C . .", "C . ."]))]
#[case::random(random_level(7, 0))]
#[case::random_locked(random_level(21, 2))]
fn test_solve_is_deterministic(#[case] level: LevelDefinition) {
    let first = solve_level(&level);
    let second = solve_level(&level);
    assert_eq!(first.move_sequence, second.move_sequence);
    assert_eq!(first.total_moves, second.total_moves);
    assert_eq!(first.total_matches, second.total_matches);
    assert_eq!(first.success, second.success);
}

#[rstest]
#[case::forced(notation(&["X X .", "X . ."]))]
#[case::stuck(notation(&["A B C", "D E F"]))]
#[case::random(random_level(3, 0))]
#[case::random_locked(random_level(4, 1))]
fn test_result_is_consistent(#[case] level: LevelDefinition) {
    let result = solve_level(&level);
    assert_eq!(result.total_moves as usize, result.move_sequence.len());
    assert_eq!(result.notes.len(), result.move_sequence.len());
    assert_eq!(result.success, result.failure.is_none());

    let board = replay(&level, &result);
    assert_eq!(board.is_complete(), result.success);
    assert_eq!(board.match_count(), result.total_matches);
}

#[test]
fn test_empty_level_fails_initialization() {
    let mut solver = Solver::new(SolverConfig::default());
    let result = solver.solve(&LevelDefinition::default());
    assert!(!result.success);
    assert_eq!(result.total_moves, 0);
    assert!(result.move_sequence.is_empty());
    assert_eq!(result.failure, Some(FailureReason::InitializationFailed));
}

#[test]
fn test_pre_existing_match_resolved_before_first_move() {
    let result = solve_level(&notation(&["A A A / B B .", "B . ."]));
    assert!(result.total_matches >= 1);
    assert!(result.success);
    // B B revealed with a free cell and the third B waiting: one forced move.
    assert_eq!(result.total_moves, 1);
    assert_eq!(result.total_matches, 2);
}

#[test]
fn test_single_move_transfers_third_item() {
    let result = solve_level(&notation(&["X X .", "X . ."]));
    assert!(result.success);
    assert_eq!(result.total_moves, 1);
    assert_eq!(result.total_matches, 1);
    assert_eq!(result.move_sequence, vec![Move::new(1, 0, 0, 2, "X")]);
}

#[test]
fn test_lock_opens_after_two_matches() {
    let level = notation(&["A A . / B B .", "A B .", "L2:C . .", "C C ."]);
    let mut board = Board::from_level(&level).unwrap();
    board.resolve_cascade();
    let memory = SearchMemory::new();

    let mut matches_seen = 0;
    while matches_seen < 2 {
        assert!(board.container(2).is_locked());
        for mv in board.legal_moves() {
            assert_ne!(mv.from_container, 2);
            assert_ne!(mv.to_container, 2);
        }
        let choice = choose_move(&board, &memory, &BALANCED, None).unwrap();
        assert!(board.apply_move(&choice.mv));
        matches_seen += board.resolve_cascade();
    }

    assert_eq!(board.match_count(), 2);
    assert!(!board.container(2).is_locked());
    assert!(board.legal_moves().contains(&Move::new(2, 0, 3, 2, "C")));

    let result = solve_level(&level);
    assert!(result.success);
    assert_eq!(result.total_matches, 3);
    assert_eq!(result.move_sequence.last(), Some(&Move::new(2, 0, 3, 2, "C")));
}

#[test]
fn test_unlocked_container_is_a_move_target() {
    let level = notation(&["A A A", "B . .", "L1:B B ."]);
    let mut board = Board::from_level(&level).unwrap();
    assert!(board.legal_moves().iter().all(|m| m.to_container != 2));
    board.resolve_cascade();
    assert!(!board.container(2).is_locked());
    assert!(board.legal_moves().contains(&Move::new(1, 0, 2, 2, "B")));

    let result = solve_level(&level);
    assert!(result.success);
    assert_eq!(result.move_sequence, vec![Move::new(1, 0, 2, 2, "B")]);
}

#[rstest]
#[case::two_containers(&["X Y .", "Y X ."])]
#[case::single_slot_parking(&["X Y .", "Y X .", "S:."])]
#[case::four_slots(&["X Y . .", "Y X . ."])]
fn test_cyclic_dead_end_stops_well_under_cap(#[case] rows: &[&str]) {
    let result = solve_level(&notation(rows));
    assert!(!result.success);
    assert!(matches!(result.failure, Some(FailureReason::Stuck { .. })), "{:?}", result.failure);
    assert!(result.total_moves < MAX_MOVES);
}

#[test]
fn test_cancellation_keeps_partial_sequence() {
    let level = notation(&["A B . / C A .", "B C . / A B .", "C . . / . . ."]);
    let full = solve_level(&level);
    assert!(full.total_moves > 3);

    let result = Solver::new(SolverConfig::default())
        .with_cancel(|moves, _items, _elapsed| moves == 3)
        .solve(&level);
    assert!(!result.success);
    assert_eq!(result.total_moves, 3);
    assert_eq!(result.move_sequence, full.move_sequence[..3].to_vec());
    assert!(matches!(result.failure, Some(FailureReason::Cancelled { .. })));
}

#[test]
fn test_item_count_drops_in_whole_matches() {
    let level = random_level(9, 1);
    let result = solve_level(&level);
    let mut board = Board::from_level(&level).unwrap();
    board.resolve_cascade();
    let mut items = board.total_item_count();
    for mv in &result.move_sequence {
        board.apply_move(mv);
        let before_matches = board.match_count();
        board.resolve_cascade();
        let now = board.total_item_count();
        assert_eq!(items - now, 3 * (board.match_count() - before_matches) as usize);
        items = now;
    }
}
