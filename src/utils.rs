use crate::engine::{Board, ContainerKind};
use crate::error::LevelError;
use crate::level::{ContainerDef, ItemPlacement, LevelDefinition};

/// Parses a compact text notation into a `LevelDefinition`.
///
/// Each string describes one container. Rows are separated by `/`, front row first, and
/// cells within a row by whitespace. `.` marks an empty cell; any other token is an item
/// type. The slot count is the width of the widest row and the row depth is the number of
/// rows.
///
/// A container may carry one prefix before a colon:
/// - `L<n>:` locked until `n` board-wide matches have occurred,
/// - `S:` a single-slot container,
/// - `M:` a moving container (only relevant to the complexity report).
///
/// Containers get the ids `c0`, `c1`, ... in order.
///
/// # Errors
/// Returns `LevelError::Notation` for an unknown prefix, a bad unlock count, an empty
/// container, a single-slot container wider than one cell, and `LevelError::Empty` for
/// an empty slice.
///
/// # Examples
/// ```
/// use sort_resort_solver::utils::level_from_rows;
///
/// let level = level_from_rows(&["A A . / B C .", "L2:A . ."]).unwrap();
/// assert_eq!(level.containers.len(), 2);
/// assert_eq!(level.containers[0].max_rows_per_slot, 2);
/// assert!(level.containers[1].is_locked);
/// assert_eq!(level.item_count(), 5);
///
/// assert!(level_from_rows(&["Q9:A"]).is_err());
/// ```
pub fn level_from_rows(containers: &[&str]) -> Result<LevelDefinition, LevelError> {
    if containers.is_empty() {
        return Err(LevelError::Empty);
    }

    let mut level = LevelDefinition {
        name: "notation".to_string(),
        ..LevelDefinition::default()
    };
    for (index, text) in containers.iter().enumerate() {
        level.containers.push(parse_container(index, text)?);
    }
    Ok(level)
}

/// Parses the notation of [`level_from_rows`] straight into an unresolved `Board`.
pub fn board_from_rows(containers: &[&str]) -> Result<Board, LevelError> {
    Board::from_level(&level_from_rows(containers)?)
}

fn parse_container(index: usize, text: &str) -> Result<ContainerDef, LevelError> {
    let notation_error = |message: String| LevelError::Notation {
        container: index,
        message,
    };

    let mut def = ContainerDef {
        id: format!("c{index}"),
        ..ContainerDef::default()
    };

    let body = match text.split_once(':') {
        Some((prefix, body)) => {
            match prefix.trim() {
                "S" => def.container_type = ContainerKind::SingleSlot,
                "M" => def.is_moving = true,
                p if p.starts_with('L') => {
                    def.is_locked = true;
                    def.unlock_matches_required = p[1..]
                        .parse()
                        .map_err(|_| notation_error(format!("bad unlock count in '{p}'")))?;
                }
                p => return Err(notation_error(format!("unknown prefix '{p}'"))),
            }
            body
        }
        None => text,
    };

    let rows: Vec<Vec<&str>> = body
        .split('/')
        .map(|row| row.split_whitespace().collect())
        .collect();
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return Err(notation_error("container has no cells".to_string()));
    }
    if def.container_type == ContainerKind::SingleSlot && width > 1 {
        return Err(notation_error(format!(
            "single-slot container has {width} cells per row"
        )));
    }

    def.slot_count = width as i32;
    def.max_rows_per_slot = rows.len() as i32;
    for (row, cells) in rows.iter().enumerate() {
        for (slot, cell) in cells.iter().enumerate() {
            if *cell != "." {
                def.initial_items.push(ItemPlacement {
                    id: cell.to_string(),
                    slot: slot as i32,
                    row: row as i32,
                });
            }
        }
    }
    Ok(def)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rows_and_slots() {
        let level = level_from_rows(&["A . B / . C . / D . ."]).unwrap();
        let def = &level.containers[0];
        assert_eq!(def.slot_count, 3);
        assert_eq!(def.max_rows_per_slot, 3);
        let cells: Vec<(&str, i32, i32)> = def
            .initial_items
            .iter()
            .map(|i| (i.id.as_str(), i.slot, i.row))
            .collect();
        assert_eq!(cells, vec![("A", 0, 0), ("B", 2, 0), ("C", 1, 1), ("D", 0, 2)]);
    }

    #[test]
    fn test_prefixes() {
        let level = level_from_rows(&["L3:A . .", "S:B", "M:. . ."]).unwrap();
        assert!(level.containers[0].is_locked);
        assert_eq!(level.containers[0].unlock_matches_required, 3);
        assert_eq!(level.containers[1].container_type, ContainerKind::SingleSlot);
        assert!(level.containers[2].is_moving);
    }

    #[test]
    fn test_bad_notation() {
        assert!(matches!(
            level_from_rows(&["A . .", "Lx:A . ."]),
            Err(LevelError::Notation { container: 1, .. })
        ));
        assert!(matches!(
            level_from_rows(&["S:A B"]),
            Err(LevelError::Notation { container: 0, .. })
        ));
        assert!(matches!(
            level_from_rows(&["   "]),
            Err(LevelError::Notation { .. })
        ));
        assert!(matches!(level_from_rows(&[]), Err(LevelError::Empty)));
    }

    #[test]
    fn test_board_from_rows() {
        let board = board_from_rows(&["A A . / B . .", "S:A"]).unwrap();
        assert_eq!(board.containers().len(), 2);
        assert_eq!(board.container(0).front_count_of("A"), 2);
        assert_eq!(board.container(0).buried_item_count(), 1);
        assert_eq!(board.container(1).slot_count(), 1);
        assert_eq!(board.total_item_count(), 4);
    }
}
