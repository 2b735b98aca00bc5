//! Drag-and-drop reorder/move computation.
//!
//! Everything here is pure: given the current columns and tasks and a
//! drag-end event, produce the new arrangement with dense 1-based `ord`
//! values. Invalid drags (missing destination, out-of-range indices,
//! unknown columns) yield [`Reorder::Unchanged`] rather than an error.

use crate::types::{Column, Task};
use std::collections::HashMap;

/// Where a draggable lives: the board itself (for columns) or a column's
/// task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Board,
    Column(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Column,
    Task,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragLocation {
    pub container: Container,
    pub index: usize,
}

impl DragLocation {
    pub fn new(container: Container, index: usize) -> Self {
        Self { container, index }
    }
}

/// A completed drag gesture. `destination` is `None` when the item was
/// dropped outside any container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragEnd {
    pub kind: ItemKind,
    pub source: DragLocation,
    pub destination: Option<DragLocation>,
}

impl DragEnd {
    /// Column drag from `from` to `to` on the board.
    pub fn column(from: usize, to: usize) -> Self {
        Self {
            kind: ItemKind::Column,
            source: DragLocation::new(Container::Board, from),
            destination: Some(DragLocation::new(Container::Board, to)),
        }
    }

    /// Task drag between (possibly identical) columns.
    pub fn task(from_column: i64, from: usize, to_column: i64, to: usize) -> Self {
        Self {
            kind: ItemKind::Task,
            source: DragLocation::new(Container::Column(from_column), from),
            destination: Some(DragLocation::new(Container::Column(to_column), to)),
        }
    }

    pub fn is_noop(&self) -> bool {
        match self.destination {
            None => true,
            Some(dest) => dest == self.source,
        }
    }
}

/// Result of applying a drag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reorder {
    Unchanged,
    /// Full column list with `ord` rewritten to 1..N.
    Columns(Vec<Column>),
    /// Full task list flattened in column-then-ord sequence.
    Tasks(Vec<Task>),
}

pub fn apply_drag(columns: &[Column], tasks: &[Task], drag: &DragEnd) -> Reorder {
    if drag.is_noop() {
        return Reorder::Unchanged;
    }
    let Some(dest) = drag.destination else {
        return Reorder::Unchanged;
    };

    let result = match (drag.kind, drag.source.container, dest.container) {
        (ItemKind::Column, Container::Board, Container::Board) => {
            move_column(columns, drag.source.index, dest.index).map(Reorder::Columns)
        }
        (ItemKind::Task, Container::Column(from_column), Container::Column(to_column)) => {
            move_task(
                columns,
                tasks,
                from_column,
                drag.source.index,
                to_column,
                dest.index,
            )
            .map(Reorder::Tasks)
        }
        _ => None,
    };

    result.unwrap_or(Reorder::Unchanged)
}

/// Move the column at `from` to `to` (array move, not swap) and rewrite
/// every `ord` as position + 1.
pub fn move_column(columns: &[Column], from: usize, to: usize) -> Option<Vec<Column>> {
    if from == to || from >= columns.len() || to >= columns.len() {
        return None;
    }

    let mut next = columns.to_vec();
    let moved = next.remove(from);
    next.insert(to, moved);
    for (position, column) in next.iter_mut().enumerate() {
        column.ord = position as i64 + 1;
    }
    Some(next)
}

/// Move the task at `from` in `from_column` to index `to` in `to_column`.
///
/// Both affected columns are re-sequenced; tasks in other columns keep
/// their current `ord`. The returned list holds every task.
pub fn move_task(
    columns: &[Column],
    tasks: &[Task],
    from_column: i64,
    from: usize,
    to_column: i64,
    to: usize,
) -> Option<Vec<Task>> {
    if from_column == to_column && from == to {
        return None;
    }
    let source_col = columns.iter().find(|c| c.id == from_column)?;
    let dest_col = columns.iter().find(|c| c.id == to_column)?;

    let mut source = column_tasks(tasks, source_col.id);
    if from >= source.len() {
        return None;
    }

    let mut lanes = HashMap::new();
    if from_column == to_column {
        if to >= source.len() {
            return None;
        }
        let moved = source.remove(from);
        source.insert(to, moved);
        resequence(&mut source);
        lanes.insert(from_column, source);
    } else {
        let mut dest = column_tasks(tasks, dest_col.id);
        if to > dest.len() {
            return None;
        }
        let mut moved = source.remove(from);
        moved.inherit_from(dest_col);
        dest.insert(to, moved);
        resequence(&mut source);
        resequence(&mut dest);
        lanes.insert(from_column, source);
        lanes.insert(to_column, dest);
    }

    Some(flatten_with(columns, tasks, lanes))
}

/// Tasks of one column sorted by `ord`, ties kept in input order.
pub fn column_tasks(tasks: &[Task], column_id: i64) -> Vec<Task> {
    let mut lane: Vec<Task> = tasks
        .iter()
        .filter(|t| t.column_id == column_id)
        .cloned()
        .collect();
    lane.sort_by_key(|t| t.ord);
    lane
}

/// Flatten tasks in column-then-ord sequence without changing any `ord`.
pub fn flatten(columns: &[Column], tasks: &[Task]) -> Vec<Task> {
    flatten_with(columns, tasks, HashMap::new())
}

fn flatten_with(
    columns: &[Column],
    tasks: &[Task],
    mut lanes: HashMap<i64, Vec<Task>>,
) -> Vec<Task> {
    let mut out = Vec::with_capacity(tasks.len());
    for column in columns {
        match lanes.remove(&column.id) {
            Some(lane) => out.extend(lane),
            None => out.extend(column_tasks(tasks, column.id)),
        }
    }
    // Tasks whose column is not on the board stay at the end, untouched.
    out.extend(
        tasks
            .iter()
            .filter(|t| !columns.iter().any(|c| c.id == t.column_id))
            .cloned(),
    );
    out
}

/// Rewrite `ord` as position + 1.
pub fn resequence(lane: &mut [Task]) {
    for (position, task) in lane.iter_mut().enumerate() {
        task.ord = position as i64 + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(id: i64, title: &str, slug: &str, ord: i64) -> Column {
        Column {
            id,
            title: title.to_string(),
            slug: slug.to_string(),
            color: format!("#00000{}", id),
            ord,
        }
    }

    fn task(id: i64, column_id: i64, ord: i64) -> Task {
        Task {
            id,
            title: format!("task {}", id),
            column_id,
            ord,
            column_slug: None,
            column_title: None,
            color: None,
        }
    }

    fn board() -> Vec<Column> {
        vec![
            col(1, "To Do", "todo", 1),
            col(2, "Doing", "doing", 2),
            col(3, "Done", "done", 3),
        ]
    }

    fn ids(tasks: &[Task], column_id: i64) -> Vec<i64> {
        column_tasks(tasks, column_id).iter().map(|t| t.id).collect()
    }

    fn ords(tasks: &[Task], column_id: i64) -> Vec<i64> {
        column_tasks(tasks, column_id).iter().map(|t| t.ord).collect()
    }

    #[test]
    fn test_column_move_shifts_neighbours_and_rewrites_ords() {
        let columns: Vec<Column> = (1..=5).map(|i| col(i, &format!("C{}", i), &format!("c{}", i), i)).collect();

        for from in 0..5 {
            for to in 0..5 {
                if from == to {
                    assert!(move_column(&columns, from, to).is_none());
                    continue;
                }
                let next = move_column(&columns, from, to).unwrap();
                assert_eq!(next[to].id, columns[from].id);

                let mut expected: Vec<i64> = columns.iter().map(|c| c.id).collect();
                let moved = expected.remove(from);
                expected.insert(to, moved);
                assert_eq!(next.iter().map(|c| c.id).collect::<Vec<_>>(), expected);

                let ords: Vec<i64> = next.iter().map(|c| c.ord).collect();
                assert_eq!(ords, (1..=5).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_scenario_todo_to_end() {
        let tasks = vec![task(10, 1, 1), task(20, 2, 1), task(30, 3, 1)];
        let result = apply_drag(&board(), &tasks, &DragEnd::column(0, 2));

        let Reorder::Columns(next) = result else {
            panic!("expected a column reorder");
        };
        let summary: Vec<(&str, i64)> = next.iter().map(|c| (c.title.as_str(), c.ord)).collect();
        assert_eq!(summary, vec![("Doing", 1), ("Done", 2), ("To Do", 3)]);
    }

    #[test]
    fn test_move_within_column() {
        let tasks = vec![task(1, 1, 1), task(2, 1, 2), task(3, 1, 3), task(4, 2, 1)];

        let next = move_task(&board(), &tasks, 1, 0, 1, 2).unwrap();
        assert_eq!(ids(&next, 1), vec![2, 3, 1]);
        assert_eq!(ords(&next, 1), vec![1, 2, 3]);
        let moved = next.iter().find(|t| t.id == 1).unwrap();
        assert_eq!(moved.ord, 3);

        // Untouched column keeps its tasks and ords
        assert_eq!(ids(&next, 2), vec![4]);
        assert_eq!(next.len(), tasks.len());
    }

    #[test]
    fn test_move_within_column_moved_ord_is_dest_index_plus_one() {
        let tasks: Vec<Task> = (1..=4).map(|i| task(i, 2, i)).collect();
        for from in 0..4 {
            for to in 0..4 {
                if from == to {
                    continue;
                }
                let moved_id = tasks[from].id;
                let next = move_task(&board(), &tasks, 2, from, 2, to).unwrap();
                let moved = next.iter().find(|t| t.id == moved_id).unwrap();
                assert_eq!(moved.ord, to as i64 + 1);
                assert_eq!(ords(&next, 2), vec![1, 2, 3, 4]);
            }
        }
    }

    #[test]
    fn test_move_across_columns() {
        let tasks = vec![
            task(1, 1, 1),
            task(2, 1, 2),
            task(3, 2, 1),
            task(4, 2, 2),
            task(5, 3, 7),
        ];

        let next = move_task(&board(), &tasks, 1, 0, 2, 1).unwrap();

        assert_eq!(ids(&next, 1), vec![2]);
        assert_eq!(ords(&next, 1), vec![1]);
        assert_eq!(ids(&next, 2), vec![3, 1, 4]);
        assert_eq!(ords(&next, 2), vec![1, 2, 3]);

        let moved = next.iter().find(|t| t.id == 1).unwrap();
        assert_eq!(moved.column_id, 2);
        assert_eq!(moved.column_slug.as_deref(), Some("doing"));
        assert_eq!(moved.color.as_deref(), Some("#000002"));

        // Column 3 was not touched: its ord is emitted as-is
        let untouched = next.iter().find(|t| t.id == 5).unwrap();
        assert_eq!(untouched.ord, 7);
    }

    #[test]
    fn test_move_into_empty_column_and_to_end() {
        let tasks = vec![task(1, 1, 1), task(2, 1, 2)];

        let next = move_task(&board(), &tasks, 1, 1, 3, 0).unwrap();
        assert_eq!(ids(&next, 3), vec![2]);
        assert_eq!(ords(&next, 3), vec![1]);

        let next = move_task(&board(), &next, 1, 0, 3, 1).unwrap();
        assert_eq!(ids(&next, 3), vec![2, 1]);
        assert!(ids(&next, 1).is_empty());
    }

    #[test]
    fn test_output_is_flattened_in_column_order() {
        let columns = vec![col(2, "Doing", "doing", 1), col(1, "To Do", "todo", 2)];
        let tasks = vec![task(1, 1, 2), task(2, 1, 1), task(3, 2, 1), task(4, 2, 2)];

        let next = move_task(&columns, &tasks, 2, 1, 2, 0).unwrap();
        let order: Vec<i64> = next.iter().map(|t| t.id).collect();
        assert_eq!(order, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_noops() {
        let columns = board();
        let tasks = vec![task(1, 1, 1), task(2, 1, 2)];

        // Same place
        assert_eq!(apply_drag(&columns, &tasks, &DragEnd::task(1, 1, 1, 1)), Reorder::Unchanged);
        assert_eq!(apply_drag(&columns, &tasks, &DragEnd::column(2, 2)), Reorder::Unchanged);

        // Dropped outside any container
        let mut drag = DragEnd::task(1, 0, 2, 0);
        drag.destination = None;
        assert_eq!(apply_drag(&columns, &tasks, &drag), Reorder::Unchanged);

        // Out of range indices
        assert_eq!(apply_drag(&columns, &tasks, &DragEnd::task(1, 5, 2, 0)), Reorder::Unchanged);
        assert_eq!(apply_drag(&columns, &tasks, &DragEnd::task(1, 0, 2, 3)), Reorder::Unchanged);
        assert_eq!(apply_drag(&columns, &tasks, &DragEnd::task(1, 0, 1, 2)), Reorder::Unchanged);
        assert_eq!(apply_drag(&columns, &tasks, &DragEnd::column(0, 3)), Reorder::Unchanged);

        // Unknown column
        assert_eq!(apply_drag(&columns, &tasks, &DragEnd::task(1, 0, 99, 0)), Reorder::Unchanged);

        // Kind and container disagree
        let mut drag = DragEnd::column(0, 1);
        drag.kind = ItemKind::Task;
        assert_eq!(apply_drag(&columns, &tasks, &drag), Reorder::Unchanged);
    }
}
