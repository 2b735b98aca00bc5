//! Optimistic sync coordinator.
//!
//! A [`BoardSession`] owns the client's view of the board for as long as the
//! board is mounted. Every mutating action is applied to local state before
//! the method returns; persistence runs in a spawned task whose handle is
//! returned as a [`PendingSync`] (or `None` when nothing needs to be sent).
//!
//! Failed persistence never rolls back local state. It only replaces the
//! session's error banner; a [`BoardSession::load`] resynchronizes with the
//! store. Actions spawn onto the ambient tokio runtime.

use super::api::{BoardApi, TransportError, TransportResult};
use super::reorder::{self, DragEnd, Reorder};
use crate::types::{
    Column, ColumnUpdate, DEFAULT_COLUMN_COLOR, NewColumn, NewTask, ReorderColumnEntry,
    ReorderTaskEntry, Task, TaskUpdate, is_placeholder, slugify, title_conflicts, validate_color,
    validate_column_title,
};
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Title given to a freshly added task before the user types anything.
pub const NEW_TASK_TITLE: &str = "New Task";

/// Banner shown when the board cannot be loaded.
pub const LOAD_ERROR: &str = "Could not connect to the server.";

pub const DUPLICATE_TITLE_ERROR: &str = "Column title already exists";

/// Client-side limits applied before anything is sent.
#[derive(Debug, Clone)]
pub struct SessionLimits {
    pub max_columns: usize,
    pub default_color: String,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_columns: 6,
            default_color: DEFAULT_COLUMN_COLOR.to_string(),
        }
    }
}

/// The entity an in-progress edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    Column(i64),
    Task(i64),
}

#[derive(Debug, Clone)]
struct Edit {
    target: EditTarget,
    /// Title before the edit began, restored on cancel or blank commit.
    original: String,
}

#[derive(Debug, Default)]
struct BoardState {
    columns: Vec<Column>,
    /// Flattened in column-then-ord sequence.
    tasks: Vec<Task>,
    error: Option<String>,
    editing: Option<Edit>,
    last_placeholder: i64,
    /// Placeholders whose create call is in flight.
    saving: HashSet<i64>,
}

/// Store calls still owed once a placeholder's create settles.
#[derive(Debug)]
struct FollowUp<U, E> {
    /// The placeholder was removed locally while its create was in flight.
    delete: bool,
    update: Option<U>,
    order: Option<Vec<E>>,
}

impl<U, E> Default for FollowUp<U, E> {
    fn default() -> Self {
        Self {
            delete: false,
            update: None,
            order: None,
        }
    }
}

impl BoardState {
    fn next_placeholder(&mut self) -> i64 {
        self.last_placeholder -= 1;
        self.last_placeholder
    }

    fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(%message, "Board error");
        self.error = Some(message);
    }

    fn column(&self, id: i64) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    fn column_mut(&mut self, id: i64) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.id == id)
    }

    fn task(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn task_mut(&mut self, id: i64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Start tracking an edit unless one is already open on `target`.
    fn begin_edit(&mut self, target: EditTarget, original: String) {
        if self.editing.as_ref().map(|e| e.target) != Some(target) {
            self.editing = Some(Edit { target, original });
        }
    }

    fn take_edit(&mut self, target: EditTarget) -> Option<Edit> {
        if self.editing.as_ref().map(|e| e.target) == Some(target) {
            self.editing.take()
        } else {
            None
        }
    }

    /// Remove a task locally and close the gap in its column.
    fn remove_task(&mut self, id: i64) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        let removed = self.tasks.remove(index);
        self.resequence_column(removed.column_id);
        if self.editing.as_ref().map(|e| e.target) == Some(EditTarget::Task(id)) {
            self.editing = None;
        }
        Some(removed)
    }

    fn resequence_column(&mut self, column_id: i64) {
        let mut lane = reorder::column_tasks(&self.tasks, column_id);
        reorder::resequence(&mut lane);
        for updated in lane {
            if let Some(task) = self.task_mut(updated.id) {
                task.ord = updated.ord;
            }
        }
    }

    /// Title last committed on `target`, ignoring an edit still in progress.
    fn committed_title(&self, target: EditTarget, current: &str) -> String {
        match self.editing.as_ref() {
            Some(edit) if edit.target == target => edit.original.clone(),
            _ => current.to_string(),
        }
    }

    fn retarget_edit(&mut self, from: EditTarget, to: EditTarget) {
        if let Some(edit) = self.editing.as_mut() {
            if edit.target == from {
                edit.target = to;
            }
        }
    }

    /// Swap a placeholder task for its stored row.
    ///
    /// The store appends new tasks, so the local column, position, and title
    /// win; whatever differs from the stored row is returned for resending.
    fn replace_placeholder_task(
        &mut self,
        placeholder: i64,
        saved: Task,
    ) -> FollowUp<TaskUpdate, ReorderTaskEntry> {
        let tracked = self.saving.remove(&placeholder);
        let Some(local) = self.task(placeholder).cloned() else {
            debug!(placeholder, saved_id = saved.id, "Placeholder task gone before save completed");
            return FollowUp {
                delete: tracked,
                ..FollowUp::default()
            };
        };

        let title = self.committed_title(EditTarget::Task(placeholder), &local.title);
        let mut follow_up = FollowUp::default();
        if title != saved.title {
            follow_up.update = Some(TaskUpdate {
                title: Some(title),
                column_id: None,
            });
        }
        let moved = local.column_id != saved.column_id || local.ord != saved.ord;

        let column = self.column(local.column_id).cloned();
        if let Some(task) = self.task_mut(placeholder) {
            task.id = saved.id;
            if let Some(column) = &column {
                task.inherit_from(column);
            }
        }
        self.retarget_edit(EditTarget::Task(placeholder), EditTarget::Task(saved.id));

        if moved {
            follow_up.order = Some(
                reorder::column_tasks(&self.tasks, local.column_id)
                    .iter()
                    .filter(|t| !t.is_unsaved())
                    .map(ReorderTaskEntry::from)
                    .collect(),
            );
        }
        follow_up
    }

    /// Swap a placeholder column for its stored row, keeping the local
    /// title, color, and position.
    fn replace_placeholder_column(
        &mut self,
        placeholder: i64,
        saved: Column,
    ) -> FollowUp<ColumnUpdate, ReorderColumnEntry> {
        let tracked = self.saving.remove(&placeholder);
        let Some(local) = self.column(placeholder).cloned() else {
            debug!(placeholder, saved_id = saved.id, "Placeholder column gone before save completed");
            return FollowUp {
                delete: tracked,
                ..FollowUp::default()
            };
        };

        let title = self.committed_title(EditTarget::Column(placeholder), &local.title);
        let mut follow_up = FollowUp::default();
        if title != saved.title || local.color != saved.color {
            follow_up.update = Some(ColumnUpdate {
                title: (title != saved.title).then_some(title),
                color: (local.color != saved.color).then(|| local.color.clone()),
            });
        }

        if let Some(column) = self.column_mut(placeholder) {
            column.id = saved.id;
            column.slug = saved.slug;
        }
        self.retarget_edit(EditTarget::Column(placeholder), EditTarget::Column(saved.id));

        if local.ord != saved.ord {
            follow_up.order = Some(
                self.columns
                    .iter()
                    .filter(|c| !c.is_unsaved())
                    .map(ReorderColumnEntry::from)
                    .collect(),
            );
        }
        follow_up
    }

    /// Push a column's display fields down to its tasks.
    fn refresh_column_tasks(&mut self, column_id: i64) {
        let Some(column) = self.column(column_id).cloned() else {
            return;
        };
        for task in self.tasks.iter_mut().filter(|t| t.column_id == column_id) {
            task.inherit_from(&column);
        }
    }
}

fn lock_state(state: &Mutex<BoardState>) -> MutexGuard<'_, BoardState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to an in-flight persistence call.
#[derive(Debug)]
pub struct PendingSync {
    handle: JoinHandle<()>,
}

impl PendingSync {
    /// Wait for the call to finish. Failures have already been recorded on
    /// the session's error banner.
    pub async fn settled(self) {
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Persistence task did not complete");
        }
    }
}

/// Client-side board state plus the persistence policy around it.
pub struct BoardSession<A: BoardApi + 'static> {
    api: Arc<A>,
    state: Arc<Mutex<BoardState>>,
    limits: SessionLimits,
}

impl<A: BoardApi + 'static> BoardSession<A> {
    pub fn new(api: A) -> Self {
        Self::with_limits(api, SessionLimits::default())
    }

    pub fn with_limits(api: A, limits: SessionLimits) -> Self {
        Self {
            api: Arc::new(api),
            state: Arc::new(Mutex::new(BoardState::default())),
            limits,
        }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        lock_state(&self.state)
    }

    /// Columns in board order.
    pub fn columns(&self) -> Vec<Column> {
        self.lock().columns.clone()
    }

    /// All tasks, flattened in column-then-ord sequence.
    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    /// Tasks of one column in display order.
    pub fn column_tasks(&self, column_id: i64) -> Vec<Task> {
        reorder::column_tasks(&self.lock().tasks, column_id)
    }

    /// Current error banner, if any.
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn dismiss_error(&self) {
        self.lock().error = None;
    }

    pub fn editing(&self) -> Option<EditTarget> {
        self.lock().editing.as_ref().map(|e| e.target)
    }

    /// Whether another column can be added.
    pub fn can_add_column(&self) -> bool {
        self.lock().columns.len() < self.limits.max_columns
    }

    /// Spawn a persistence call; a failure replaces the error banner.
    fn persist<F, Fut>(&self, action: &'static str, call: F) -> PendingSync
    where
        F: FnOnce(Arc<A>, Arc<Mutex<BoardState>>) -> Fut,
        Fut: Future<Output = TransportResult<()>> + Send + 'static,
    {
        let fut = call(Arc::clone(&self.api), Arc::clone(&self.state));
        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            match fut.await {
                Ok(()) => debug!(action, "Persisted"),
                Err(err) => {
                    warn!(action, error = %err, "Persistence failed");
                    lock_state(&state).fail(format!("Failed to {}: {}", action, err));
                }
            }
        });
        PendingSync { handle }
    }

    /// Replace local state with the store's. Discards any divergent
    /// optimistic state and any open edit.
    pub async fn load(&self) -> TransportResult<()> {
        let (columns, tasks) = tokio::join!(self.api.list_columns(), self.api.list_tasks());

        let mut state = self.lock();
        match (columns, tasks) {
            (Ok(mut columns), Ok(tasks)) => {
                columns.sort_by_key(|c| c.ord);
                let tasks = reorder::flatten(&columns, &tasks);
                info!(columns = columns.len(), tasks = tasks.len(), "Loaded board");
                state.columns = columns;
                state.tasks = tasks;
                state.editing = None;
                state.error = None;
                state.saving.clear();
                Ok(())
            }
            (Err(err), _) | (_, Err(err)) => {
                warn!(error = %err, "Failed to load board");
                state.fail(LOAD_ERROR);
                Err(err)
            }
        }
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Add a placeholder task at the bottom of a saved column and open it for
    /// editing. Returns the placeholder id.
    pub fn add_task(&self, column_id: i64) -> Option<i64> {
        let mut state = self.lock();
        let column = state.column(column_id)?.clone();
        if column.is_unsaved() {
            debug!(column_id, "Cannot add a task to an unsaved column");
            return None;
        }

        let id = state.next_placeholder();
        let ord = reorder::column_tasks(&state.tasks, column_id).len() as i64 + 1;
        let mut task = Task {
            id,
            title: NEW_TASK_TITLE.to_string(),
            column_id,
            ord,
            column_slug: None,
            column_title: None,
            color: None,
        };
        task.inherit_from(&column);

        let mut tasks = std::mem::take(&mut state.tasks);
        tasks.push(task);
        state.tasks = reorder::flatten(&state.columns, &tasks);
        state.editing = Some(Edit {
            target: EditTarget::Task(id),
            original: String::new(),
        });
        Some(id)
    }

    /// Change a task's title locally (a keystroke). Nothing is persisted.
    pub fn edit_task_title(&self, id: i64, title: impl Into<String>) -> bool {
        let mut state = self.lock();
        let Some(original) = state.task(id).map(|t| t.title.clone()) else {
            return false;
        };
        state.begin_edit(EditTarget::Task(id), original);
        if let Some(task) = state.task_mut(id) {
            task.title = title.into();
        }
        true
    }

    /// Commit an open task edit (blur or Enter).
    ///
    /// An unsaved task with a blank title is discarded; otherwise it is
    /// created and the placeholder swapped for the stored task on success.
    /// A saved task with a blank title reverts; an unchanged title sends
    /// nothing.
    pub fn commit_task(&self, id: i64) -> Option<PendingSync> {
        let mut state = self.lock();
        let edit = state.take_edit(EditTarget::Task(id))?;
        let task = state.task(id)?.clone();
        let title = task.title.trim().to_string();

        if task.is_unsaved() {
            if title.is_empty() {
                state.remove_task(id);
                debug!(task_id = id, "Discarded empty new task");
                return None;
            }
            if let Some(t) = state.task_mut(id) {
                t.title = title.clone();
            }
            // Already being created; the new title goes out once it settles.
            if !state.saving.insert(id) {
                return None;
            }
            drop(state);

            let body = NewTask {
                title: Some(title),
                column_id: Some(task.column_id),
            };
            return Some(self.persist("save task", move |api, state| async move {
                let saved = match api.create_task(&body).await {
                    Ok(saved) => saved,
                    Err(err) => {
                        lock_state(&state).saving.remove(&id);
                        return Err(err);
                    }
                };
                let saved_id = saved.id;
                info!(placeholder = id, task_id = saved_id, "Saved new task");

                let follow_up = {
                    let mut state = lock_state(&state);
                    state.replace_placeholder_task(id, saved)
                };
                if follow_up.delete {
                    return api.delete_task(saved_id).await;
                }
                if let Some(update) = follow_up.update {
                    api.update_task(saved_id, &update).await?;
                }
                if let Some(order) = follow_up.order {
                    debug!(task_id = saved_id, "Resending local position of saved task");
                    api.reorder_tasks(&order).await?;
                }
                Ok::<(), TransportError>(())
            }));
        }

        if title.is_empty() || title == edit.original {
            let restored = if title.is_empty() { edit.original } else { title };
            if let Some(t) = state.task_mut(id) {
                t.title = restored;
            }
            return None;
        }

        if let Some(t) = state.task_mut(id) {
            t.title = title.clone();
        }
        drop(state);

        let body = TaskUpdate {
            title: Some(title),
            column_id: None,
        };
        Some(self.persist("update task", move |api, _| async move {
            api.update_task(id, &body).await.map(drop)
        }))
    }

    /// Abandon the open edit (Escape). A new task not yet sent is discarded;
    /// anything else gets its previous title back.
    pub fn cancel_edit(&self) {
        let mut state = self.lock();
        let Some(edit) = state.editing.take() else {
            return;
        };
        match edit.target {
            EditTarget::Task(id) if is_placeholder(id) && !state.saving.contains(&id) => {
                state.remove_task(id);
            }
            EditTarget::Task(id) => {
                if let Some(task) = state.task_mut(id) {
                    task.title = edit.original;
                }
            }
            EditTarget::Column(id) => {
                if let Some(column) = state.column_mut(id) {
                    column.title = edit.original;
                }
            }
        }
    }

    /// Remove a task locally, then delete it in the store. Unsaved tasks
    /// never reach the network.
    pub fn delete_task(&self, id: i64) -> Option<PendingSync> {
        let removed = self.lock().remove_task(id)?;
        if removed.is_unsaved() {
            return None;
        }
        Some(self.persist("delete task", move |api, _| async move {
            api.delete_task(id).await
        }))
    }

    // =========================================================================
    // Columns
    // =========================================================================

    /// Add a column at the right edge of the board.
    ///
    /// Blank titles are ignored. The column limit and duplicate titles are
    /// refused with an error banner and no network call.
    pub fn add_column(&self, title: &str, color: Option<&str>) -> Option<PendingSync> {
        if title.trim().is_empty() {
            return None;
        }

        let mut state = self.lock();
        if state.columns.len() >= self.limits.max_columns {
            state.fail(format!(
                "A board can hold at most {} columns",
                self.limits.max_columns
            ));
            return None;
        }
        let title = match validate_column_title(Some(title)) {
            Ok(title) => title,
            Err(err) => {
                state.fail(err.message);
                return None;
            }
        };
        if title_conflicts(&state.columns, &title, None) {
            state.fail(DUPLICATE_TITLE_ERROR);
            return None;
        }
        let color = color.unwrap_or(&self.limits.default_color).to_string();
        if let Err(err) = validate_color(&color) {
            state.fail(err.message);
            return None;
        }

        let id = state.next_placeholder();
        let ord = state.columns.len() as i64 + 1;
        state.columns.push(Column {
            id,
            title: title.clone(),
            slug: slugify(&title),
            color: color.clone(),
            ord,
        });
        state.saving.insert(id);
        drop(state);

        let body = NewColumn {
            title: Some(title),
            color: Some(color),
        };
        Some(self.persist("save column", move |api, state| async move {
            let saved = match api.create_column(&body).await {
                Ok(saved) => saved,
                Err(err) => {
                    lock_state(&state).saving.remove(&id);
                    return Err(err);
                }
            };
            let saved_id = saved.id;
            info!(placeholder = id, column_id = saved_id, "Saved new column");

            let follow_up = {
                let mut state = lock_state(&state);
                state.replace_placeholder_column(id, saved)
            };
            if follow_up.delete {
                return api.delete_column(saved_id).await;
            }
            if let Some(update) = follow_up.update {
                api.update_column(saved_id, &update).await?;
            }
            if let Some(order) = follow_up.order {
                debug!(column_id = saved_id, "Resending local position of saved column");
                api.reorder_columns(&order).await?;
            }
            Ok::<(), TransportError>(())
        }))
    }

    /// Change a column's title locally (a keystroke). Nothing is persisted.
    pub fn edit_column_title(&self, id: i64, title: impl Into<String>) -> bool {
        let mut state = self.lock();
        let Some(original) = state.column(id).map(|c| c.title.clone()) else {
            return false;
        };
        state.begin_edit(EditTarget::Column(id), original);
        if let Some(column) = state.column_mut(id) {
            column.title = title.into();
        }
        true
    }

    /// Commit an open column title edit. Blank or duplicate titles revert.
    pub fn commit_column(&self, id: i64) -> Option<PendingSync> {
        let mut state = self.lock();
        let edit = state.take_edit(EditTarget::Column(id))?;
        let column = state.column(id)?.clone();
        let title = column.title.trim().to_string();

        if title.is_empty() || title == edit.original {
            let restored = if title.is_empty() { edit.original } else { title };
            if let Some(c) = state.column_mut(id) {
                c.title = restored;
            }
            return None;
        }
        let rejection = match validate_column_title(Some(title.as_str())) {
            Err(err) => Some(err.message),
            Ok(_) if title_conflicts(&state.columns, &title, Some(id)) => {
                Some(DUPLICATE_TITLE_ERROR.to_string())
            }
            Ok(_) => None,
        };
        if let Some(message) = rejection {
            if let Some(c) = state.column_mut(id) {
                c.title = edit.original;
            }
            state.fail(message);
            return None;
        }

        if let Some(c) = state.column_mut(id) {
            c.title = title.clone();
        }
        state.refresh_column_tasks(id);
        if column.is_unsaved() {
            return None;
        }
        drop(state);

        let body = ColumnUpdate {
            title: Some(title),
            color: None,
        };
        Some(self.persist("update column", move |api, _| async move {
            api.update_column(id, &body).await.map(drop)
        }))
    }

    /// Recolor a column and its tasks, persisting immediately.
    pub fn set_column_color(&self, id: i64, color: &str) -> Option<PendingSync> {
        let mut state = self.lock();
        if let Err(err) = validate_color(color) {
            state.fail(err.message);
            return None;
        }
        let column = state.column_mut(id)?;
        if column.color == color {
            return None;
        }
        column.color = color.to_string();
        let unsaved = column.is_unsaved();
        state.refresh_column_tasks(id);
        if unsaved {
            return None;
        }
        drop(state);

        let body = ColumnUpdate {
            title: None,
            color: Some(color.to_string()),
        };
        Some(self.persist("update column", move |api, _| async move {
            api.update_column(id, &body).await.map(drop)
        }))
    }

    /// Remove a column and its tasks locally, then delete it in the store.
    /// Default columns are refused without any call.
    pub fn delete_column(&self, id: i64) -> Option<PendingSync> {
        let mut state = self.lock();
        let column = state.column(id)?.clone();
        if column.is_protected() {
            debug!(column_id = id, slug = %column.slug, "Refusing to delete default column");
            return None;
        }

        state.columns.retain(|c| c.id != id);
        for (position, c) in state.columns.iter_mut().enumerate() {
            c.ord = position as i64 + 1;
        }
        state.tasks.retain(|t| t.column_id != id);
        let editing_gone = match state.editing.as_ref().map(|e| e.target) {
            Some(EditTarget::Column(c)) => c == id,
            Some(EditTarget::Task(t)) => state.task(t).is_none(),
            None => false,
        };
        if editing_gone {
            state.editing = None;
        }
        drop(state);

        if column.is_unsaved() {
            return None;
        }
        Some(self.persist("delete column", move |api, _| async move {
            api.delete_column(id).await
        }))
    }

    // =========================================================================
    // Drag and drop
    // =========================================================================

    /// Apply a finished drag locally and send one bulk reorder call for it.
    ///
    /// No-op drags send nothing. Unsaved entities are left out of the
    /// payload since the store cannot resolve their ids.
    pub fn on_drag_end(&self, drag: &DragEnd) -> Option<PendingSync> {
        let mut state = self.lock();
        let result = reorder::apply_drag(&state.columns, &state.tasks, drag);

        match result {
            Reorder::Unchanged => {
                debug!(?drag, "Drag produced no change");
                None
            }
            Reorder::Columns(columns) => {
                let tasks = reorder::flatten(&columns, &state.tasks);
                let order: Vec<ReorderColumnEntry> = columns
                    .iter()
                    .filter(|c| !c.is_unsaved())
                    .map(ReorderColumnEntry::from)
                    .collect();
                state.columns = columns;
                state.tasks = tasks;
                drop(state);

                if order.is_empty() {
                    return None;
                }
                Some(self.persist("reorder columns", move |api, _| async move {
                    api.reorder_columns(&order).await.map(drop)
                }))
            }
            Reorder::Tasks(tasks) => {
                let order: Vec<ReorderTaskEntry> = tasks
                    .iter()
                    .filter(|t| !t.is_unsaved() && !is_placeholder(t.column_id))
                    .map(ReorderTaskEntry::from)
                    .collect();
                state.tasks = tasks;
                drop(state);

                if order.is_empty() {
                    return None;
                }
                Some(self.persist("move task", move |api, _| async move {
                    api.reorder_tasks(&order).await.map(drop)
                }))
            }
        }
    }
}
