use crate::config::project_dirs;
use crate::interaction::{EntitySource, SyncError};
use crate::model::{Event, Identified, Note, Task, Workspace, WorkspaceError};
use anyhow::{Context, Result};
use parking_lot::{RwLock, RwLockReadGuard};
use serde::Serialize;
use std::env;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

const WORKSPACE_DIR: &str = ".daybook";
const WORKSPACE_FILE: &str = "workspace.yml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceScope {
    Project,
    Global,
}

#[derive(Debug, Clone)]
pub struct WorkspaceLocation {
    pub path: PathBuf,
    pub scope: WorkspaceScope,
}

impl WorkspaceScope {
    pub fn label(&self) -> &'static str {
        match self {
            WorkspaceScope::Project => "project",
            WorkspaceScope::Global => "global",
        }
    }
}

pub fn init_project_workspace(name: Option<String>) -> Result<WorkspaceLocation> {
    let cwd = env::current_dir()?;
    init_workspace_in(&cwd, name)
}

pub fn init_workspace_in(root: &Path, name: Option<String>) -> Result<WorkspaceLocation> {
    let dir = root.join(WORKSPACE_DIR);
    fs::create_dir_all(&dir).context("failed to create .daybook directory")?;
    let location = WorkspaceLocation {
        path: dir.join(WORKSPACE_FILE),
        scope: WorkspaceScope::Project,
    };
    if !location.path.exists() {
        let ws_name = name.unwrap_or_else(|| {
            root.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("project")
                .to_string()
        });
        save_workspace(&location, &Workspace::default_named(ws_name))?;
    }
    Ok(location)
}

pub fn locate_workspace(start: &Path) -> Result<WorkspaceLocation> {
    if let Some(project_path) = find_project_workspace(start) {
        return Ok(WorkspaceLocation {
            path: project_path,
            scope: WorkspaceScope::Project,
        });
    }
    Ok(WorkspaceLocation {
        path: project_dirs()?.data_dir().join(WORKSPACE_FILE),
        scope: WorkspaceScope::Global,
    })
}

pub fn load_workspace(location: &WorkspaceLocation) -> Result<Workspace> {
    if location.path.exists() {
        let data = fs::read_to_string(&location.path)
            .with_context(|| format!("reading {:?}", location.path))?;
        let workspace: Workspace =
            serde_yaml::from_str(&data).context("parsing workspace file")?;
        Ok(workspace)
    } else {
        let fallback_name = match location.scope {
            WorkspaceScope::Project => location
                .path
                .parent()
                .and_then(|p| p.parent())
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or("project")
                .to_string(),
            WorkspaceScope::Global => "default".to_string(),
        };
        let workspace = Workspace::default_named(fallback_name);
        save_workspace(location, &workspace)?;
        Ok(workspace)
    }
}

pub fn save_workspace(location: &WorkspaceLocation, workspace: &Workspace) -> Result<()> {
    if let Some(parent) = location.path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(workspace).context("serializing workspace")?;
    fs::write(&location.path, serialized)
        .with_context(|| format!("writing {:?}", location.path))?;
    Ok(())
}

fn find_project_workspace(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(WORKSPACE_DIR).join(WORKSPACE_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

/// One page of a listing, shaped like the paginated responses of the CRUD
/// API the workspace file stands in for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_pages: usize,
    pub total_elements: usize,
    pub number: usize,
    pub size: usize,
    pub first: bool,
    pub last: bool,
    pub number_of_elements: usize,
    pub empty: bool,
}

impl<T: Clone> Page<T> {
    /// `number` is zero-based. A `size` of zero is treated as one.
    pub fn of(items: &[T], number: usize, size: usize) -> Self {
        let size = size.max(1);
        let total_elements = items.len();
        let total_pages = total_elements.div_ceil(size);
        let content = items
            .iter()
            .skip(number.saturating_mul(size))
            .take(size)
            .cloned()
            .collect::<Vec<_>>();
        Page {
            number_of_elements: content.len(),
            empty: content.is_empty(),
            content,
            total_pages,
            total_elements,
            number,
            size,
            first: number == 0,
            last: number + 1 >= total_pages,
        }
    }
}

/// The authoritative, read-shared workspace collection.
///
/// Writes go to the file through [`WorkspaceSource::mutate`] and only become
/// visible after an explicit [`WorkspaceSource::reload`]. Reloads are numbered
/// when issued; one that settles after a newer reload has landed is dropped.
#[derive(Debug, Clone)]
pub struct WorkspaceSource {
    location: WorkspaceLocation,
    current: Arc<RwLock<Workspace>>,
    issued: Arc<AtomicU64>,
    applied: Arc<AtomicU64>,
}

impl WorkspaceSource {
    pub fn open(location: WorkspaceLocation) -> Result<Self> {
        let workspace = load_workspace(&location)?;
        Ok(WorkspaceSource {
            location,
            current: Arc::new(RwLock::new(workspace)),
            issued: Arc::new(AtomicU64::new(0)),
            applied: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn location(&self) -> &WorkspaceLocation {
        &self.location
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Workspace> {
        self.current.read()
    }

    /// The generation is taken here, before the returned future first runs.
    pub fn reload(&self) -> impl Future<Output = Result<(), SyncError>> + Send + 'static {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let path = self.location.path.clone();
        let current = Arc::clone(&self.current);
        let applied = Arc::clone(&self.applied);
        async move {
            let data = tokio::fs::read_to_string(&path)
                .await
                .map_err(|err| SyncError::ReloadFailed(format!("reading {:?}: {err}", path)))?;
            let workspace: Workspace = serde_yaml::from_str(&data).map_err(|err| {
                SyncError::ReloadFailed(format!("parsing workspace file: {err}"))
            })?;
            // the write lock serialises the generation check with the swap
            let mut guard = current.write();
            if applied.load(Ordering::SeqCst) > generation {
                debug!(generation, "superseded workspace reload dropped");
                return Ok(());
            }
            applied.store(generation, Ordering::SeqCst);
            debug!(
                generation,
                events = workspace.events.len(),
                notes = workspace.notes.len(),
                tasks = workspace.tasks.len(),
                "workspace reloaded"
            );
            *guard = workspace;
            Ok(())
        }
    }

    /// Store-side write: load the file, apply `f`, save. The in-memory
    /// collection is left alone until the caller reloads.
    pub fn mutate<T, F>(&self, action: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Workspace) -> Result<T, WorkspaceError>,
    {
        let mut workspace = load_workspace(&self.location)?;
        let value = f(&mut workspace).with_context(|| action.to_string())?;
        save_workspace(&self.location, &workspace)?;
        info!(action, path = %self.location.path.display(), "workspace written");
        Ok(value)
    }

    pub fn events(&self) -> Collection<Event> {
        Collection::new(self.clone(), |ws| &ws.events)
    }

    pub fn notes(&self) -> Collection<Note> {
        Collection::new(self.clone(), |ws| &ws.notes)
    }

    pub fn tasks(&self) -> Collection<Task> {
        Collection::new(self.clone(), |ws| &ws.tasks)
    }
}

/// A single entity list inside the workspace, reloadable as a unit.
#[derive(Clone)]
pub struct Collection<E> {
    source: WorkspaceSource,
    select: fn(&Workspace) -> &Vec<E>,
}

impl<E> Collection<E> {
    fn new(source: WorkspaceSource, select: fn(&Workspace) -> &Vec<E>) -> Self {
        Collection { source, select }
    }
}

impl<E: Identified + Clone + Send + Sync> EntitySource for Collection<E> {
    type Entity = E;

    fn reload(&self) -> impl Future<Output = Result<(), SyncError>> + Send {
        self.source.reload()
    }

    fn entities(&self) -> Vec<E> {
        (self.select)(&self.source.read()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Calendar;

    #[test]
    fn init_creates_named_workspace_once() {
        let dir = tempfile::tempdir().unwrap();
        let location = init_workspace_in(dir.path(), Some("plans".into())).unwrap();
        assert_eq!(location.scope, WorkspaceScope::Project);
        let ws = load_workspace(&location).unwrap();
        assert_eq!(ws.name, "plans");

        init_workspace_in(dir.path(), Some("other".into())).unwrap();
        assert_eq!(load_workspace(&location).unwrap().name, "plans");
    }

    #[test]
    fn locate_walks_up_to_project_workspace() {
        let dir = tempfile::tempdir().unwrap();
        init_workspace_in(dir.path(), None).unwrap();
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        let location = locate_workspace(&nested).unwrap();
        assert_eq!(location.scope, WorkspaceScope::Project);
        assert!(location.path.starts_with(dir.path()));
    }

    #[test]
    fn page_reports_bounds() {
        let items = (0..7).collect::<Vec<_>>();
        let page = Page::of(&items, 1, 3);
        assert_eq!(page.content, vec![3, 4, 5]);
        assert_eq!(page.total_pages, 3);
        assert!(!page.first);
        assert!(!page.last);

        let tail = Page::of(&items, 2, 3);
        assert_eq!(tail.content, vec![6]);
        assert!(tail.last);
        assert_eq!(tail.number_of_elements, 1);

        let beyond = Page::of(&items, 9, 3);
        assert!(beyond.empty);
        assert!(beyond.last);
    }

    #[test]
    fn page_of_nothing_is_single_empty_page() {
        let page = Page::<u8>::of(&[], 0, 10);
        assert!(page.empty);
        assert!(page.first);
        assert!(page.last);
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn mutation_is_invisible_until_reload() {
        let dir = tempfile::tempdir().unwrap();
        let location = init_workspace_in(dir.path(), None).unwrap();
        let source = WorkspaceSource::open(location).unwrap();

        source
            .mutate("add calendar", |ws| {
                ws.add_calendar(Calendar {
                    id: "work".into(),
                    name: "Work".into(),
                });
                Ok(())
            })
            .unwrap();
        assert_eq!(source.read().calendars.len(), 1);

        source.reload().await.unwrap();
        assert_eq!(source.read().calendars.len(), 2);
    }

    #[test]
    fn failed_mutation_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let location = init_workspace_in(dir.path(), None).unwrap();
        let source = WorkspaceSource::open(location.clone()).unwrap();
        let before = fs::read_to_string(&location.path).unwrap();

        let result = source.mutate("delete event", |ws| ws.remove_event("nope").map(|_| ()));
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&location.path).unwrap(), before);
    }

    #[tokio::test]
    async fn older_reload_settling_last_does_not_overwrite_newer() {
        let dir = tempfile::tempdir().unwrap();
        let location = init_workspace_in(dir.path(), Some("first".into())).unwrap();
        let source = WorkspaceSource::open(location.clone()).unwrap();

        let older = source.reload();
        let newer = source.reload();
        save_workspace(&location, &Workspace::default_named("newer")).unwrap();
        newer.await.unwrap();
        assert_eq!(source.read().name, "newer");

        save_workspace(&location, &Workspace::default_named("older")).unwrap();
        older.await.unwrap();
        assert_eq!(source.read().name, "newer");

        source.reload().await.unwrap();
        assert_eq!(source.read().name, "older");
    }

    #[tokio::test]
    async fn reload_of_corrupt_file_fails_and_keeps_collection() {
        let dir = tempfile::tempdir().unwrap();
        let location = init_workspace_in(dir.path(), Some("kept".into())).unwrap();
        let source = WorkspaceSource::open(location.clone()).unwrap();
        fs::write(&location.path, "events: [unterminated").unwrap();

        assert!(matches!(
            source.reload().await,
            Err(SyncError::ReloadFailed(_))
        ));
        assert_eq!(source.read().name, "kept");
    }

    #[tokio::test]
    async fn collection_view_reads_fresh_entities() {
        let dir = tempfile::tempdir().unwrap();
        let location = init_workspace_in(dir.path(), None).unwrap();
        let source = WorkspaceSource::open(location).unwrap();
        let tasks = source.tasks();
        source
            .mutate("add task", |ws| {
                let task = ws.new_task("ship", "")?;
                ws.add_task(task)
            })
            .unwrap();
        assert!(tasks.entities().is_empty());
        tasks.reload().await.unwrap();
        assert_eq!(tasks.entities().len(), 1);
        assert_eq!(tasks.entities()[0].name, "ship");
    }
}
