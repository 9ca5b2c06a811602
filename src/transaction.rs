use anyhow::{Context, Result};
use futures_util::future::{BoxFuture, FutureExt, join_all};
use log::{debug, warn};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use crate::runtime::Runtime;

/// A reversible change, recorded before the change is made.
#[derive(Debug)]
pub enum UndoAction {
    /// Write `content` back to `path`.
    RestoreFile { path: PathBuf, content: String },
    /// Remove `path` (recursively for directories) if it exists at undo time.
    RemovePath { path: PathBuf },
    /// A scoped transaction that may already have been undone on its own.
    Nested(Arc<Transaction>),
}

impl UndoAction {
    pub fn restore_file(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        UndoAction::RestoreFile {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn remove_path(path: impl Into<PathBuf>) -> Self {
        UndoAction::RemovePath { path: path.into() }
    }

    fn undo<'a, R: Runtime>(&'a self, runtime: &'a R) -> BoxFuture<'a, Result<()>> {
        async move {
            match self {
                UndoAction::RestoreFile { path, content } => {
                    if let Some(parent) = path.parent()
                        && !parent.as_os_str().is_empty()
                        && !runtime.exists(parent)
                    {
                        runtime.create_dir_all(parent)?;
                    }
                    runtime
                        .write(path, content.as_bytes())
                        .with_context(|| format!("Failed to restore {:?}", path))
                }
                UndoAction::RemovePath { path } => {
                    if runtime.is_dir(path) {
                        runtime.remove_dir_all(path)
                    } else if runtime.exists(path) {
                        runtime.remove_file(path)
                    } else {
                        Ok(())
                    }
                }
                UndoAction::Nested(transaction) => {
                    transaction.undo(runtime).await;
                    Ok(())
                }
            }
        }
        .boxed()
    }
}

impl fmt::Display for UndoAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndoAction::RestoreFile { path, .. } => write!(f, "restore {}", path.display()),
            UndoAction::RemovePath { path } => write!(f, "remove {}", path.display()),
            UndoAction::Nested(transaction) => {
                write!(f, "nested transaction ({} actions)", transaction.len())
            }
        }
    }
}

/// Ordered set of undo actions.
///
/// Actions may be added from concurrent tasks. `undo` drains the set first, so
/// every action runs at most once and a second `undo` is a no-op.
#[derive(Debug, Default)]
pub struct Transaction {
    actions: Mutex<Vec<UndoAction>>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, action: UndoAction) {
        debug!("Registering undo: {}", action);
        self.lock().push(action);
    }

    /// Create a transaction scoped to one operation and register it here, so
    /// it is still undone if the scope never gets to undo it itself.
    pub fn nested(&self) -> Arc<Transaction> {
        let child = Arc::new(Transaction::new());
        self.add(UndoAction::Nested(Arc::clone(&child)));
        child
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Undo all registered actions concurrently and wait for every one of them.
    /// Failures are logged and never stop the other actions.
    pub fn undo<'a, R: Runtime>(&'a self, runtime: &'a R) -> BoxFuture<'a, ()> {
        async move {
            let actions = std::mem::take(&mut *self.lock());
            if actions.is_empty() {
                return;
            }
            debug!("Undoing {} action(s)", actions.len());

            let results = join_all(actions.iter().map(|action| action.undo(runtime))).await;
            for (action, result) in actions.iter().zip(results) {
                if let Err(e) = result {
                    warn!("Failed to {}: {:#}", action, e);
                }
            }
        }
        .boxed()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<UndoAction>> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
