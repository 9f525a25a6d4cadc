//! Explicit document handles threaded through every strategy.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::{DomSnapshot, PageSpec};

/// Source of the current document state.
///
/// Strategies take a fresh snapshot whenever they need to re-check the
/// page, e.g. after waiting on the network.
pub trait DocumentHandle: Send + Sync {
    fn snapshot(&self) -> Arc<DomSnapshot>;

    fn url(&self) -> String {
        self.snapshot().url.clone()
    }
}

/// A document that never changes, used for fixtures and offline runs.
#[derive(Clone, Debug)]
pub struct StaticDocument {
    snapshot: Arc<DomSnapshot>,
}

impl StaticDocument {
    pub fn new(snapshot: DomSnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }

    pub fn from_page(page: PageSpec) -> Self {
        Self::new(DomSnapshot::from_page(page))
    }
}

impl DocumentHandle for StaticDocument {
    fn snapshot(&self) -> Arc<DomSnapshot> {
        Arc::clone(&self.snapshot)
    }
}

/// A document whose content can be swapped while a resolution is running.
#[derive(Debug)]
pub struct LiveDocument {
    current: RwLock<Arc<DomSnapshot>>,
}

impl LiveDocument {
    pub fn new(snapshot: DomSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Publish a new document state; returns the previous one.
    pub fn replace(&self, snapshot: DomSnapshot) -> Arc<DomSnapshot> {
        std::mem::replace(&mut *self.current.write(), Arc::new(snapshot))
    }
}

impl DocumentHandle for LiveDocument {
    fn snapshot(&self) -> Arc<DomSnapshot> {
        Arc::clone(&self.current.read())
    }
}
