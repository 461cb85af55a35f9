//! Configuration nodes and the registry that keeps exactly one node per
//! configuration root for the lifetime of a build.
//!
//! Nodes live in an append-only arena and are addressed by [`NodeId`], which
//! doubles as the cheap identity used in compilation cache keys. Isolation is
//! by root identity: two roots with textually identical options still get two
//! nodes, and therefore two analyzers that never see each other's files.

use dashmap::DashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::analysis::{AnalysisOutput, Analyzer, RootInfo};
use crate::config::CompilerOptions;
use crate::error::{AnalysisError, LoaderError};

/// Identity of a configuration root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RootId {
    /// A root marked by a descriptor file; holds the descriptor's path.
    Descriptor(PathBuf),
    /// The synthesized root for files without any descriptor; holds its directory.
    Default(PathBuf),
}

impl RootId {
    pub fn directory(&self) -> &Path {
        match self {
            RootId::Descriptor(descriptor) => descriptor.parent().unwrap_or(descriptor),
            RootId::Default(directory) => directory,
        }
    }

    pub fn descriptor(&self) -> Option<&Path> {
        match self {
            RootId::Descriptor(descriptor) => Some(descriptor),
            RootId::Default(_) => None,
        }
    }

    pub fn info(&self) -> RootInfo<'_> {
        RootInfo {
            directory: self.directory(),
            descriptor: self.descriptor(),
        }
    }
}

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootId::Descriptor(descriptor) => write!(f, "{}", descriptor.display()),
            RootId::Default(directory) => write!(f, "default root at {}", directory.display()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Compiler options plus the analysis capability for one configuration root.
pub struct ConfigurationNode {
    id: NodeId,
    root: RootId,
    options: Arc<CompilerOptions>,
    analyzer: Mutex<Box<dyn Analyzer>>,
}

impl ConfigurationNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn root(&self) -> &RootId {
        &self.root
    }

    pub fn root_directory(&self) -> &Path {
        self.root.directory()
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn is_default(&self) -> bool {
        matches!(self.root, RootId::Default(_))
    }

    /// Run the node's analyzer on one file. Calls into the same node
    /// serialize; different nodes run in parallel.
    pub fn analyze(&self, file: &Path, source: &str) -> Result<AnalysisOutput, AnalysisError> {
        lock_recovering(&self.analyzer, "analyzer").analyze(file, source)
    }
}

impl fmt::Debug for ConfigurationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationNode")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// What a node is built from, before the registry assigns it an id.
pub struct NodeParts {
    pub options: CompilerOptions,
    pub analyzer: Box<dyn Analyzer>,
}

type Slot = Arc<Mutex<Option<Arc<ConfigurationNode>>>>;

#[derive(Default)]
pub struct IsolationRegistry {
    slots: DashMap<RootId, Slot>,
    arena: RwLock<Vec<Arc<ConfigurationNode>>>,
}

impl IsolationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the node for `root`, building it with `create` on first use.
    ///
    /// Concurrent first requests for the same root wait for a single
    /// construction and all receive the same node. A failed construction
    /// leaves the slot empty, so the error reaches every caller that asks.
    pub fn get_or_create<F>(&self, root: &RootId, create: F) -> Result<Arc<ConfigurationNode>, LoaderError>
    where
        F: FnOnce(&RootId) -> Result<NodeParts, LoaderError>,
    {
        let slot: Slot = self.slots.entry(root.clone()).or_default().clone();
        let mut slot = lock_recovering(&slot, "registry slot");
        if let Some(node) = slot.as_ref() {
            return Ok(node.clone());
        }

        let parts = create(root)?;
        let node = self.push(root.clone(), parts);
        log::debug!("Created configuration node {:?} for {}", node.id(), root);
        *slot = Some(node.clone());
        Ok(node)
    }

    fn push(&self, root: RootId, parts: NodeParts) -> Arc<ConfigurationNode> {
        let mut arena = self.arena.write().unwrap_or_else(|poisoned| {
            log::warn!("configuration arena lock poisoned; recovering");
            poisoned.into_inner()
        });
        let node = Arc::new(ConfigurationNode {
            id: NodeId(arena.len() as u32),
            root,
            options: Arc::new(parts.options),
            analyzer: Mutex::new(parts.analyzer),
        });
        arena.push(node.clone());
        node
    }

    pub fn get(&self, root: &RootId) -> Option<Arc<ConfigurationNode>> {
        let slot = self.slots.get(root)?.value().clone();
        let node = lock_recovering(&slot, "registry slot").clone();
        node
    }

    pub fn node(&self, id: NodeId) -> Option<Arc<ConfigurationNode>> {
        self.read_arena().get(id.index()).cloned()
    }

    pub fn len(&self) -> usize {
        self.read_arena().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_arena(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<ConfigurationNode>>> {
        self.arena.read().unwrap_or_else(|poisoned| {
            log::warn!("configuration arena lock poisoned; recovering");
            poisoned.into_inner()
        })
    }
}

/// Lock `mutex`, taking the guard back if a panicking holder poisoned it.
pub(crate) fn lock_recovering<'a, T: ?Sized>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned: PoisonError<MutexGuard<'a, T>>| {
        log::warn!("{what} lock poisoned; recovering");
        poisoned.into_inner()
    })
}
