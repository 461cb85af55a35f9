//! Maps source files to the configuration node that owns them.
//!
//! The owner is the nearest ancestor directory holding a descriptor. Files
//! with no descriptor anywhere above them belong to the synthesized default
//! root. Nested roots are strictly isolated: a file under `a/b/` with its own
//! descriptor is never seen by `a/`'s analyzer.

use dashmap::DashMap;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::analysis::AnalyzerFactory;
use crate::config::{self, CompilerOptions};
use crate::error::LoaderError;
use crate::helpers;
use crate::registry::{ConfigurationNode, IsolationRegistry, NodeParts, RootId};

/// How the resolver looks for descriptors.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub config_file_name: String,
    /// When false every file belongs to the default root.
    pub config_lookup: bool,
    /// Applied on top of every root's own options.
    pub compiler_options: Map<String, Value>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            config_file_name: String::from(config::DEFAULT_CONFIG_FILE_NAME),
            config_lookup: true,
            compiler_options: Map::new(),
        }
    }
}

/// Finds the root owning a file and loads that root's options. Needs no
/// analysis capability, so it also serves tools that only inspect configuration.
pub struct RootLocator {
    build_context: PathBuf,
    settings: ResolverSettings,
    /// directory → nearest descriptor at or above it
    lookups: DashMap<PathBuf, Option<PathBuf>>,
}

impl RootLocator {
    pub fn new(build_context: &Path, settings: ResolverSettings) -> Self {
        Self {
            build_context: helpers::get_abs_path(build_context),
            settings,
            lookups: DashMap::new(),
        }
    }

    /// Which root owns `file`.
    pub fn root_for(&self, file: &Path) -> RootId {
        let file = helpers::get_abs_path(file);
        let dir = file.parent().unwrap_or(&file).to_path_buf();

        let descriptor = if self.settings.config_lookup {
            self.nearest_descriptor(&dir)
        } else {
            None
        };

        match descriptor {
            Some(descriptor) => RootId::Descriptor(descriptor),
            None if helpers::is_inside(&self.build_context, &file) => RootId::Default(self.build_context.clone()),
            None => RootId::Default(dir),
        }
    }

    /// The options a node for `root` is built with: the descriptor chain (or
    /// the loader defaults), then the configured overrides, then the
    /// in-memory emit overrides.
    pub fn options_for(&self, root: &RootId) -> Result<CompilerOptions, LoaderError> {
        let mut options = match root.descriptor() {
            Some(descriptor) => config::read_config(descriptor)?,
            None => CompilerOptions::loader_defaults(),
        };
        options.merge(&self.settings.compiler_options);
        options.apply_in_memory_emit_overrides();
        Ok(options)
    }

    fn nearest_descriptor(&self, dir: &Path) -> Option<PathBuf> {
        if let Some(cached) = self.lookups.get(dir) {
            return cached.value().clone();
        }
        let found = helpers::get_nearest_config(dir, &self.settings.config_file_name);
        log::debug!(
            "Nearest {} for {}: {}",
            self.settings.config_file_name,
            dir.display(),
            found
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| String::from("none"))
        );
        self.lookups.insert(dir.to_path_buf(), found.clone());
        found
    }
}

pub struct ConfigResolver {
    locator: RootLocator,
    registry: IsolationRegistry,
    factory: Arc<dyn AnalyzerFactory>,
}

impl ConfigResolver {
    pub fn new(build_context: &Path, settings: ResolverSettings, factory: Arc<dyn AnalyzerFactory>) -> Self {
        Self {
            locator: RootLocator::new(build_context, settings),
            registry: IsolationRegistry::new(),
            factory,
        }
    }

    /// The node owning `file`, created on first use.
    pub fn resolve(&self, file: &Path) -> Result<Arc<ConfigurationNode>, LoaderError> {
        let root = self.locator.root_for(file);
        self.registry.get_or_create(&root, |root| {
            let options = self.locator.options_for(root)?;
            let analyzer = self.factory.create(root.info(), &options)?;
            Ok(NodeParts { options, analyzer })
        })
    }

    pub fn root_for(&self, file: &Path) -> RootId {
        self.locator.root_for(file)
    }

    pub fn registry(&self) -> &IsolationRegistry {
        &self.registry
    }
}
