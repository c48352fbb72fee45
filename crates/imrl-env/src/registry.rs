//! Environment registry for creating environments by name

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use imrl_core::{Environment, EnvironmentConfig, ImrlError, Result};
use tracing::debug;

use crate::{ChemistryLab, CombinationLock, ContinuousGridworld, Gridworld};

type EnvConstructor =
    Box<dyn Fn(EnvironmentConfig) -> Result<Box<dyn Environment>> + Send + Sync>;

lazy_static::lazy_static! {
    static ref REGISTRY: Arc<Mutex<EnvRegistry>> = Arc::new(Mutex::new(EnvRegistry::with_builtins()));
}

/// Named environment constructors
pub struct EnvRegistry {
    /// Registered environments
    envs: HashMap<String, EnvConstructor>,
}

impl EnvRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            envs: HashMap::new(),
        }
    }

    /// Create a registry holding every environment of this crate
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("gridworld", |c| Ok(Box::new(Gridworld::new(c)?)));
        registry.register("gridworld_continuous", |c| {
            Ok(Box::new(ContinuousGridworld::new(c)?))
        });
        registry.register("combination_lock", |c| Ok(Box::new(CombinationLock::new(c)?)));
        registry.register("chemistry_lab", |c| Ok(Box::new(ChemistryLab::new(c)?)));
        registry
    }

    /// Register an environment, replacing any previous one of the same name
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(EnvironmentConfig) -> Result<Box<dyn Environment>> + Send + Sync + 'static,
    {
        self.envs.insert(name.into(), Box::new(constructor));
    }

    /// Create an environment by name
    pub fn make(&self, name: &str, config: EnvironmentConfig) -> Result<Box<dyn Environment>> {
        let constructor = self
            .envs
            .get(name)
            .ok_or_else(|| ImrlError::Environment(format!("Unknown environment: {name}")))?;
        debug!(name, seed = ?config.seed, "creating environment");
        constructor(config)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.envs.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for EnvRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn global() -> Result<MutexGuard<'static, EnvRegistry>> {
    REGISTRY
        .lock()
        .map_err(|_| ImrlError::Environment("environment registry lock poisoned".into()))
}

/// Register an environment globally
pub fn register_env<F>(name: impl Into<String>, constructor: F) -> Result<()>
where
    F: Fn(EnvironmentConfig) -> Result<Box<dyn Environment>> + Send + Sync + 'static,
{
    global()?.register(name, constructor);
    Ok(())
}

/// Create an environment by name from the global registry
pub fn make_env(name: &str, config: EnvironmentConfig) -> Result<Box<dyn Environment>> {
    global()?.make(name, config)
}

/// List all globally registered environments
pub fn list_envs() -> Result<Vec<String>> {
    Ok(global()?.list())
}
