//! Strategy Registry
//!
//! A named catalog of [`RetryStrategy`] values with a global default and
//! optional per-category defaults, plus a single process-wide slot consulted
//! by higher-level policy facades during bootstrap.
//!
//! Construction resolves everything eagerly: duplicate names, an unknown
//! default and unresolved category mappings all fail here, never on first
//! lookup.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::ConfigError;
use crate::strategy::{self, RetryStrategy};

/// Catalog of named strategies.
///
/// Strategies are stored behind `Arc` so that lookups hand out shared,
/// read-only policies; any number of engines may hold one concurrently.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<RetryStrategy>>,
    default_name: Option<String>,
    category_defaults: HashMap<String, Arc<RetryStrategy>>,
}

impl StrategyRegistry {
    /// Index `strategies` by name and wire the defaults.
    ///
    /// `category_defaults` maps category names to strategy names; every
    /// entry must resolve against the catalog. Duplicate strategy names fail
    /// construction rather than overwriting silently.
    pub fn new<I, D>(
        strategies: I,
        default_name: Option<&str>,
        category_defaults: D,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = RetryStrategy>,
        D: IntoIterator<Item = (String, String)>,
    {
        let mut by_name: HashMap<String, Arc<RetryStrategy>> = HashMap::new();
        for strategy in strategies {
            let name = strategy.name().to_string();
            if by_name.insert(name.clone(), Arc::new(strategy)).is_some() {
                return Err(ConfigError::DuplicateStrategy(name));
            }
        }

        let mut registry = Self {
            strategies: by_name,
            default_name: None,
            category_defaults: HashMap::new(),
        };

        if let Some(name) = default_name {
            registry.set_default(name)?;
        }

        for (category, strategy_name) in category_defaults {
            let strategy = registry
                .strategies
                .get(&strategy_name)
                .cloned()
                .ok_or_else(|| ConfigError::UnresolvedCategory {
                    category: category.clone(),
                    strategy: strategy_name.clone(),
                })?;
            registry.category_defaults.insert(category, strategy);
        }

        Ok(registry)
    }

    /// Catalog preloaded with the four shared default strategies; the
    /// global default is the fixed-interval policy.
    pub fn with_defaults() -> Self {
        Self::new(
            [
                strategy::default_no_retry().clone(),
                strategy::default_fixed_interval().clone(),
                strategy::default_incremental().clone(),
                strategy::default_exponential().clone(),
            ],
            Some(strategy::names::FIXED_INTERVAL),
            [],
        )
        .expect("built-in strategies are disjoint and resolvable")
    }

    /// Select the global default strategy by name.
    pub fn set_default(&mut self, name: &str) -> Result<(), ConfigError> {
        if !self.strategies.contains_key(name) {
            return Err(ConfigError::UnknownStrategy(name.to_string()));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// The configured global default.
    pub fn default_strategy(&self) -> Result<Arc<RetryStrategy>, ConfigError> {
        let name = self.default_name.as_deref().ok_or(ConfigError::NoDefault)?;
        self.strategy(name)
    }

    /// Exact lookup by name.
    pub fn strategy(&self, name: &str) -> Result<Arc<RetryStrategy>, ConfigError> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownStrategy(name.to_string()))
    }

    /// Category-specific default, falling back to the global default.
    pub fn default_strategy_for(&self, category: &str) -> Result<Arc<RetryStrategy>, ConfigError> {
        if let Some(strategy) = self.category_defaults.get(category) {
            return Ok(strategy.clone());
        }
        self.default_strategy()
    }

    /// Registered strategy names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

static PROCESS_SLOT: OnceLock<RwLock<Option<Arc<StrategyRegistry>>>> = OnceLock::new();

fn process_slot() -> &'static RwLock<Option<Arc<StrategyRegistry>>> {
    PROCESS_SLOT.get_or_init(|| RwLock::new(None))
}

/// Install `registry` as the process-wide instance.
///
/// With `fail_if_set`, an occupied slot only accepts the identical instance
/// (pointer equality); handing a different registry fails with
/// [`ConfigError::AlreadySet`]. Without the flag the slot is replaced.
pub fn set_process_registry(
    registry: Arc<StrategyRegistry>,
    fail_if_set: bool,
) -> Result<(), ConfigError> {
    let mut slot = process_slot()
        .write()
        .map_err(|_| ConfigError::LockPoisoned)?;
    if fail_if_set {
        if let Some(current) = slot.as_ref() {
            if !Arc::ptr_eq(current, &registry) {
                return Err(ConfigError::AlreadySet);
            }
        }
    }
    *slot = Some(registry);
    Ok(())
}

/// The process-wide registry, installed during bootstrap.
pub fn process_registry() -> Result<Arc<StrategyRegistry>, ConfigError> {
    process_slot()
        .read()
        .map_err(|_| ConfigError::LockPoisoned)?
        .clone()
        .ok_or(ConfigError::NotSet)
}
