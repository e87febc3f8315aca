use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;

use super::AuthProvider;

/// Builds a fresh provider instance.
pub type ProviderFactory = dyn Fn() -> Arc<dyn AuthProvider> + Send + Sync;

/// Lazily built, resettable provider instance shared by one context.
#[derive(Clone)]
pub struct ProviderHandle {
    factory: Arc<ProviderFactory>,
    current: Arc<RwLock<Option<Arc<dyn AuthProvider>>>>,
    generation: Arc<AtomicU64>,
}

impl ProviderHandle {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<dyn AuthProvider> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            current: Arc::new(RwLock::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Handle that always hands out `provider`; `reset` is a no-op apart
    /// from the generation count.
    pub fn fixed(provider: Arc<dyn AuthProvider>) -> Self {
        Self::new(move || provider.clone())
    }

    pub fn get(&self) -> Arc<dyn AuthProvider> {
        if let Some(provider) = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return provider.clone();
        }

        let mut slot = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        slot.get_or_insert_with(|| {
            debug!("Building auth provider instance");
            (self.factory)()
        })
        .clone()
    }

    /// Drops the current instance so the next `get` builds a new one. Any
    /// state cached inside the old instance goes with it.
    pub fn reset(&self) {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "Auth provider reset (had instance: {}, generation {})",
            previous.is_some(),
            generation
        );
    }

    /// How many times `reset` has been called.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
