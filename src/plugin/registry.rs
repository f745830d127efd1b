//! Ranked list of demuxer factories.

use super::DemuxerFactory;
use std::sync::{Arc, RwLock};

/// Demuxer factories ordered by descending rank.
///
/// The registry is a plain value handed to each filter; there is no global
/// instance. Factories of equal rank keep their registration order.
///
/// ```rust,ignore
/// let registry = Arc::new(PluginRegistry::new());
/// registry.register(Arc::new(Mp4Factory));
/// let demuxer = DemuxerFilter::new("demux", registry, DemuxerConfig::default());
/// ```
#[derive(Default)]
pub struct PluginRegistry {
    factories: RwLock<Vec<Arc<dyn DemuxerFactory>>>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factory.
    ///
    /// A factory with the same name as an existing one replaces it.
    pub fn register(&self, factory: Arc<dyn DemuxerFactory>) {
        let mut factories = self.factories.write().unwrap();
        factories.retain(|f| f.name() != factory.name());
        let position = factories
            .iter()
            .position(|f| f.rank() < factory.rank())
            .unwrap_or(factories.len());
        tracing::debug!(
            factory = factory.name(),
            rank = factory.rank(),
            position,
            "demuxer factory registered"
        );
        factories.insert(position, factory);
    }

    /// Remove a factory by name. Returns true if it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut factories = self.factories.write().unwrap();
        let before = factories.len();
        factories.retain(|f| f.name() != name);
        factories.len() != before
    }

    /// Look up a factory by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn DemuxerFactory>> {
        self.factories
            .read()
            .unwrap()
            .iter()
            .find(|f| f.name() == name)
            .cloned()
    }

    /// Snapshot of all factories in rank order.
    pub fn factories(&self) -> Vec<Arc<dyn DemuxerFactory>> {
        self.factories.read().unwrap().clone()
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.read().unwrap().len()
    }

    /// Check if no factory is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let factories = self.factories.read().unwrap();
        f.debug_list()
            .entries(factories.iter().map(|f| (f.name(), f.rank())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::plugin::{DemuxerPlugin, ProbeSource};

    struct Named(&'static str, u32);

    impl DemuxerFactory for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn rank(&self) -> u32 {
            self.1
        }

        fn sniff(&self, _source: &dyn ProbeSource) -> Option<u8> {
            None
        }

        fn create(&self) -> Result<Box<dyn DemuxerPlugin>> {
            Err(Error::UnsupportedFormat(self.0.to_string()))
        }
    }

    fn names(registry: &PluginRegistry) -> Vec<String> {
        registry
            .factories()
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    #[test]
    fn test_rank_order_is_stable() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(Named("wav", 10)));
        registry.register(Arc::new(Named("mp4", 100)));
        registry.register(Arc::new(Named("aac", 10)));
        registry.register(Arc::new(Named("mkv", 50)));

        assert_eq!(names(&registry), ["mp4", "mkv", "wav", "aac"]);
    }

    #[test]
    fn test_replace_and_unregister() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(Named("mp4", 100)));
        registry.register(Arc::new(Named("wav", 50)));
        registry.register(Arc::new(Named("mp4", 1)));

        assert_eq!(names(&registry), ["wav", "mp4"]);
        assert_eq!(registry.get("mp4").map(|f| f.rank()), Some(1));
        assert!(registry.unregister("wav"));
        assert!(!registry.unregister("wav"));
        assert_eq!(registry.len(), 1);
    }
}
