//! Container format detection.

use crate::plugin::{DemuxerFactory, PluginRegistry, ProbeSource};
use std::sync::Arc;

/// Highest confidence a factory can report.
pub const MAX_CONFIDENCE: u8 = 100;

/// A factory that recognized the input.
#[derive(Clone)]
pub struct TypeMatch {
    /// The recognizing factory.
    pub factory: Arc<dyn DemuxerFactory>,
    /// Its confidence, `1..=100`.
    pub confidence: u8,
}

impl std::fmt::Debug for TypeMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeMatch")
            .field("factory", &self.factory.name())
            .field("confidence", &self.confidence)
            .finish()
    }
}

/// Walks a registry's factories in rank order and picks the most confident.
///
/// Ties go to the higher ranked factory. A factory reporting
/// [`MAX_CONFIDENCE`] ends the search.
pub struct TypeFinder<'a> {
    registry: &'a PluginRegistry,
}

impl<'a> TypeFinder<'a> {
    /// Create a type finder over a registry.
    pub fn new(registry: &'a PluginRegistry) -> Self {
        Self { registry }
    }

    /// Probe `source` against every factory.
    pub fn find(&self, source: &dyn ProbeSource) -> Option<TypeMatch> {
        let mut best: Option<TypeMatch> = None;
        for factory in self.registry.factories() {
            let Some(confidence) = factory.sniff(source) else {
                continue;
            };
            let confidence = confidence.clamp(1, MAX_CONFIDENCE);
            tracing::trace!(factory = factory.name(), confidence, "format sniffed");

            if best.as_ref().is_none_or(|b| confidence > b.confidence) {
                best = Some(TypeMatch {
                    factory,
                    confidence,
                });
            }
            if confidence == MAX_CONFIDENCE {
                break;
            }
        }

        match &best {
            Some(found) => tracing::debug!(
                factory = found.factory.name(),
                confidence = found.confidence,
                "format detected"
            ),
            None => tracing::debug!("no factory recognized the input"),
        }
        best
    }
}
