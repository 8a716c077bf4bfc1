//! Assembly of the search service shared by the CLI and the HTTP server.

use crate::archive::{ArchivingSearch, PerformanceArchive};
use crate::cache::{CachedSearch, SearchCache};
use crate::config::Settings;
use crate::error::Result;
use crate::orchestrator::{PerformanceSearch, SearchOrchestrator};
use std::sync::Arc;
use tracing::info;

/// Build the configured search service around the LLM-driven orchestrator.
pub fn build(settings: &Settings) -> Result<Arc<dyn PerformanceSearch>> {
    compose(SearchOrchestrator::new(settings)?, settings)
}

/// Wrap `core` in the decorators enabled in `settings`.
///
/// The cache sits outermost so that cache hits are not archived twice.
pub fn compose<S>(core: S, settings: &Settings) -> Result<Arc<dyn PerformanceSearch>>
where
    S: PerformanceSearch + 'static,
{
    let mut service: Arc<dyn PerformanceSearch> = Arc::new(core);

    if settings.archive.enabled {
        let archive = Arc::new(PerformanceArchive::from_settings(settings)?);
        service = Arc::new(ArchivingSearch::new(service, archive));
        info!("Archiving results to {:?}", settings.archive_path());
    }

    if settings.cache.enabled {
        let cache = SearchCache::from_settings(&settings.cache);
        service = Arc::new(CachedSearch::new(service, cache));
        info!(
            "Caching results for {}s (max {} performers)",
            settings.cache.ttl_seconds, settings.cache.max_entries
        );
    }

    Ok(service)
}
