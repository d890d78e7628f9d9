use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::Duration;

use crate::api::ApiClient;
use crate::error::FetchError;
use crate::http_cache::{CacheKey, FetchCache};
use crate::metrics::{MetricsEnricher, StandardMetrics};
use crate::model::{CompetitionSeasonRow, MatchRow, Resource};
use crate::physical::{PerformanceScope, PerformanceSource, PhysicalParams};
use crate::state::{Delta, ProviderCommand};
use crate::table::load_upload;

/// Memoized tables, one cache per resource kind.
#[derive(Debug)]
pub struct Caches {
    pub reference: FetchCache<Vec<CompetitionSeasonRow>>,
    pub matches: FetchCache<Vec<MatchRow>>,
    pub performance: FetchCache<PerformanceScope>,
    pub events: FetchCache<Resource>,
}

impl Caches {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            reference: FetchCache::new(ttl),
            matches: FetchCache::new(ttl),
            performance: FetchCache::new(ttl),
            events: FetchCache::new(ttl),
        }
    }

    pub fn clear(&self) {
        self.reference.clear();
        self.matches.clear();
        self.performance.clear();
        self.events.clear();
    }
}

/// Executes provider commands one at a time; the only writer of the caches.
pub struct Provider {
    api: ApiClient,
    performance: Box<dyn PerformanceSource + Send>,
    metrics: Box<dyn MetricsEnricher + Send>,
    caches: Arc<Caches>,
}

impl Provider {
    pub fn new(api: ApiClient) -> Self {
        let caches = Arc::new(Caches::new(api.config().cache_ttl));
        let performance = Box::new(api.clone());
        Self {
            api,
            performance,
            metrics: Box::new(StandardMetrics),
            caches,
        }
    }

    pub fn with_sources(
        api: ApiClient,
        performance: Box<dyn PerformanceSource + Send>,
        metrics: Box<dyn MetricsEnricher + Send>,
    ) -> Self {
        let caches = Arc::new(Caches::new(api.config().cache_ttl));
        Self {
            api,
            performance,
            metrics,
            caches,
        }
    }

    pub fn caches(&self) -> Arc<Caches> {
        Arc::clone(&self.caches)
    }

    pub fn handle(&self, cmd: ProviderCommand) -> Delta {
        match cmd {
            ProviderCommand::LoadReference => {
                let key = CacheKey::from_url(&self.api.competition_editions_url());
                let result = self
                    .caches
                    .reference
                    .get_or_try_insert_with(&key, || self.api.fetch_competition_editions());
                Delta::ReferenceLoaded(result.map_err(|err| err.to_string()))
            }
            ProviderCommand::LoadMatches => {
                let key = CacheKey::from_url(&self.api.matches_url());
                let result = self
                    .caches
                    .matches
                    .get_or_try_insert_with(&key, || self.api.fetch_all_matches());
                Delta::MatchesLoaded(result.map_err(|err| err.to_string()))
            }
            ProviderCommand::FetchPerformance(params) => {
                let key = CacheKey::new(&self.api.endpoint("physical/"), &params.query_pairs());
                let result = self
                    .caches
                    .performance
                    .get_or_try_insert_with(&key, || self.load_performance(&params));
                Delta::PerformanceLoaded {
                    competition_id: params.competition,
                    season_id: params.season,
                    result: result.map_err(|err| err.to_string()),
                }
            }
            ProviderCommand::FetchDynamicEvents { match_id, format } => {
                let key = CacheKey::from_url(&self.api.dynamic_events_url(match_id, format));
                let result = self
                    .caches
                    .events
                    .get_or_try_insert_with(&key, || self.api.fetch_dynamic_events(match_id, format));
                Delta::EventsLoaded {
                    match_id,
                    result: result.map_err(|err| err.to_string()),
                }
            }
            ProviderCommand::LoadUpload { path } => Delta::UploadLoaded {
                path: path.display().to_string(),
                result: load_upload(&path).map_err(|err| format!("{err:#}")),
            },
            ProviderCommand::ClearCache => {
                self.caches.clear();
                Delta::Log("[INFO] Cache cleared".to_string())
            }
        }
    }

    fn load_performance(&self, params: &PhysicalParams) -> Result<PerformanceScope, FetchError> {
        let mut table = self.performance.get_physical(params)?;
        let metrics = self.metrics.add_standard_metrics(&mut table);
        Ok(PerformanceScope {
            competition_id: params.competition,
            season_id: params.season,
            table,
            metrics,
        })
    }
}

/// Runs the provider on its own thread until either channel closes.
pub fn spawn_provider(provider: Provider, tx: Sender<Delta>, cmd_rx: Receiver<ProviderCommand>) {
    thread::spawn(move || {
        for cmd in cmd_rx {
            if tx.send(provider.handle(cmd)).is_err() {
                return;
            }
        }
    });
}
