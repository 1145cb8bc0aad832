use std::sync::Arc;

use crate::channels::ChannelRegistry;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::extractor::Extractor;
use crate::observability::Metrics;
use crate::relay::ProgressRelay;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<ChannelRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub extractor: Arc<dyn Extractor>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, extractor: Arc<dyn Extractor>) -> Self {
        let registry = Arc::new(ChannelRegistry::new());
        let metrics = Arc::new(Metrics::new());
        let relay = ProgressRelay::new(registry.clone(), metrics.clone());
        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            relay,
            extractor.clone(),
            metrics.clone(),
        ));

        Self {
            config: Arc::new(config),
            registry,
            dispatcher,
            extractor,
            metrics,
        }
    }
}
