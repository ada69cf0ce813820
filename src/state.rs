use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::rate_limit::ApiRateLimiter;
use crate::sheets::SheetsConnector;
use crate::store::Store;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sheets: Arc<dyn SheetsConnector>,
    pub config: Config,
    pub cache: ResponseCache,
    pub api_limiter: ApiRateLimiter,
}
