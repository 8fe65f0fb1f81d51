use std::sync::Arc;

use vidtube_db::sea_orm::DatabaseConnection;
use vidtube_session::SessionService;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub sessions: Arc<SessionService>,
    pub allowed_origins: Arc<Vec<String>>,
}
