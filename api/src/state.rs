use std::sync::Arc;

use sqlx::PgPool;

use crate::oracle::ReflectionOracle;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub oracle: Arc<dyn ReflectionOracle>,
}
