use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::AuthUser;
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::profiles())
        .merge(routes::recipes())
        .merge(routes::social());

    Router::new().nest("/v1", v1).with_state(state)
}
