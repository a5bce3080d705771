//! REST endpoint handlers organized by resource.

pub mod arisan;
pub mod payout;
pub mod randomness;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(arisan::routes())
        .merge(randomness::routes())
        .merge(payout::routes())
}
