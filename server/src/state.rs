//! Shared state handed to every handler

use std::sync::Arc;

use greenthumb::app::AppContext;

pub type SharedState = Arc<AppContext>;
