// prices-api: HTTP front end for daily average prices
//
// Validates requests, hands the work to the background task queue and
// maps the outcome to a JSON response or an error envelope.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod docs;
pub mod handler;
pub mod server;

pub use config::Settings;
pub use dispatcher::{AverageDispatcher, DispatchError, DEFAULT_WAIT_TIMEOUT};
pub use handler::{AverageRequest, AverageResponse, ApiError};
pub use docs::ApiDoc;
pub use server::{handle_request, serve, AppState};
