pub mod catalog;
pub mod documents;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod routes;
pub mod transfers;

pub use routes::create_router;
