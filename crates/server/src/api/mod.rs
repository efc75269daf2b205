pub mod convert;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod youtube;

pub use routes::create_router;
