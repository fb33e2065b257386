//! Library surface of the valix API binary, exposed so integration tests
//! can build the real router.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod openapi;
pub mod router;
pub mod state;
