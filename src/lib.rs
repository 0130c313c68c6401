pub mod amount;
pub mod api;
pub mod bet;
pub mod chips;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod round;
pub mod session;
pub mod sync;
pub mod worker;

pub use api::{
    ApiClient,
    RollsApi,
    UserIdentity,
};
pub use config::AppConfig;
pub use error::{
    ApiError,
    ErrorKind,
};
