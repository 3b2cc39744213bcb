pub mod auth;
pub mod clients;
pub mod hosts;
pub mod sessions;
pub mod users;
