pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod leagues;
pub mod submissions;
pub mod trades;
pub mod users;
