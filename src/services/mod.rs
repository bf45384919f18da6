pub mod admin;
pub mod audit;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod league;
pub mod mailer;
pub mod submission;
pub mod trade;
pub mod user;
