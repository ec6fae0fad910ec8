pub mod activation;
pub mod config;
pub mod countries;
pub mod db;
pub mod directory;
pub mod email_rate;
pub mod error;
pub mod login_name;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod otp;
pub mod routes;
pub mod state;
