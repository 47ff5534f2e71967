pub mod accounts;
pub mod ai;
pub mod analytics;
pub mod authentication;
pub mod budgets;
pub mod categories;
pub mod cli;
pub mod client_ip;
pub mod currency;
pub mod database;
pub mod dates;
pub mod debts;
pub mod email;
pub mod goals;
pub mod http_err;
pub mod investments;
pub mod invitations;
pub mod notifications;
pub mod passwords;
pub mod rate_limit;
pub mod reports;
pub mod repos;
pub mod server;
pub mod service_err;
pub mod transactions;
pub mod users;
