//! Emails sent on a schedule rather than in response to a request: budget
//! alerts and reminders about goals, bills and debts.

pub mod scheduler;
mod services;

pub use services::{NotificationService, SweepReport, BILL_REMINDER_DAYS};
