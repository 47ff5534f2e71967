use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info};

use crate::{
    budgets::{window_containing, BudgetProgress},
    debts,
    email::Mailer,
    goals::{self, GoalProgress},
    repos::{
        notifications::{BillCandidate, BudgetCandidate, DebtCandidate, GoalCandidate},
        DynNotificationRepo,
    },
    transactions::next_occurrence,
};

/// How many days ahead of a recurring expense its reminder goes out.
pub const BILL_REMINDER_DAYS: i64 = 3;

/// The number of emails of each kind a sweep sent.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub budget_alerts: usize,
    pub goal_reminders: usize,
    pub bill_reminders: usize,
    pub debt_reminders: usize,
}

#[derive(Clone)]
pub struct NotificationService {
    notification_repo: DynNotificationRepo,
    mailer: Mailer,
}

impl NotificationService {
    pub fn new(notification_repo: DynNotificationRepo, mailer: Mailer) -> Self {
        Self {
            notification_repo,
            mailer,
        }
    }

    /// Send every notification that is due on `today`.
    ///
    /// Each kind is handled independently, so a failure in one is logged and
    /// the others still go out. A notification whose email fails is not
    /// marked as sent and will be retried by the next sweep.
    pub async fn sweep(&self, today: NaiveDate) -> SweepReport {
        let report = SweepReport {
            budget_alerts: counted("budget alerts", self.budget_alerts(today).await),
            goal_reminders: counted("goal reminders", self.goal_reminders(today).await),
            bill_reminders: counted("bill reminders", self.bill_reminders(today).await),
            debt_reminders: counted("debt reminders", self.debt_reminders(today).await),
        };

        info!(?report, %today, "Finished notification sweep.");

        report
    }

    async fn budget_alerts(&self, today: NaiveDate) -> anyhow::Result<usize> {
        let mut sent = 0;

        for BudgetCandidate {
            budget,
            category_name,
            recipient,
        } in self.notification_repo.budget_candidates().await?
        {
            let window = window_containing(budget.period, budget.start_date, today);
            if budget.last_alerted_window == Some(window.start) {
                continue;
            }

            let spent = self
                .notification_repo
                .budget_spent(budget.owner_id, budget.category_id, window)
                .await?;
            let progress = BudgetProgress::new(budget, category_name, window, spent);
            if !progress.needs_alert() {
                continue;
            }

            let currency = &recipient.currency;
            let result = self
                .mailer
                .send(
                    &recipient.user_email,
                    format!(
                        "You've used {}% of your {} budget",
                        progress.percent_used, progress.category_name
                    ),
                    "emails/budget_alert.txt",
                    &json!({
                        "name": recipient.user_name,
                        "category": progress.category_name,
                        "period": progress.budget.period.as_str(),
                        "percent_used": progress.percent_used,
                        "budget": currency.display(progress.budget.amount),
                        "spent": currency.display(progress.spent),
                        "remaining": currency.display(progress.remaining),
                        "window_start": progress.window.start.to_string(),
                        "window_end": progress.window.last_day().to_string(),
                    }),
                )
                .await;

            if let Err(error) = result {
                error!(?error, budget_id = %progress.budget.id, "Failed to send budget alert.");
                continue;
            }

            self.notification_repo
                .mark_budget_alerted(progress.budget.id, window.start)
                .await?;
            sent += 1;
        }

        Ok(sent)
    }

    async fn goal_reminders(&self, today: NaiveDate) -> anyhow::Result<usize> {
        let mut sent = 0;

        for GoalCandidate { goal, recipient } in self.notification_repo.goal_candidates(today).await? {
            let days_left = match goals::reminder_due(&goal, today) {
                Some(days_left) => days_left,
                None => continue,
            };

            let progress = GoalProgress::new(goal, today);
            let currency = &recipient.currency;
            let result = self
                .mailer
                .send(
                    &recipient.user_email,
                    format!("Reminder about your goal \"{}\"", progress.goal.name),
                    "emails/goal_reminder.txt",
                    &json!({
                        "name": recipient.user_name,
                        "goal": progress.goal.name,
                        "days_left": days_left,
                        "target_date": progress.goal.target_date.to_string(),
                        "saved": currency.display(progress.goal.saved_amount),
                        "target": currency.display(progress.goal.target_amount),
                        "percent": progress.percent,
                        "required_monthly": progress
                            .required_monthly
                            .map(|amount| currency.display(amount)),
                    }),
                )
                .await;

            if let Err(error) = result {
                error!(?error, goal_id = %progress.goal.id, "Failed to send goal reminder.");
                continue;
            }

            self.notification_repo
                .mark_goal_reminded(progress.goal.id, today)
                .await?;
            sent += 1;
        }

        Ok(sent)
    }

    async fn bill_reminders(&self, today: NaiveDate) -> anyhow::Result<usize> {
        let horizon = today + Duration::days(BILL_REMINDER_DAYS);
        let mut sent = 0;

        for BillCandidate {
            transaction,
            last_reminded_on,
            account_name,
            recipient,
        } in self.notification_repo.bill_candidates(today).await?
        {
            let frequency = match transaction.recurrence {
                Some(frequency) => frequency,
                None => continue,
            };
            let due_date = match next_occurrence(
                transaction.date,
                frequency,
                transaction.recurrence_end_date,
                today,
            ) {
                Some(due_date) if due_date <= horizon => due_date,
                _ => continue,
            };
            if last_reminded_on == Some(due_date) {
                debug!(transaction_id = %transaction.id, %due_date, "Bill reminder already sent.");
                continue;
            }

            let result = self
                .mailer
                .send(
                    &recipient.user_email,
                    format!("\"{}\" is due on {}", transaction.description, due_date),
                    "emails/bill_reminder.txt",
                    &json!({
                        "name": recipient.user_name,
                        "description": transaction.description,
                        "amount": recipient.currency.display(transaction.amount),
                        "account": account_name,
                        "due_date": due_date.to_string(),
                    }),
                )
                .await;

            if let Err(error) = result {
                error!(?error, transaction_id = %transaction.id, "Failed to send bill reminder.");
                continue;
            }

            self.notification_repo
                .mark_bill_reminded(transaction.id, due_date)
                .await?;
            sent += 1;
        }

        Ok(sent)
    }

    async fn debt_reminders(&self, today: NaiveDate) -> anyhow::Result<usize> {
        let mut sent = 0;

        for DebtCandidate { debt, recipient } in self.notification_repo.debt_candidates(today).await? {
            if debts::reminder_due(&debt, today).is_none() {
                continue;
            }

            let result = self
                .mailer
                .send(
                    &recipient.user_email,
                    format!("Your debt with {} is due on {}", debt.lender, debt.due_date),
                    "emails/debt_reminder.txt",
                    &json!({
                        "name": recipient.user_name,
                        "lender": debt.lender,
                        "due_date": debt.due_date.to_string(),
                        "outstanding": recipient.currency.display(debt.outstanding()),
                    }),
                )
                .await;

            if let Err(error) = result {
                error!(?error, debt_id = %debt.id, "Failed to send debt reminder.");
                continue;
            }

            self.notification_repo
                .mark_debt_reminded(debt.id, today)
                .await?;
            sent += 1;
        }

        Ok(sent)
    }
}

fn counted(kind: &str, result: anyhow::Result<usize>) -> usize {
    match result {
        Ok(sent) => sent,
        Err(error) => {
            error!(?error, kind, "Failed to send notifications.");

            0
        }
    }
}
