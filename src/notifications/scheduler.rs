use std::time::Duration;

use chrono::Utc;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::debug;

use super::NotificationService;

/// Run a notification sweep every `period` for as long as the process lives.
/// The first sweep runs immediately.
pub fn spawn(service: NotificationService, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            debug!("Starting scheduled notification sweep.");

            service.sweep(Utc::now().date_naive()).await;
        }
    })
}
