use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

use crate::services::PresenceService;

/// 启动后台清理任务，按固定间隔移除不活跃的参与者。
/// `shutdown` 变为 `true` 或发送端被丢弃时任务退出。
pub fn spawn_inactivity_reaper(
    service: Arc<PresenceService>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_ms = every.as_millis() as u64, "inactivity reaper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = service.reap_inactive().await {
                        tracing::error!(error = %err, "inactivity sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("inactivity reaper stopped");
    })
}
