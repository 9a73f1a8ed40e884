//! Daily news and weather reports pushed to configured receivers.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::Scheduler;
use crate::bot::{AppState, Robot};
use crate::commands::lookup::{hot_list, weather};
use crate::config::ReportsConfig;
use crate::router::ReportKind;

pub async fn compose(state: &AppState, config: &ReportsConfig, kind: ReportKind) -> Result<String> {
    match kind {
        ReportKind::News => {
            let topics = hot_list(&state.api, &config.news_board).await?;
            let today = chrono::Local::now().format("%Y-%m-%d");
            Ok(format!("{} {}要闻：\n{}", today, config.news_board, topics.trim_end()))
        }
        ReportKind::Weather => weather(&state.api, &config.weather_city).await,
    }
}

pub fn receivers(config: &ReportsConfig, kind: ReportKind) -> &[String] {
    match kind {
        ReportKind::News => &config.news_receivers,
        ReportKind::Weather => &config.weather_receivers,
    }
}

/// Compose a report once and send it to each receiver. Returns how many
/// receivers got it.
pub async fn broadcast(state: &AppState, config: &ReportsConfig, kind: ReportKind) -> usize {
    let receivers = receivers(config, kind);
    if receivers.is_empty() {
        warn!("No receivers configured for {:?} report", kind);
        return 0;
    }

    let report = match compose(state, config, kind).await {
        Ok(report) => report,
        Err(e) => {
            error!("Failed to compose {:?} report: {:#}", kind, e);
            return 0;
        }
    };

    let mut delivered = 0;
    for receiver in receivers {
        match state.responder.send_text(receiver, &report).await {
            Ok(()) => delivered += 1,
            Err(e) => error!("Failed to send {:?} report to {}: {:#}", kind, receiver, e),
        }
    }
    info!("{:?} report sent to {}/{} receivers", kind, delivered, receivers.len());
    delivered
}

/// Add a cron job per report kind that has receivers
pub async fn register(scheduler: &Scheduler, robot: Arc<Robot>) -> Result<()> {
    for (kind, cron, name) in [
        (ReportKind::News, robot.reports().news_cron.clone(), "news report"),
        (ReportKind::Weather, robot.reports().weather_cron.clone(), "weather report"),
    ] {
        if receivers(robot.reports(), kind).is_empty() {
            continue;
        }
        let robot = robot.clone();
        scheduler
            .add_cron_job(&cron, name, move || {
                let robot = robot.clone();
                Box::pin(async move {
                    robot.broadcast(kind).await;
                })
            })
            .await?;
    }
    Ok(())
}
