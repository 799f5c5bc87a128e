//! Shared fakes for detection integration tests
//!
//! `ScriptedSource` replays one scripted response per fetch and
//! `RecordingNotifier` keeps every notification it was asked to send.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use seawatch::notifier::Notifier;
use seawatch::position::PositionReport;
use seawatch::vessel_source::{FetchedPositions, PositionSource};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted upstream response
pub enum Scripted {
    Positions(Vec<PositionReport>),
    Fail(String),
    /// Never returns; exercises the fetch timeout
    Hang,
}

#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Scripted>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }

    pub fn push(&self, step: Scripted) {
        self.script.lock().unwrap().push_back(step);
    }
}

#[async_trait]
impl PositionSource for ScriptedSource {
    async fn fetch_positions(&self) -> Result<FetchedPositions> {
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Scripted::Positions(positions)) => Ok(positions.into()),
            Some(Scripted::Fail(reason)) => Err(anyhow::anyhow!(reason)),
            Some(Scripted::Hang) => std::future::pending().await,
            None => Err(anyhow::anyhow!("script exhausted")),
        }
    }

    async fn fetch_entities(&self, _entity_ids: &[String]) -> Result<FetchedPositions> {
        Ok(FetchedPositions::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
}

/// Records every send; fails like a real channel when there are no recipients
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<()> {
        if recipients.is_empty() {
            anyhow::bail!("no recipients configured");
        }
        self.sent.lock().unwrap().push(SentNotification {
            subject: subject.to_string(),
            body: body.to_string(),
            recipients: recipients.to_vec(),
        });
        Ok(())
    }
}

/// Always fails, counting attempts
#[derive(Default)]
pub struct FailingNotifier {
    attempts: Mutex<usize>,
}

impl FailingNotifier {
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _subject: &str, _body: &str, _recipients: &[String]) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        anyhow::bail!("SMTP relay refused connection")
    }
}

/// 1 degree square centred on (38.9, -77.0)
pub fn square_region() -> Vec<(f64, f64)> {
    vec![(38.4, -77.5), (39.4, -77.5), (39.4, -76.5), (38.4, -76.5)]
}

/// Tick `i` of a 30 second schedule
pub fn tick(i: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(30 * i)
}

pub fn report(id: &str, latitude: f64, longitude: f64, speed_knots: f64, i: i64) -> PositionReport {
    PositionReport::new(id, latitude, longitude, speed_knots, tick(i))
}
