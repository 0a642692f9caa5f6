//! Six-field cron expression trigger (spec §3 `CronTrigger`), delegating
//! parsing and forward search to the `cron` crate.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};

/// `?` is a Quartz-style synonym for `*` in the day-of-month/day-of-week
/// fields; the `cron` crate only understands `*`.
fn normalize(expression: &str) -> String {
    expression
        .split_whitespace()
        .map(|field| if field == "?" { "*" } else { field })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone)]
pub struct CronTrigger {
    expression: String,
    time_zone: Tz,
    schedule: Schedule,
}

impl CronTrigger {
    pub fn new(expression: &str, time_zone: Tz) -> Result<Self> {
        let normalized = normalize(expression);
        let schedule = Schedule::from_str(&normalized).map_err(|source| SchedulerError::InvalidCronExpression {
            expr: expression.to_string(),
            source,
        })?;
        Ok(Self {
            expression: expression.to_string(),
            time_zone,
            schedule,
        })
    }

    pub fn utc(expression: &str) -> Result<Self> {
        Self::new(expression, Tz::UTC)
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    pub fn compute_first_fire_time(&self, start_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = start_time.with_timezone(&self.time_zone) - Duration::seconds(1);
        self.schedule.after(&local).next().map(|dt| dt.with_timezone(&Utc))
    }

    pub fn next_fire_time(&self, previous_fire_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = previous_fire_time.with_timezone(&self.time_zone);
        self.schedule.after(&local).next().map(|dt| dt.with_timezone(&Utc))
    }

    pub fn may_fire_again(&self) -> bool {
        true
    }
}

#[derive(Serialize, Deserialize)]
struct CronTriggerData {
    expression: String,
    time_zone: Tz,
}

impl Serialize for CronTrigger {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        CronTriggerData {
            expression: self.expression.clone(),
            time_zone: self.time_zone,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CronTrigger {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let data = CronTriggerData::deserialize(deserializer)?;
        CronTrigger::new(&data.expression, data.time_zone).map_err(serde::de::Error::custom)
    }
}
