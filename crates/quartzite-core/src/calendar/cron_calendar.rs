//! Excludes every instant matching a six-field cron expression.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use super::{BaseCalendar, Calendar};

#[derive(Debug, Clone)]
pub struct CronCalendar {
    expression: String,
    schedule: Schedule,
    base: Option<BaseCalendar>,
}

impl CronCalendar {
    pub fn new(expression: &str) -> crate::error::Result<Self> {
        let schedule =
            Schedule::from_str(expression).map_err(|source| crate::error::SchedulerError::InvalidCronExpression {
                expr: expression.to_string(),
                source,
            })?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
            base: None,
        })
    }

    pub fn with_base(mut self, base: BaseCalendar) -> Self {
        self.base = Some(base);
        self
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether `instant` is itself a scheduled fire time for the expression.
    fn matches(&self, instant: DateTime<Utc>) -> bool {
        self.schedule
            .after(&(instant - chrono::Duration::seconds(1)))
            .next()
            .map(|next| next == instant)
            .unwrap_or(false)
    }
}

impl Calendar for CronCalendar {
    fn time_included_self(&self, instant: DateTime<Utc>) -> bool {
        !self.matches(instant)
    }

    fn next_included_self(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let mut candidate = after;
        for _ in 0..10_000 {
            if !self.matches(candidate) {
                return candidate;
            }
            candidate += chrono::Duration::seconds(1);
        }
        candidate
    }

    fn base(&self) -> Option<&dyn Calendar> {
        self.base.as_deref()
    }
}
