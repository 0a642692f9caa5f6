//! Triggers: shared state plus four schedule kinds (spec §3 "Trigger
//! variants").

mod calendar_interval;
mod cron;
mod daily_time_interval;
mod simple;

pub use calendar_interval::{CalendarIntervalTrigger, IntervalUnit};
pub use cron::CronTrigger;
pub use daily_time_interval::DailyTimeIntervalTrigger;
pub use simple::{SimpleTrigger, REPEAT_INDEFINITELY};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::JobDataMap;
use crate::key::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerState {
    Waiting,
    Acquired,
    Executing,
    Paused,
    PausedBlocked,
    Blocked,
    Complete,
    Error,
}

/// Configured misfire handling. `SmartPolicy` is resolved per trigger kind by
/// [`Trigger::apply_misfire_policy`] (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MisfireInstruction {
    #[default]
    SmartPolicy,
    FireOnceNow,
    FireNow,
    DoNothing,
    IgnoreMisfirePolicy,
    RescheduleNextWithRemainingCount,
    RescheduleNowWithExistingRepeatCount,
    RescheduleNowWithRemainingRepeatCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionInstruction {
    NoOp,
    DeleteTrigger,
    SetTriggerComplete,
    SetTriggerError,
    SetAllJobTriggersComplete,
    SetAllJobTriggersError,
    ReExecuteJob,
}

/// Kind-specific next-fire-time algorithm, dispatched from [`Trigger`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TriggerSchedule {
    Simple(SimpleTrigger),
    Cron(CronTrigger),
    CalendarInterval(CalendarIntervalTrigger),
    DailyTimeInterval(DailyTimeIntervalTrigger),
}

impl TriggerSchedule {
    fn compute_first_fire_time(&self, start_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TriggerSchedule::Simple(s) => s.compute_first_fire_time(start_time),
            TriggerSchedule::Cron(c) => c.compute_first_fire_time(start_time),
            TriggerSchedule::CalendarInterval(c) => c.compute_first_fire_time(start_time),
            TriggerSchedule::DailyTimeInterval(d) => d.compute_first_fire_time(start_time),
        }
    }

    /// Used by the store to skip fire times a named calendar excludes (spec
    /// §3 "chained calendars intersect").
    pub(crate) fn next_fire_time(&self, previous_fire_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TriggerSchedule::Simple(s) => s.next_fire_time(previous_fire_time),
            TriggerSchedule::Cron(c) => c.next_fire_time(previous_fire_time),
            TriggerSchedule::CalendarInterval(c) => c.next_fire_time(previous_fire_time),
            TriggerSchedule::DailyTimeInterval(d) => d.next_fire_time(previous_fire_time),
        }
    }

    fn may_fire_again(&self) -> bool {
        match self {
            TriggerSchedule::Simple(s) => s.may_fire_again(),
            TriggerSchedule::Cron(c) => c.may_fire_again(),
            TriggerSchedule::CalendarInterval(c) => c.may_fire_again(),
            TriggerSchedule::DailyTimeInterval(d) => d.may_fire_again(),
        }
    }

    fn record_fire(&mut self) {
        if let TriggerSchedule::Simple(s) = self {
            s.record_fire();
        }
    }
}

/// A stored trigger: identity, bounds, fire-time bookkeeping, and its
/// kind-specific schedule (spec §3 `Trigger (abstract)`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub key: Key,
    pub job_key: Key,
    pub description: Option<String>,
    pub calendar_name: Option<String>,
    pub priority: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub misfire_instruction: MisfireInstruction,
    pub next_fire_time: Option<DateTime<Utc>>,
    pub previous_fire_time: Option<DateTime<Utc>>,
    pub data: JobDataMap,
    pub state: TriggerState,
    pub schedule: TriggerSchedule,
}

const DEFAULT_PRIORITY: i32 = 5;

impl Trigger {
    pub fn new(key: Key, job_key: Key, schedule: TriggerSchedule) -> Self {
        let start_time = Utc::now();
        let mut trigger = Self {
            key,
            job_key,
            description: None,
            calendar_name: None,
            priority: DEFAULT_PRIORITY,
            start_time,
            end_time: None,
            misfire_instruction: MisfireInstruction::default(),
            next_fire_time: None,
            previous_fire_time: None,
            data: JobDataMap::default(),
            state: TriggerState::Waiting,
            schedule,
        };
        trigger.next_fire_time = trigger.clip(trigger.schedule.compute_first_fire_time(trigger.start_time));
        trigger
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self.next_fire_time = self.clip(self.schedule.compute_first_fire_time(start_time));
        self
    }

    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self.next_fire_time = self.clip(self.next_fire_time);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_calendar_name(mut self, name: impl Into<String>) -> Self {
        self.calendar_name = Some(name.into());
        self
    }

    pub fn with_misfire_instruction(mut self, instruction: MisfireInstruction) -> Self {
        self.misfire_instruction = instruction;
        self
    }

    pub fn with_data(mut self, data: JobDataMap) -> Self {
        self.data = data;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn clip(&self, candidate: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        match (candidate, self.end_time) {
            (Some(c), Some(end)) if c > end => None,
            (c, _) => c,
        }
    }

    pub fn may_fire_again(&self) -> bool {
        self.schedule.may_fire_again()
    }

    /// Advance past a fire: `previousFireTime` takes the old `nextFireTime`,
    /// and a fresh one is computed (and clipped to `endTime`). Transitions to
    /// `Complete` if there is no next fire.
    pub fn advance(&mut self) {
        if let Some(fired_at) = self.next_fire_time {
            self.previous_fire_time = Some(fired_at);
            self.schedule.record_fire();
            let next = self.schedule.next_fire_time(fired_at);
            self.next_fire_time = self.clip(next);
            if self.next_fire_time.is_none() {
                self.state = TriggerState::Complete;
            }
        }
    }

    /// Whether this trigger's scheduled fire time has passed the misfire
    /// threshold (spec §4.3).
    pub fn is_misfired(&self, now: DateTime<Utc>, misfire_threshold: chrono::Duration) -> bool {
        self.next_fire_time.is_some_and(|t| now - t > misfire_threshold)
    }

    /// Apply the configured (or smart-resolved) misfire instruction,
    /// producing a new `nextFireTime` per spec §4.3.
    pub fn apply_misfire_policy(&mut self, now: DateTime<Utc>) {
        let resolved = self.resolve_misfire_instruction();
        match resolved {
            MisfireInstruction::FireOnceNow
            | MisfireInstruction::FireNow
            | MisfireInstruction::RescheduleNextWithRemainingCount
            | MisfireInstruction::RescheduleNowWithExistingRepeatCount
            | MisfireInstruction::RescheduleNowWithRemainingRepeatCount => {
                self.next_fire_time = Some(now);
            }
            MisfireInstruction::DoNothing => {
                let mut candidate = self.next_fire_time;
                while let Some(c) = candidate {
                    if c > now {
                        break;
                    }
                    candidate = self.schedule.next_fire_time(c);
                }
                self.next_fire_time = self.clip(candidate);
            }
            MisfireInstruction::IgnoreMisfirePolicy => {
                // Leave `nextFireTime` as-is: the stale instant fires as-is
                // and the scheduler thread catches up one instant per loop.
            }
            MisfireInstruction::SmartPolicy => unreachable!("resolved above"),
        }
    }

    fn resolve_misfire_instruction(&self) -> MisfireInstruction {
        if self.misfire_instruction != MisfireInstruction::SmartPolicy {
            return self.misfire_instruction;
        }
        match &self.schedule {
            TriggerSchedule::Simple(s) => {
                if s.repeat_count_is_infinite() {
                    MisfireInstruction::RescheduleNextWithRemainingCount
                } else if s.times_triggered() == 0 {
                    MisfireInstruction::FireNow
                } else {
                    MisfireInstruction::RescheduleNowWithExistingRepeatCount
                }
            }
            _ => MisfireInstruction::FireOnceNow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn simple_trigger() -> Trigger {
        Trigger::new(
            Key::new("t1"),
            Key::new("j1"),
            TriggerSchedule::Simple(SimpleTrigger::repeat_forever(1_000)),
        )
    }

    #[test]
    fn first_fire_time_equals_start_time() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let trigger = simple_trigger().with_start_time(start);
        assert_eq!(trigger.next_fire_time, Some(start));
    }

    #[test]
    fn advance_moves_previous_and_next_fire_time() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut trigger = simple_trigger().with_start_time(start);
        trigger.advance();
        assert_eq!(trigger.previous_fire_time, Some(start));
        assert_eq!(trigger.next_fire_time, Some(start + chrono::Duration::seconds(1)));
    }

    #[test]
    fn smart_policy_resolves_to_fire_once_now_for_cron() {
        let cron = CronTrigger::utc("0 0 12 * * ?").expect("valid");
        let trigger = Trigger::new(Key::new("t2"), Key::new("j1"), TriggerSchedule::Cron(cron));
        assert_eq!(trigger.resolve_misfire_instruction(), MisfireInstruction::FireOnceNow);
    }

    #[test]
    fn end_time_clips_next_fire_time_to_none() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = start - chrono::Duration::milliseconds(1);
        let trigger = simple_trigger().with_start_time(start).with_end_time(end);
        assert!(trigger.next_fire_time.is_none());
    }
}
