//! Recurrence settings
//!
//! The engine has no wall-clock timer of its own. An external trigger asks
//! [`Schedule::next_run_after`] when the job is due and calls `start` then.

use crate::ConfigError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleFrequency {
    Hourly,
    #[default]
    Daily,
    Weekly,
    Monthly,
}

/// Recurrence of a job, evaluated in UTC
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub frequency: ScheduleFrequency,
    /// 0-23, ignored for hourly schedules
    #[serde(default)]
    pub hour: u32,
    /// 0-59
    #[serde(default)]
    pub minute: u32,
    /// 0 = Sunday .. 6 = Saturday, weekly only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u32>,
    /// 1-31, monthly only; clamped to the month's last day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u32>,
}

impl Schedule {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hour > 23 {
            return Err(ConfigError::Validation(format!(
                "schedule hour must be 0-23, got {}",
                self.hour
            )));
        }
        if self.minute > 59 {
            return Err(ConfigError::Validation(format!(
                "schedule minute must be 0-59, got {}",
                self.minute
            )));
        }
        if let Some(day) = self.day_of_week {
            if day > 6 {
                return Err(ConfigError::Validation(format!(
                    "schedule dayOfWeek must be 0-6, got {}",
                    day
                )));
            }
        }
        if let Some(day) = self.day_of_month {
            if !(1..=31).contains(&day) {
                return Err(ConfigError::Validation(format!(
                    "schedule dayOfMonth must be 1-31, got {}",
                    day
                )));
            }
        }
        Ok(())
    }

    /// Next run time strictly after `now`
    ///
    /// Returns None when the schedule is disabled or its fields are out of range.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.enabled || self.validate().is_err() {
            return None;
        }

        match self.frequency {
            ScheduleFrequency::Hourly => {
                let candidate = at(now.date_naive(), now.hour(), self.minute)?;
                Some(if candidate > now {
                    candidate
                } else {
                    candidate + Duration::hours(1)
                })
            }
            ScheduleFrequency::Daily => {
                let candidate = at(now.date_naive(), self.hour, self.minute)?;
                Some(if candidate > now {
                    candidate
                } else {
                    candidate + Duration::days(1)
                })
            }
            ScheduleFrequency::Weekly => {
                let target = self.day_of_week.unwrap_or(0);
                let today = now.weekday().num_days_from_sunday();
                let days_ahead = (target + 7 - today) % 7;
                let date = now.date_naive() + Duration::days(i64::from(days_ahead));
                let candidate = at(date, self.hour, self.minute)?;
                Some(if candidate > now {
                    candidate
                } else {
                    candidate + Duration::weeks(1)
                })
            }
            ScheduleFrequency::Monthly => {
                let day = self.day_of_month.unwrap_or(1);
                let (mut year, mut month) = (now.year(), now.month());
                // At most one month ahead is ever needed; loop bound is slack
                for _ in 0..3 {
                    let clamped = day.min(days_in_month(year, month)?);
                    let date = NaiveDate::from_ymd_opt(year, month, clamped)?;
                    let candidate = at(date, self.hour, self.minute)?;
                    if candidate > now {
                        return Some(candidate);
                    }
                    (year, month) = if month == 12 {
                        (year + 1, 1)
                    } else {
                        (year, month + 1)
                    };
                }
                None
            }
        }
    }
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    Some(first_of_next.pred_opt()?.day())
}
