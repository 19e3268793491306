//! Scheduled maintenance plans.

use crate::error::{Result, TechcareError};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// What a maintenance run cleans
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningKind {
    TempFiles,
    BrowserCache,
    Logs,
    Downloads,
    RecycleBin,
}

impl CleaningKind {
    pub const ALL: [CleaningKind; 5] = [
        CleaningKind::TempFiles,
        CleaningKind::BrowserCache,
        CleaningKind::Logs,
        CleaningKind::Downloads,
        CleaningKind::RecycleBin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CleaningKind::TempFiles => "temp_files",
            CleaningKind::BrowserCache => "browser_cache",
            CleaningKind::Logs => "logs",
            CleaningKind::Downloads => "downloads",
            CleaningKind::RecycleBin => "recycle_bin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "temp_files" | "temp" => Some(CleaningKind::TempFiles),
            "browser_cache" | "browser" => Some(CleaningKind::BrowserCache),
            "logs" | "log" => Some(CleaningKind::Logs),
            "downloads" => Some(CleaningKind::Downloads),
            "recycle_bin" | "trash" => Some(CleaningKind::RecycleBin),
            _ => None,
        }
    }
}

impl std::fmt::Display for CleaningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "every", rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly { weekday: Weekday },
    Monthly { day: u32 },
}

fn at(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(time))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

impl Frequency {
    pub fn validate(&self) -> Result<()> {
        match self {
            Frequency::Monthly { day } if !(1..=31).contains(day) => Err(
                TechcareError::validation(format!("day of month must be 1-31, got {}", day)),
            ),
            _ => Ok(()),
        }
    }

    /// First occurrence strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
        let today = after.date_naive();
        let found = match *self {
            Frequency::Daily => (0..=1)
                .map(|offset| at(today + Duration::days(offset), time))
                .find(|t| *t > after),
            Frequency::Weekly { weekday } => (0..=7)
                .map(|offset| today + Duration::days(offset))
                .filter(|d| d.weekday() == weekday)
                .map(|d| at(d, time))
                .find(|t| *t > after),
            Frequency::Monthly { day } => (0..=2)
                .filter_map(|offset| {
                    let month0 = today.month0() + offset;
                    let year = today.year() + (month0 / 12) as i32;
                    let month = month0 % 12 + 1;
                    let day = day.clamp(1, days_in_month(year, month));
                    NaiveDate::from_ymd_opt(year, month, day)
                })
                .map(|d| at(d, time))
                .find(|t| *t > after),
        };
        found.unwrap_or_else(|| after + Duration::days(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenancePlan {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub cleaning: Vec<CleaningKind>,
    pub frequency: Frequency,
    pub time: NaiveTime,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User-editable part of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDraft {
    pub name: String,
    pub cleaning: Vec<CleaningKind>,
    pub frequency: Frequency,
    pub time: NaiveTime,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl PlanDraft {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TechcareError::validation("plan name must not be empty"));
        }
        if self.cleaning.is_empty() {
            return Err(TechcareError::validation(
                "select at least one cleaning kind",
            ));
        }
        self.frequency.validate()
    }
}

impl MaintenancePlan {
    pub fn create(
        id: String,
        user_id: String,
        draft: PlanDraft,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        draft.validate()?;
        let mut plan = Self {
            id,
            user_id,
            name: draft.name.trim().to_string(),
            cleaning: dedup(draft.cleaning),
            frequency: draft.frequency,
            time: draft.time,
            enabled: draft.enabled,
            last_run: None,
            next_run: None,
            created_at: now,
            updated_at: now,
        };
        plan.reschedule(now);
        Ok(plan)
    }

    pub fn apply(&mut self, draft: PlanDraft, now: DateTime<Utc>) -> Result<()> {
        draft.validate()?;
        self.name = draft.name.trim().to_string();
        self.cleaning = dedup(draft.cleaning);
        self.frequency = draft.frequency;
        self.time = draft.time;
        self.enabled = draft.enabled;
        self.updated_at = now;
        self.reschedule(now);
        Ok(())
    }

    fn reschedule(&mut self, now: DateTime<Utc>) {
        self.next_run = if self.enabled {
            Some(self.frequency.next_after(now, self.time))
        } else {
            None
        };
    }

    pub fn mark_run(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(now);
        self.reschedule(now);
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run.is_some_and(|t| t <= now)
    }
}

fn dedup(mut kinds: Vec<CleaningKind>) -> Vec<CleaningKind> {
    kinds.sort();
    kinds.dedup();
    kinds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn three_am() -> NaiveTime {
        NaiveTime::from_hms_opt(3, 0, 0).unwrap()
    }

    #[test]
    fn test_daily_next() {
        let f = Frequency::Daily;
        assert_eq!(
            f.next_after(utc("2024-05-10T01:00:00Z"), three_am()),
            utc("2024-05-10T03:00:00Z")
        );
        assert_eq!(
            f.next_after(utc("2024-05-10T03:00:00Z"), three_am()),
            utc("2024-05-11T03:00:00Z")
        );
    }

    #[test]
    fn test_weekly_next() {
        // 2024-05-10 is a Friday
        let f = Frequency::Weekly {
            weekday: Weekday::Mon,
        };
        assert_eq!(
            f.next_after(utc("2024-05-10T12:00:00Z"), three_am()),
            utc("2024-05-13T03:00:00Z")
        );
        let f = Frequency::Weekly {
            weekday: Weekday::Fri,
        };
        assert_eq!(
            f.next_after(utc("2024-05-10T12:00:00Z"), three_am()),
            utc("2024-05-17T03:00:00Z")
        );
    }

    #[test]
    fn test_monthly_clamps_short_months() {
        let f = Frequency::Monthly { day: 31 };
        assert_eq!(
            f.next_after(utc("2024-02-01T00:00:00Z"), three_am()),
            utc("2024-02-29T03:00:00Z")
        );
        assert_eq!(
            f.next_after(utc("2024-12-31T04:00:00Z"), three_am()),
            utc("2025-01-31T03:00:00Z")
        );
    }

    #[test]
    fn test_validation() {
        let draft = PlanDraft {
            name: " ".into(),
            cleaning: vec![CleaningKind::Logs],
            frequency: Frequency::Daily,
            time: three_am(),
            enabled: true,
        };
        assert!(draft.validate().is_err());
        let draft = PlanDraft {
            name: "nightly".into(),
            cleaning: vec![],
            ..draft
        };
        assert!(draft.validate().is_err());
        assert!(Frequency::Monthly { day: 0 }.validate().is_err());
    }

    #[test]
    fn test_mark_run_reschedules() {
        let now = utc("2024-05-10T01:00:00Z");
        let draft = PlanDraft {
            name: "nightly".into(),
            cleaning: vec![CleaningKind::TempFiles, CleaningKind::TempFiles],
            frequency: Frequency::Daily,
            time: three_am(),
            enabled: true,
        };
        let mut plan = MaintenancePlan::create("m1".into(), "u1".into(), draft, now).unwrap();
        assert_eq!(plan.cleaning.len(), 1);
        assert!(!plan.is_due(now));
        let later = utc("2024-05-10T03:30:00Z");
        assert!(plan.is_due(later));
        plan.mark_run(later);
        assert_eq!(plan.last_run, Some(later));
        assert_eq!(plan.next_run, Some(utc("2024-05-11T03:00:00Z")));
    }
}
