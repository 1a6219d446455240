//! Slot tracking for the polling loop
//!
//! The loop wakes once per tick, so a configured time is rarely hit exactly.
//! A slot instant is due while `slot <= now < slot + tick` and it is later
//! than the last slot that fired:
//!
//! ```text
//! 07:00 slot, 10 min tick
//!   06:58 → not yet
//!   07:04 → fires, marker = today 07:00
//!   07:09 → already fired
//!   07:14 → window closed
//! ```
//!
//! When one tick covers several slots (slots closer together than the tick),
//! a single trigger fires for the latest of them and the marker moves past
//! all of them. Yesterday's slots are considered too, so a window crossing
//! midnight still fires.

use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, NaiveTime, TimeDelta};
use tracing::{debug, trace};

use crate::config::{Config, ReportSlot};

/// Last slot instants that fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleState {
    last_extraction: Option<NaiveDateTime>,
    last_report: Option<NaiveDateTime>,
}

impl ScheduleState {
    pub fn last_extraction(&self) -> Option<NaiveDateTime> {
        self.last_extraction
    }

    pub fn last_report(&self) -> Option<NaiveDateTime> {
        self.last_report
    }
}

#[derive(Debug, Clone)]
pub struct Schedule {
    extraction_times: Vec<NaiveTime>,
    reports: Vec<ReportSlot>,
    window: TimeDelta,
}

impl Schedule {
    /// Windows are capped at one day.
    pub fn new(extraction_times: Vec<NaiveTime>, reports: Vec<ReportSlot>, tick: Duration) -> Self {
        let max_window = TimeDelta::days(1);
        let window = TimeDelta::from_std(tick)
            .unwrap_or(max_window)
            .min(max_window);

        Self {
            extraction_times,
            reports,
            window,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.extraction_times.clone(),
            config.reports.clone(),
            config.tick_interval(),
        )
    }

    /// Returns the extraction slot to run now, if any, and marks it fired.
    pub fn poll_extraction(
        &self,
        now: NaiveDateTime,
        state: &mut ScheduleState,
    ) -> Option<NaiveDateTime> {
        let candidates = candidate_days(now).flat_map(|day| {
            self.extraction_times
                .iter()
                .map(move |time| day.and_time(*time))
        });

        let slot = self.latest_due(candidates, now, state.last_extraction)?;
        debug!("extraction slot {slot} is due");
        state.last_extraction = Some(slot);
        Some(slot)
    }

    /// Returns the report slot to trigger now, if any, and marks it fired.
    pub fn poll_report(
        &self,
        now: NaiveDateTime,
        state: &mut ScheduleState,
    ) -> Option<NaiveDateTime> {
        let candidates = candidate_days(now).flat_map(|day| {
            self.reports
                .iter()
                .filter(move |slot| day.weekday() == slot.weekday)
                .map(move |slot| day.and_time(slot.time))
        });

        let slot = self.latest_due(candidates, now, state.last_report)?;
        debug!("report slot {slot} is due");
        state.last_report = Some(slot);
        Some(slot)
    }

    fn latest_due(
        &self,
        candidates: impl Iterator<Item = NaiveDateTime>,
        now: NaiveDateTime,
        last_fired: Option<NaiveDateTime>,
    ) -> Option<NaiveDateTime> {
        let due: Vec<NaiveDateTime> = candidates
            .filter(|slot| *slot <= now && now < *slot + self.window)
            .filter(|slot| last_fired.is_none_or(|last| *slot > last))
            .collect();

        if due.len() > 1 {
            trace!("{} slots due in one tick, firing once", due.len());
        }

        due.into_iter().max()
    }
}

fn candidate_days(now: NaiveDateTime) -> impl Iterator<Item = chrono::NaiveDate> {
    let today = now.date();
    today.pred_opt().into_iter().chain(std::iter::once(today))
}
