use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;

use crate::error::TrackerError;
use crate::process::extract::ParsedRecord;
use crate::process::normalize::NormalizedRecord;
use crate::process::utils::{display_date, elapsed_days, midnight_utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Milestone {
    Aor,
    Bil,
    Medical,
    Pal,
    Fd,
    P1,
    P2,
    Ppr,
    Ecopr,
}

/// Raw column keys for each milestone, tried in order.
pub const MILESTONE_ALIASES: &[(Milestone, &[&str])] = &[
    (Milestone::Aor, &["aor", "col_5"]),
    (Milestone::Bil, &["bil", "col_6"]),
    (Milestone::Medical, &["medical", "mp", "medical_date_outland", "col_9"]),
    (Milestone::Pal, &["pal", "pre_arrival", "col_13"]),
    (Milestone::Fd, &["fd", "final_decision", "final", "col_14"]),
    (Milestone::P1, &["p1", "portal1", "col_15"]),
    (Milestone::P2, &["p2", "portal2", "col_16"]),
    (Milestone::Ppr, &["ppr", "passport_request", "rfv", "col_17"]),
    (Milestone::Ecopr, &["ecopr", "copr", "col_18"]),
];

pub const PIPELINE: [Milestone; 9] = [
    Milestone::Aor,
    Milestone::Bil,
    Milestone::Medical,
    Milestone::Pal,
    Milestone::Fd,
    Milestone::P1,
    Milestone::P2,
    Milestone::Ppr,
    Milestone::Ecopr,
];

/// Furthest milestone first. PAL itself is the floor.
const LAST_REACHED: [Milestone; 6] = [
    Milestone::Ecopr,
    Milestone::Ppr,
    Milestone::P2,
    Milestone::P1,
    Milestone::Fd,
    Milestone::Pal,
];

impl Milestone {
    pub fn aliases(self) -> &'static [&'static str] {
        MILESTONE_ALIASES
            .iter()
            .find(|(m, _)| *m == self)
            .map(|(_, keys)| *keys)
            .unwrap_or(&[])
    }

    pub fn label(self) -> &'static str {
        match self {
            Milestone::Aor => "AOR",
            Milestone::Bil => "BIL",
            Milestone::Medical => "Medical",
            Milestone::Pal => "PAL",
            Milestone::Fd => "FD",
            Milestone::P1 => "P1",
            Milestone::P2 => "P2",
            Milestone::Ppr => "PPR",
            Milestone::Ecopr => "eCOPR",
        }
    }

    /// First alias holding a usable display date.
    pub fn resolve(self, raw: &ParsedRecord) -> Option<NaiveDate> {
        self.aliases()
            .iter()
            .find_map(|key| display_date(raw.get(key)))
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Trailing window for stage statistics, in 30-day months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationWindow {
    OneMonth,
    TwoMonths,
    #[default]
    ThreeMonths,
}

impl DurationWindow {
    pub fn months(self) -> i64 {
        match self {
            DurationWindow::OneMonth => 1,
            DurationWindow::TwoMonths => 2,
            DurationWindow::ThreeMonths => 3,
        }
    }

    pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(30 * self.months())
    }
}

impl TryFrom<u32> for DurationWindow {
    type Error = TrackerError;

    fn try_from(months: u32) -> Result<Self, Self::Error> {
        match months {
            1 => Ok(DurationWindow::OneMonth),
            2 => Ok(DurationWindow::TwoMonths),
            3 => Ok(DurationWindow::ThreeMonths),
            other => Err(TrackerError::Config(format!(
                "duration window must be 1, 2 or 3 months, got {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDuration {
    pub label: String,
    pub from: Milestone,
    pub to: Milestone,
    pub avg_days: Option<f64>,
    pub count: usize,
}

#[derive(Default, Clone, Copy)]
struct Tally {
    total: i64,
    count: usize,
}

/// Average days spent between each adjacent pair of milestones, over records
/// that reached PAL and whose furthest milestone falls inside `window`.
pub fn stage_durations(
    records: &[NormalizedRecord],
    window: DurationWindow,
    now: DateTime<Utc>,
) -> Vec<StageDuration> {
    let start = window.start(now);
    let mut tallies = [Tally::default(); PIPELINE.len() - 1];

    for record in records {
        let raw = &record.raw;
        let Some(pal) = Milestone::Pal.resolve(raw) else {
            continue;
        };
        let last = LAST_REACHED
            .iter()
            .find_map(|m| m.resolve(raw))
            .unwrap_or(pal);
        if midnight_utc(last) < start {
            continue;
        }

        let dates: Vec<Option<NaiveDate>> = PIPELINE.iter().map(|m| m.resolve(raw)).collect();
        for (tally, pair) in tallies.iter_mut().zip(dates.windows(2)) {
            if let (Some(from), Some(to)) = (pair[0], pair[1]) {
                tally.total += elapsed_days(from, to);
                tally.count += 1;
            }
        }
    }

    PIPELINE
        .windows(2)
        .zip(tallies)
        .map(|(pair, tally)| StageDuration {
            label: format!("{} → {}", pair[0], pair[1]),
            from: pair[0],
            to: pair[1],
            avg_days: (tally.count > 0).then(|| tally.total as f64 / tally.count as f64),
            count: tally.count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::fixtures::{day, now, rec};

    fn stage<'a>(stats: &'a [StageDuration], from: Milestone) -> &'a StageDuration {
        stats.iter().find(|s| s.from == from).unwrap()
    }

    #[test]
    fn every_adjacent_pair_is_reported() {
        let stats = stage_durations(&[], DurationWindow::default(), now());
        assert_eq!(stats.len(), 8);
        assert_eq!(stats[0].label, "AOR → BIL");
        assert_eq!(stats[7].label, "PPR → eCOPR");
        assert!(stats.iter().all(|s| s.avg_days.is_none() && s.count == 0));
    }

    #[test]
    fn averages_over_resolved_pairs() {
        let records = vec![
            rec(None, &[("aor", "2025-03-01"), ("bil", "2025-03-11"), ("pal", "2025-05-01"), ("fd", "2025-05-21")]),
            rec(None, &[("col_5", "2025-03-01"), ("col_6", "2025-03-21"), ("col_13", "2025-05-10")]),
            rec(None, &[("aor", "2025-03-01"), ("bil", "2025-03-31")]),
        ];
        let stats = stage_durations(&records, DurationWindow::ThreeMonths, now());
        let aor_bil = stage(&stats, Milestone::Aor);
        assert_eq!(aor_bil.count, 2);
        assert_eq!(aor_bil.avg_days, Some(15.0));
        let pal_fd = stage(&stats, Milestone::Pal);
        assert_eq!(pal_fd.count, 1);
        assert_eq!(pal_fd.avg_days, Some(20.0));
        assert_eq!(stage(&stats, Milestone::Bil).count, 0);
    }

    #[test]
    fn backwards_dates_clamp_to_zero() {
        let records = vec![rec(None, &[("pal", "2025-06-01"), ("fd", "2025-05-25")])];
        let stats = stage_durations(&records, DurationWindow::OneMonth, now());
        assert_eq!(stage(&stats, Milestone::Pal).avg_days, Some(0.0));
    }

    #[test]
    fn one_month_window_excludes_stale_records() {
        // now is 2025-06-15; 40 days earlier is 2025-05-06
        let records = vec![rec(None, &[("pal", "2025-04-20"), ("fd", "2025-05-06")])];
        let one = stage_durations(&records, DurationWindow::OneMonth, now());
        assert_eq!(stage(&one, Milestone::Pal).count, 0);
        let three = stage_durations(&records, DurationWindow::ThreeMonths, now());
        assert_eq!(stage(&three, Milestone::Pal).count, 1);
        assert_eq!(stage(&three, Milestone::Pal).avg_days, Some(16.0));
    }

    #[test]
    fn records_without_pal_are_skipped() {
        let records = vec![rec(None, &[("aor", "2025-06-01"), ("bil", "2025-06-05")])];
        let stats = stage_durations(&records, DurationWindow::ThreeMonths, now());
        assert_eq!(stage(&stats, Milestone::Aor).count, 0);
    }

    #[test]
    fn window_parses_from_months() {
        assert_eq!(DurationWindow::try_from(2).unwrap(), DurationWindow::TwoMonths);
        assert!(DurationWindow::try_from(4).is_err());
        assert_eq!(DurationWindow::OneMonth.start(now()).date_naive(), day("2025-05-16"));
    }
}
