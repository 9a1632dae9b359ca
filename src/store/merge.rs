use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::warn;

use crate::common::types::{DrawRecord, DrawRow};

/// Merged dataset plus what changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Newest draw first, one row per date
    pub dataset: Vec<DrawRow>,
    /// Fresh draws whose date was not stored before
    pub new_rows: usize,
    /// Fresh draws that overwrote a stored row for the same date
    pub updated_rows: usize,
    /// Stored rows dropped because their date could not be read
    pub dropped_rows: usize,
}

impl MergeOutcome {
    /// Whether the store needs rewriting
    pub fn has_changes(&self) -> bool {
        self.new_rows > 0 || self.updated_rows > 0
    }
}

/// Union `existing` with `fresh`, one row per draw date, fresh rows winning.
///
/// With no fresh records the existing rows come back untouched, in their
/// stored order. Otherwise the result is sorted newest first and rows whose
/// date does not parse are left out.
pub fn merge(existing: Vec<DrawRow>, fresh: &[DrawRecord]) -> MergeOutcome {
    if fresh.is_empty() {
        return MergeOutcome {
            dataset: existing,
            new_rows: 0,
            updated_rows: 0,
            dropped_rows: 0,
        };
    }

    let mut by_date: BTreeMap<NaiveDate, DrawRow> = BTreeMap::new();
    let mut dropped_rows = 0;
    for row in existing {
        match row.parsed_date() {
            // later duplicates in the stored table replace earlier ones
            Some(date) => {
                by_date.insert(date, row);
            }
            None => {
                warn!("Dropping stored row with unreadable draw date {:?}", row.draw_date);
                dropped_rows += 1;
            }
        }
    }

    let mut new_rows = 0;
    let mut updated_rows = 0;
    for record in fresh {
        match by_date.insert(record.draw_date, record.to_row()) {
            Some(_) => updated_rows += 1,
            None => new_rows += 1,
        }
    }

    MergeOutcome {
        dataset: by_date.into_values().rev().collect(),
        new_rows,
        updated_rows,
        dropped_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(y: i32, m: u32, d: u32, first_ball: &str) -> DrawRecord {
        DrawRecord {
            draw_date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            white_balls: [first_ball, "20", "30", "40", "50"].map(String::from),
            special_ball: "7".into(),
            jackpot: "$20 Million".into(),
        }
    }

    fn stored() -> Vec<DrawRow> {
        vec![
            record(2025, 3, 15, "1").to_row(),
            record(2025, 3, 19, "2").to_row(),
            record(2025, 3, 12, "3").to_row(),
        ]
    }

    #[test]
    fn test_merge_with_nothing_fresh_is_identity() {
        let outcome = merge(stored(), &[]);
        assert_eq!(outcome.dataset, stored());
        assert_eq!(outcome.new_rows, 0);
        assert!(!outcome.has_changes());
    }

    #[test]
    fn test_fresh_record_overwrites_same_date() {
        let fresh = record(2025, 3, 19, "9");
        let outcome = merge(stored(), &[fresh.clone()]);

        assert_eq!(outcome.dataset.len(), 3);
        assert_eq!(outcome.new_rows, 0);
        assert_eq!(outcome.updated_rows, 1);
        let row = outcome.dataset.iter().find(|r| r.draw_date == "03/19/2025").unwrap();
        assert_eq!(row, &fresh.to_row());
    }

    #[test]
    fn test_merge_sorts_newest_first() {
        let outcome = merge(stored(), &[record(2025, 3, 22, "4"), record(2025, 1, 1, "5")]);

        assert_eq!(outcome.new_rows, 2);
        let dates: Vec<NaiveDate> = outcome.dataset.iter().filter_map(DrawRow::parsed_date).collect();
        assert_eq!(dates.len(), 5);
        assert!(dates.windows(2).all(|pair| pair[0] >= pair[1]));
        assert_eq!(outcome.dataset[0].draw_date, "03/22/2025");
    }

    #[test]
    fn test_unreadable_and_duplicate_stored_rows() {
        let mut rows = stored();
        rows.push(DrawRow {
            draw_date: "".into(),
            ..DrawRow::default()
        });
        rows.push(DrawRow {
            draw_date: "not a date".into(),
            ..DrawRow::default()
        });
        rows.push(record(2025, 3, 15, "8").to_row());

        let outcome = merge(rows, &[record(2025, 3, 22, "4")]);

        assert_eq!(outcome.dropped_rows, 2);
        assert_eq!(outcome.dataset.len(), 4);
        let row = outcome.dataset.iter().find(|r| r.draw_date == "03/15/2025").unwrap();
        assert!(row.white_balls.starts_with("8 "));
    }

    #[test]
    fn test_merge_into_empty_store() {
        let outcome = merge(Vec::new(), &[record(2025, 3, 19, "1")]);
        assert_eq!(outcome.dataset, vec![record(2025, 3, 19, "1").to_row()]);
        assert_eq!(outcome.new_rows, 1);
    }
}
