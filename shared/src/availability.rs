use crate::rules::RuleViolation;
use crate::status::BookingStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RuleViolation> {
        if end < start {
            return Err(RuleViolation::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    pub fn contains(&self, other: &DateRange) -> bool {
        self.start <= other.start && self.end >= other.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapType {
    /// The existing booking covers the whole requested range.
    Full,
    Partial,
}

pub fn classify_overlap(requested: &DateRange, existing: &DateRange) -> Option<OverlapType> {
    if !requested.overlaps(existing) {
        return None;
    }
    if existing.contains(requested) {
        Some(OverlapType::Full)
    } else {
        Some(OverlapType::Partial)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub booking: String,
    pub customer: String,
    pub rental_start: NaiveDate,
    pub rental_end: NaiveDate,
    pub status: BookingStatus,
    pub overlap_type: OverlapType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub vehicle: String,
    pub available: bool,
    pub conflicts: Vec<Conflict>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::new(
            NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap(),
            NaiveDate::parse_from_str(end, "%Y-%m-%d").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn overlap_is_partial_full_or_absent() {
        let booked = range("2025-07-01", "2025-07-05");
        assert_eq!(
            classify_overlap(&range("2025-07-04", "2025-07-10"), &booked),
            Some(OverlapType::Partial)
        );
        assert_eq!(
            classify_overlap(&range("2025-07-02", "2025-07-03"), &booked),
            Some(OverlapType::Full)
        );
        assert_eq!(classify_overlap(&range("2025-07-06", "2025-07-10"), &booked), None);
    }

    #[test]
    fn touching_ranges_overlap() {
        let booked = range("2025-07-01", "2025-07-05");
        assert_eq!(
            classify_overlap(&range("2025-07-05", "2025-07-08"), &booked),
            Some(OverlapType::Partial)
        );
    }

    #[test]
    fn request_covering_booking_is_partial() {
        let booked = range("2025-07-02", "2025-07-03");
        assert_eq!(
            classify_overlap(&range("2025-07-01", "2025-07-05"), &booked),
            Some(OverlapType::Partial)
        );
    }

    #[test]
    fn inverted_range_is_rejected() {
        let start = NaiveDate::from_ymd_opt(2025, 7, 5).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert!(DateRange::new(start, end).is_err());
    }
}
