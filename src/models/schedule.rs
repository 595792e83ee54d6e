// src/models/schedule.rs

//! Schedule records and the date-keyed schedule they are grouped into.

use std::fmt;

use chrono::NaiveDate;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::entity::int_id;

/// A single class session.
///
/// Two records are the same session only when all five fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleRecord {
    /// Lesson slot number
    #[serde(deserialize_with = "int_id")]
    pub id: i64,

    /// Discipline name
    pub name: String,

    /// Room, when the upstream shows one
    pub auditorium: Option<String>,

    /// Lecture, practice, lab...
    pub discipline_type: Option<String>,

    pub teacher_name: Option<String>,
}

/// Class sessions grouped by date, in the order the dates first appear.
///
/// Dates are kept as the upstream `D.M.YYYY` strings. Records of one date are
/// unique and sorted by ascending `id` once the decoder has finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    days: Vec<(String, Vec<ScheduleRecord>)>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records for `date`, creating an empty day if it is not present yet.
    pub(crate) fn day_mut(&mut self, date: &str) -> &mut Vec<ScheduleRecord> {
        let index = match self.days.iter().position(|(d, _)| d == date) {
            Some(index) => index,
            None => {
                self.days.push((date.to_string(), Vec::new()));
                self.days.len() - 1
            }
        };
        &mut self.days[index].1
    }

    /// Add a record unless an identical one is already filed under `date`.
    ///
    /// Returns `true` when the record was new.
    pub fn insert(&mut self, date: &str, record: ScheduleRecord) -> bool {
        let day = self.day_mut(date);
        if day.contains(&record) {
            return false;
        }
        day.push(record);
        true
    }

    /// Stable-sort every day by record id.
    pub fn sort_records(&mut self) {
        for (_, records) in &mut self.days {
            records.sort_by_key(|r| r.id);
        }
    }

    pub fn get(&self, date: &str) -> Option<&[ScheduleRecord]> {
        self.days
            .iter()
            .find(|(d, _)| d == date)
            .map(|(_, records)| records.as_slice())
    }

    /// Records for a calendar date.
    pub fn on(&self, date: NaiveDate) -> Option<&[ScheduleRecord]> {
        self.days
            .iter()
            .find(|(d, _)| parse_date_key(d) == Some(date))
            .map(|(_, records)| records.as_slice())
    }

    /// Days whose date falls within `from..=to`. Either bound may be open.
    ///
    /// With both bounds open every day is kept, including keys that are not
    /// calendar dates.
    pub fn between(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Schedule {
        if from.is_none() && to.is_none() {
            return self.clone();
        }
        let days = self
            .days
            .iter()
            .filter(|(d, _)| match parse_date_key(d) {
                Some(date) => from.is_none_or(|f| date >= f) && to.is_none_or(|t| date <= t),
                None => false,
            })
            .cloned()
            .collect();
        Schedule { days }
    }

    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.days.iter().map(|(d, _)| d.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ScheduleRecord])> {
        self.days.iter().map(|(d, r)| (d.as_str(), r.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Total number of records across all days.
    pub fn record_count(&self) -> usize {
        self.days.iter().map(|(_, r)| r.len()).sum()
    }
}

/// Parse an upstream `D.M.YYYY` date key.
pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%d.%m.%Y").ok()
}

impl Serialize for Schedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.days.len()))?;
        for (date, records) in &self.days {
            map.serialize_entry(date, records)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Schedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ScheduleVisitor;

        impl<'de> Visitor<'de> for ScheduleVisitor {
            type Value = Schedule;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from date to schedule records")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Schedule, A::Error> {
                let mut days = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((date, records)) =
                    access.next_entry::<String, Vec<ScheduleRecord>>()?
                {
                    days.push((date, records));
                }
                Ok(Schedule { days })
            }
        }

        deserializer.deserialize_map(ScheduleVisitor)
    }
}
