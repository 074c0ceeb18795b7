use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    preference::PreferenceMap,
    session::{Category, Session},
};
use crate::{config::SolverConfig, error::TimetableError};

/// period number that turns a night block into a 3-hour block
const LAST_NIGHT_PERIOD: u32 = 5;

/// a slot label like `M1_M2` or `N3_N4_N5`: contiguous period codes joined by `_`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotLabel {
    label: String,
    periods: Vec<String>,
}

impl SlotLabel {
    pub fn parse(label: &str) -> Result<Self, TimetableError> {
        let periods: Vec<String> = label.split('_').map(String::from).collect();

        let well_formed = periods.iter().all(|code| {
            let mut chars = code.chars();
            match chars.next() {
                Some(shift) if shift.is_ascii_alphabetic() => {
                    let number = chars.as_str();
                    !number.is_empty() && number.chars().all(|c| c.is_ascii_digit())
                }
                _ => false,
            }
        });
        if !well_formed {
            return Err(TimetableError::InvalidSlotLabel(label.to_string()));
        }

        // a block must not mix night and day periods
        let night_codes = periods.iter().filter(|code| code.starts_with('N')).count();
        if night_codes != 0 && night_codes != periods.len() {
            return Err(TimetableError::InvalidSlotLabel(label.to_string()));
        }

        Ok(Self {
            label: label.to_string(),
            periods,
        })
    }

    #[inline]
    pub fn is_night(&self) -> bool {
        self.periods[0].starts_with('N')
    }

    #[inline]
    pub fn category(&self) -> Category {
        if self.is_night() {
            Category::Night
        } else {
            Category::Day
        }
    }

    /// hours a session must last to fit this slot
    pub fn implied_duration(&self) -> u32 {
        let ends_in_last_night_period = self
            .periods
            .last()
            .and_then(|code| code[1..].parse::<u32>().ok())
            .map_or(false, |number| number == LAST_NIGHT_PERIOD);

        if self.is_night() && ends_in_last_night_period {
            3
        } else {
            2
        }
    }

    /// (shift, number) of the first period: morning before afternoon before night
    pub fn start_order(&self) -> (u8, u32) {
        let first = &self.periods[0];
        let shift = match first.as_bytes()[0] {
            b'M' => 0,
            b'T' => 1,
            b'N' => 2,
            _ => 3,
        };
        (shift, first[1..].parse().unwrap_or(0))
    }

    #[inline]
    pub fn shares_period(&self, other: &Self) -> bool {
        self.periods.iter().any(|code| other.periods.contains(code))
    }
}

impl fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// one cell of the weekly grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub day: String,
    pub day_index: usize,
    pub label: SlotLabel,
}

impl TimeSlot {
    /// `<day>_<period-codes>`, the form used by preferences and the output table
    pub fn full_label(&self) -> String {
        format!("{}_{}", self.day, self.label)
    }

    #[inline]
    pub fn category(&self) -> Category {
        self.label.category()
    }

    #[inline]
    pub fn duration(&self) -> u32 {
        self.label.implied_duration()
    }

    /// category and duration of the session match the slot
    #[inline]
    pub fn fits(&self, session: &Session) -> bool {
        session.category == self.category() && session.duration == self.duration()
    }

    /// same day and at least one common period
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.day_index == other.day_index && self.label.shares_period(&other.label)
    }
}

/// ordered sequence of all schedulable slots, walked once per search attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeLine {
    slots: Vec<TimeSlot>,
}

impl TimeLine {
    /// interleaves both taxonomies: for the i-th label of each, every weekday gets the day slot then the night slot
    pub fn build(config: &SolverConfig) -> Result<Self, TimetableError> {
        let day_labels = config
            .day_slots
            .iter()
            .map(|label| SlotLabel::parse(label))
            .collect::<Result<Vec<_>, _>>()?;
        let night_labels = config
            .night_slots
            .iter()
            .map(|label| SlotLabel::parse(label))
            .collect::<Result<Vec<_>, _>>()?;

        let max_len = day_labels.len().max(night_labels.len());
        let mut slots = Vec::with_capacity(config.weekdays.len() * (day_labels.len() + night_labels.len()));

        for i in 0..max_len {
            for (day_index, day) in config.weekdays.iter().enumerate() {
                for label in day_labels.get(i).into_iter().chain(night_labels.get(i)) {
                    slots.push(TimeSlot {
                        day: day.clone(),
                        day_index,
                        label: label.clone(),
                    });
                }
            }
        }

        tracing::info!(
            "built time line with {} slot(s) over {} weekday(s)",
            slots.len(),
            config.weekdays.len()
        );

        Ok(Self { slots })
    }

    /// stable reorder: slots preferred by many professors (and avoided by few) first
    pub fn order_by_popularity(&mut self, preferences: &PreferenceMap) {
        self.slots
            .sort_by_cached_key(|slot| -preferences.popularity(&slot.full_label()));
    }

    #[inline]
    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// upper bound of hours per category the grid can hold for one cohort
    pub fn capacity_hours(&self, category: Category) -> u32 {
        self.slots
            .iter()
            .filter(|slot| slot.category() == category)
            .map(|slot| slot.duration())
            .sum()
    }
}
