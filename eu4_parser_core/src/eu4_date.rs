use anyhow::Error;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use std::{fmt::Display, str::FromStr};

#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, FromPrimitive, ToPrimitive, Hash)]
pub enum Month {
    JAN = 1,
    FEB,
    MAR,
    APR,
    MAY,
    JUN,
    JUL,
    AUG,
    SEP,
    OCT,
    NOV,
    DEC,
}

impl Month {
    /// The EU4 calendar has no leap years, so February is always 28 days.
    pub const fn length(&self) -> u8 {
        return [0, 31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31][*self as usize];
    }

    pub const fn number(&self) -> u8 {
        return *self as u8;
    }

    pub fn from_number(num: u8) -> Option<Month> {
        return Month::from_u8(num);
    }

    pub const fn next(&self) -> Month {
        return match self {
            Month::JAN => Month::FEB,
            Month::FEB => Month::MAR,
            Month::MAR => Month::APR,
            Month::APR => Month::MAY,
            Month::MAY => Month::JUN,
            Month::JUN => Month::JUL,
            Month::JUL => Month::AUG,
            Month::AUG => Month::SEP,
            Month::SEP => Month::OCT,
            Month::OCT => Month::NOV,
            Month::NOV => Month::DEC,
            Month::DEC => Month::JAN,
        };
    }
}

/// A day on the EU4 calendar, written `Y.M.D` in game files.
///
/// Field order gives the derived `Ord` chronological meaning.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct EU4Date {
    pub year: u16,
    pub month: Month,
    pub day: u8,
}

impl EU4Date {
    pub fn new(year: u16, month: Month, day: u8) -> Option<EU4Date> {
        if day == 0 || day > month.length() {
            return None;
        }
        return Some(EU4Date { year, month, day });
    }

    /// Builds a date with the day clamped into the month, e.g. `1444.2.31`
    /// becomes `1444.2.28`. A day of zero still yields day 1.
    pub fn clamped(year: u16, month: Month, day: u8) -> EU4Date {
        return EU4Date {
            year,
            month,
            day: day.clamp(1, month.length()),
        };
    }

    pub fn tomorrow(&self) -> EU4Date {
        if self.day < self.month.length() {
            return EU4Date {
                day: self.day + 1,
                ..*self
            };
        }
        if self.month == Month::DEC {
            return EU4Date {
                year: self.year + 1,
                month: Month::JAN,
                day: 1,
            };
        }
        return EU4Date {
            year: self.year,
            month: self.month.next(),
            day: 1,
        };
    }

    pub fn iter_range_inclusive(first: EU4Date, last: EU4Date) -> impl Iterator<Item = EU4Date> {
        return std::iter::successors(Some(first), move |curr| {
            if *curr >= last {
                None
            } else {
                Some(curr.tomorrow())
            }
        });
    }
}

impl FromStr for EU4Date {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let parts = text.trim().split('.').collect::<Vec<&str>>();
        let [y, m, d] = parts.as_slice() else {
            return Err(Error::msg(format!(
                "Date string '{}' did not have a proper three parts",
                text
            )));
        };
        let year = y.parse::<u16>()?;
        let month = Month::from_number(m.parse::<u8>()?)
            .ok_or(Error::msg(format!("Invalid month {}", text)))?;
        let day = d.parse::<u8>()?;

        return EU4Date::new(year, month, day)
            .ok_or(Error::msg(format!("Invalid day of month {}", text)));
    }
}

impl Display for EU4Date {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f.write_fmt(format_args!(
            "{}.{}.{}",
            self.year,
            self.month.number(),
            self.day
        ));
    }
}
