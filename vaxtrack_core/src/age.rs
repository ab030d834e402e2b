//! Calendar age arithmetic.
//!
//! Minimum ages are composite (years, months, days) thresholds. They are
//! applied by adding them to the birth date with calendar semantics, so a
//! child born on Jan 31 reaches "1 month" on the last day of February.

use crate::{Child, MinAge};
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Serialize;

/// Age expressed in whole years, months and remaining days
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
pub struct AgeBreakdown {
    pub years: u32,
    pub months: u32,
    pub days: u32,
}

impl AgeBreakdown {
    /// Age of someone born on `birth` at date `as_of` (zero before birth)
    pub fn between(birth: NaiveDate, as_of: NaiveDate) -> Self {
        if as_of <= birth {
            return Self::default();
        }

        // Largest whole-month count whose calendar anniversary is not after
        // `as_of`, using the same month addition as `eligible_from`
        let estimate = ((as_of.year() - birth.year()) * 12
            + (as_of.month() as i32 - birth.month() as i32))
            .max(0) as u32;
        let (total_months, anchor) = (0..=estimate)
            .rev()
            .find_map(|months| {
                birth
                    .checked_add_months(Months::new(months))
                    .filter(|anniversary| *anniversary <= as_of)
                    .map(|anniversary| (months, anniversary))
            })
            .unwrap_or((0, birth));
        let days = (as_of - anchor).num_days().max(0) as u32;

        Self {
            years: total_months / 12,
            months: total_months % 12,
            days,
        }
    }
}

/// First date on which a child born on `birth` satisfies `min_age`
pub fn eligible_from(birth: NaiveDate, min_age: &MinAge) -> NaiveDate {
    min_age
        .years
        .checked_mul(12)
        .and_then(|months| months.checked_add(min_age.months))
        .and_then(|months| birth.checked_add_months(Months::new(months)))
        .and_then(|d| d.checked_add_days(Days::new(u64::from(min_age.days))))
        .unwrap_or(NaiveDate::MAX)
}

impl Child {
    pub fn age_at(&self, as_of: NaiveDate) -> AgeBreakdown {
        AgeBreakdown::between(self.birth_date, as_of)
    }

    /// True once the child has reached `min_age` at `as_of`
    pub fn has_reached(&self, min_age: &MinAge, as_of: NaiveDate) -> bool {
        as_of >= eligible_from(self.birth_date, min_age)
    }
}
