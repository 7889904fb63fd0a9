//! Locale boundary.
//!
//! Timestamps are stored as real instants; everything users see (order dates,
//! payment dates, prices) is formatted here in the shop's Indonesian locale.
//! Legacy records that only carry a display string are parsed back so they
//! keep sorting and grouping with the rest.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc};
use std::cmp::Ordering;

use crate::config::LocaleConfig;
use crate::decimal::Money;
use crate::errors::{Result, ShopError};
use crate::types::{PaymentFrequency, Stamp};

const MONTHS: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

/// id-ID formatting in a fixed utc offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locale {
    offset_secs: i32,
}

impl Locale {
    pub fn new(config: &LocaleConfig) -> Result<Self> {
        let hours = config.utc_offset_hours;
        if !(-12..=14).contains(&hours) {
            return Err(ShopError::InvalidConfiguration {
                message: format!("utc offset {} out of range", hours),
            });
        }
        Ok(Self { offset_secs: hours * 3600 })
    }

    /// western indonesia time (utc+7)
    pub fn jakarta() -> Self {
        Self { offset_secs: 7 * 3600 }
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.offset_secs).unwrap_or_else(|| Utc.fix())
    }

    /// calendar day of an instant in the shop's offset
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset()).date_naive()
    }

    /// long-form date, e.g. "14 November 2024"
    pub fn long_date(&self, at: DateTime<Utc>) -> String {
        format_naive(self.local_date(at))
    }

    /// calendar day of a stored stamp; `None` when a legacy string does not parse
    pub fn calendar_date(&self, stamp: &Stamp) -> Option<NaiveDate> {
        match stamp {
            Stamp::At(at) => Some(self.local_date(*at)),
            Stamp::Text(text) => parse_long_date(text),
        }
    }

    /// display label of a stored stamp
    pub fn display(&self, stamp: &Stamp) -> String {
        match stamp {
            Stamp::At(at) => self.long_date(*at),
            Stamp::Text(text) => text.clone(),
        }
    }

    /// newest first; two real timestamps compare exactly, anything else by
    /// calendar day with unknown days counting as equal
    pub fn newest_stamp_first(&self, a: &Stamp, b: &Stamp) -> Ordering {
        match (a, b) {
            (Stamp::At(a), Stamp::At(b)) => b.cmp(a),
            _ => newest_first(self.calendar_date(a), self.calendar_date(b)),
        }
    }

    /// "Rp 1.250.000"
    pub fn rupiah(&self, amount: Money) -> String {
        let whole = amount.ceil().as_decimal().trunc();
        let digits = whole.abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        if whole.is_sign_negative() && !whole.is_zero() {
            format!("-Rp {}", grouped)
        } else {
            format!("Rp {}", grouped)
        }
    }

    /// "Rp 20.000 / hari"
    pub fn installment_label(&self, amount: Money, frequency: PaymentFrequency) -> String {
        let unit = match frequency {
            PaymentFrequency::Daily => "hari",
            PaymentFrequency::Weekly => "minggu",
        };
        format!("{} / {}", self.rupiah(amount), unit)
    }
}

fn format_naive(date: NaiveDate) -> String {
    format!("{} {} {}", date.day(), MONTHS[date.month0() as usize], date.year())
}

/// parse "14 November 2024"; anything else yields `None`
pub fn parse_long_date(text: &str) -> Option<NaiveDate> {
    let mut parts = text.split_whitespace();
    let day: u32 = parts.next()?.parse().ok()?;
    let month_name = parts.next()?;
    let year: i32 = parts.next()?.parse().ok()?;
    let month = MONTHS.iter().position(|m| *m == month_name)? as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// newest first; if either side is unknown the pair counts as equal
pub fn newest_first(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        _ => Ordering::Equal,
    }
}

/// stable insertion sort; never panics when `cmp` is not a total order
pub fn stable_sort_by<T>(items: &mut [T], mut cmp: impl FnMut(&T, &T) -> Ordering) {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && cmp(&items[j - 1], &items[j]) == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}
