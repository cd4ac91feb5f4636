use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;
use time::macros::format_description;

/// Largest number of significant digits a total may carry.
///
/// Totals are emitted as JSON numbers (`f64`), which hold 15 significant digits
/// exactly. The same bound keeps report arithmetic far from `Decimal` overflow.
pub const MAX_TOTAL_DIGITS: u32 = 15;

/// Returns `true` if `total` is non-negative and has at most `MAX_TOTAL_DIGITS`
/// significant digits.
pub fn is_valid_total(total: Decimal) -> bool {
    total >= Decimal::ZERO
        && total.normalize().mantissa().unsigned_abs() < 10u128.pow(MAX_TOTAL_DIGITS)
}

/// Structured fields extracted from one receipt image.
///
/// A field the model could not determine is `None` and serializes as JSON `null`.
/// Records are immutable once created; `total` is never negative and always fits
/// `MAX_TOTAL_DIGITS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptRecord {
    vendor: Option<String>,
    date: Option<String>,
    #[serde(with = "rust_decimal::serde::float_option")]
    total: Option<Decimal>,
    category: Option<String>,
}

impl ReceiptRecord {
    /// Creates a new record.
    ///
    /// Returns `None` if `total` fails `is_valid_total`.
    pub fn new(
        vendor: Option<String>,
        date: Option<String>,
        total: Option<Decimal>,
        category: Option<String>,
    ) -> Option<Self> {
        if total.is_some_and(|t| !is_valid_total(t)) {
            return None;
        }
        Some(Self {
            vendor,
            date,
            total,
            category,
        })
    }

    /// Returns the merchant name.
    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    /// Returns the receipt date as reported by the model.
    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    /// Returns the receipt date if it is written as `YYYY-MM-DD`.
    pub fn iso_date(&self) -> Option<Date> {
        self.date.as_deref().and_then(parse_iso_date)
    }

    /// Returns the total amount paid.
    pub fn total(&self) -> Option<Decimal> {
        self.total
    }

    /// Returns the expense category.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

/// Parses a `YYYY-MM-DD` date, ignoring surrounding whitespace.
pub fn parse_iso_date(s: &str) -> Option<Date> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]")).ok()
}
