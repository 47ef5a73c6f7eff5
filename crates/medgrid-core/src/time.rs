use ::time::{Date, OffsetDateTime, format_description::FormatItem, macros::format_description};

use crate::error::{CoreError, Result};

/// Calendar dates travel as `YYYY-MM-DD`.
pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub fn parse_date(value: &str) -> Result<Date> {
    Date::parse(value.trim(), DATE_FORMAT).map_err(|_| CoreError::invalid_date(value))
}

pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

/// Serde adapter for [`Date`] fields using [`DATE_FORMAT`].
pub mod iso_date {
    use ::time::Date;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw).map_err(D::Error::custom)
    }
}
