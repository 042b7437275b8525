//! Publish date normalization.
//!
//! RSS publishers are inconsistent about `pubDate`. Dates are matched against
//! a fixed, ordered list of layouts and the first successful parse wins.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};

use crate::error::DateError;

/// How a layout carries its time zone.
#[derive(Debug, Clone, Copy)]
enum Zone {
    /// No zone in the string; the timestamp is UTC.
    Utc,
    /// Numeric offset handled by chrono's `%z`.
    Numeric,
    /// Alphabetic abbreviation, found this many whitespace-separated tokens
    /// from the end of the string.
    Named { from_end: usize },
}

/// Leading day name. Its spelling is checked but it is never compared with
/// the calendar date, since publishers often get it wrong.
#[derive(Debug, Clone, Copy)]
enum DayName {
    Absent,
    /// `Mon`
    Short,
    /// `Monday`
    Long,
}

const SHORT_DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const LONG_DAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, Copy)]
enum Layout {
    Format {
        name: &'static str,
        day: DayName,
        /// Everything after the day name.
        format: &'static str,
        zone: Zone,
    },
    /// RFC 3339 with or without fractional seconds.
    Rfc3339,
}

const KNOWN_LAYOUTS: &[Layout] = &[
    Layout::Format {
        name: "reference",
        day: DayName::Absent,
        format: "%m/%d %I:%M:%S%p '%y %z",
        zone: Zone::Numeric,
    },
    Layout::Format {
        name: "ANSIC",
        day: DayName::Short,
        format: " %b %e %H:%M:%S %Y",
        zone: Zone::Utc,
    },
    Layout::Format {
        name: "UnixDate",
        day: DayName::Short,
        format: " %b %e %H:%M:%S %Y",
        zone: Zone::Named { from_end: 1 },
    },
    Layout::Format {
        name: "RubyDate",
        day: DayName::Short,
        format: " %b %d %H:%M:%S %z %Y",
        zone: Zone::Numeric,
    },
    Layout::Format {
        name: "RFC822",
        day: DayName::Absent,
        format: "%d %b %y %H:%M",
        zone: Zone::Named { from_end: 0 },
    },
    Layout::Format {
        name: "RFC822Z",
        day: DayName::Absent,
        format: "%d %b %y %H:%M %z",
        zone: Zone::Numeric,
    },
    Layout::Format {
        name: "RFC850",
        day: DayName::Long,
        format: ", %d-%b-%y %H:%M:%S",
        zone: Zone::Named { from_end: 0 },
    },
    Layout::Format {
        name: "RFC1123",
        day: DayName::Short,
        format: ", %d %b %Y %H:%M:%S",
        zone: Zone::Named { from_end: 0 },
    },
    Layout::Format {
        name: "RFC1123Z",
        day: DayName::Short,
        format: ", %d %b %Y %H:%M:%S %z",
        zone: Zone::Numeric,
    },
    Layout::Rfc3339,
];

/// Parse a publish date, trying every known layout in order.
pub fn parse_pub_date(pub_date: &str) -> Result<DateTime<FixedOffset>, DateError> {
    let pub_date = pub_date.trim();
    if pub_date.is_empty() {
        return Err(DateError::NoDate);
    }

    KNOWN_LAYOUTS
        .iter()
        .find_map(|layout| layout.parse(pub_date))
        .ok_or_else(|| DateError::UnknownFormat(pub_date.to_string()))
}

impl Layout {
    fn parse(&self, input: &str) -> Option<DateTime<FixedOffset>> {
        match *self {
            Layout::Rfc3339 => DateTime::parse_from_rfc3339(input).ok(),
            Layout::Format {
                day, format, zone, ..
            } => {
                let input = day.strip(input)?;
                match zone {
                    Zone::Utc => NaiveDateTime::parse_from_str(input, format)
                        .ok()
                        .map(|naive| naive.and_utc().fixed_offset()),
                    Zone::Numeric => DateTime::parse_from_str(input, format).ok(),
                    Zone::Named { from_end } => parse_with_named_zone(input, format, from_end),
                }
            }
        }
    }

    #[cfg(test)]
    fn name(&self) -> &'static str {
        match self {
            Layout::Format { name, .. } => *name,
            Layout::Rfc3339 => "RFC3339",
        }
    }
}

impl DayName {
    /// Remove the day name from the front of `input`.
    fn strip(self, input: &str) -> Option<&str> {
        let names = match self {
            DayName::Absent => return Some(input),
            DayName::Short => &SHORT_DAYS,
            DayName::Long => &LONG_DAYS,
        };
        names.iter().find_map(|name| input.strip_prefix(name))
    }
}

fn parse_with_named_zone(
    input: &str,
    format: &str,
    from_end: usize,
) -> Option<DateTime<FixedOffset>> {
    let mut tokens: Vec<&str> = input.split_whitespace().collect();
    let index = tokens.len().checked_sub(from_end + 1)?;
    let offset = zone_offset(tokens.remove(index))?;

    let naive = NaiveDateTime::parse_from_str(&tokens.join(" "), format).ok()?;
    offset.from_local_datetime(&naive).single()
}

/// Resolve a zone abbreviation.
///
/// The RFC 822 zones get their real offsets. Any other upper-case
/// abbreviation is accepted with a zero offset since abbreviations are
/// ambiguous across regions.
fn zone_offset(abbreviation: &str) -> Option<FixedOffset> {
    let hours = match abbreviation {
        "Z" | "UT" | "UTC" | "GMT" => 0,
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        other => {
            let plausible = (2..=5).contains(&other.len())
                && other.bytes().all(|b| b.is_ascii_uppercase());
            if !plausible {
                return None;
            }
            0
        }
    };
    FixedOffset::east_opt(hours * 3600)
}
