//! Xlog line parsing: one raw line into a typed, validated record.
//!
//! Format: tab-separated `key=value` tokens, one game per line.
//!   - Any NUL, CR or LF inside the line rejects it outright.
//!   - Every token must contain the separator.
//!   - Required fields are checked before any value is coerced.
//!   - Bitfields accept `0x`-prefixed hex or bare decimal.
//!   - Unknown keys are kept verbatim in `extra`.

use crate::{
    error::{MalformedReason, RecordError},
    spec_registry::SourceField,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Fields a line must carry to be accepted, checked in this order.
pub const REQUIRED_FIELDS: [&str; 7] = [
    "name", "death", "version", "turns", "role", "starttime", "endtime",
];

#[derive(Debug, Clone, PartialEq)]
pub struct XlogRecord {
    // required
    pub name:      String,
    pub death:     String,
    pub version:   String,
    pub turns:     u64,
    pub role:      String,
    pub starttime: DateTime<Utc>,
    pub endtime:   DateTime<Utc>,

    // optional character info
    pub race:    Option<String>,
    pub gender:  Option<String>,
    pub gender0: Option<String>,
    pub align:   Option<String>,
    pub align0:  Option<String>,
    pub server:  Option<String>,

    // optional counters
    pub points:   Option<i64>,
    pub realtime: Option<Duration>,
    pub deathlev: Option<i64>,
    pub maxlvl:   Option<i64>,
    pub hp:       Option<i64>,
    pub maxhp:    Option<i64>,
    pub deaths:   Option<i64>,

    pub birthdate: Option<NaiveDate>,
    pub deathdate: Option<NaiveDate>,

    pub flags:     Option<u64>,
    pub bitfields: BTreeMap<SourceField, u64>,

    /// Fields this parser has no type for, passed through as-is.
    pub extra: BTreeMap<String, String>,
}

impl XlogRecord {
    /// Raw value of a conduct/achievement-bearing field, if the line had it.
    pub fn bitfield(&self, field: SourceField) -> Option<u64> {
        self.bitfields.get(&field).copied()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecordParser {
    delimiter: char,
    separator: char,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self { delimiter: '\t', separator: '=' }
    }
}

impl RecordParser {
    pub fn parse(&self, line: &str) -> Result<XlogRecord, RecordError> {
        if line.contains(['\0', '\r', '\n']) {
            return Err(RecordError::Malformed(MalformedReason::ControlCharacter));
        }
        if line.is_empty() {
            return Err(RecordError::Malformed(MalformedReason::Empty));
        }

        // Later duplicates overwrite earlier ones.
        let mut fields: BTreeMap<&str, &str> = BTreeMap::new();
        for token in line.split(self.delimiter) {
            let (key, value) = token.split_once(self.separator).ok_or_else(|| {
                RecordError::Malformed(MalformedReason::MissingSeparator {
                    token: token.to_string(),
                })
            })?;
            fields.insert(key, value);
        }

        for field in REQUIRED_FIELDS {
            if !fields.contains_key(field) {
                return Err(RecordError::MissingRequiredField { field });
            }
        }

        let mut record = XlogRecord {
            name:      fields["name"].to_string(),
            death:     fields["death"].to_string(),
            version:   fields["version"].to_string(),
            turns:     parse_decimal("turns", fields["turns"])?,
            role:      fields["role"].to_string(),
            starttime: parse_epoch("starttime", fields["starttime"])?,
            endtime:   parse_epoch("endtime", fields["endtime"])?,
            race:      None,
            gender:    None,
            gender0:   None,
            align:     None,
            align0:    None,
            server:    None,
            points:    None,
            realtime:  None,
            deathlev:  None,
            maxlvl:    None,
            hp:        None,
            maxhp:     None,
            deaths:    None,
            birthdate: None,
            deathdate: None,
            flags:     None,
            bitfields: BTreeMap::new(),
            extra:     BTreeMap::new(),
        };

        for (&key, &value) in &fields {
            match key {
                k if REQUIRED_FIELDS.contains(&k) => {}
                "race"    => record.race    = Some(value.to_string()),
                "gender"  => record.gender  = Some(value.to_string()),
                "gender0" => record.gender0 = Some(value.to_string()),
                "align"   => record.align   = Some(value.to_string()),
                "align0"  => record.align0  = Some(value.to_string()),
                "server"  => record.server  = Some(value.to_string()),
                "points"   => record.points   = Some(parse_decimal(key, value)?),
                "deathlev" => record.deathlev = Some(parse_decimal(key, value)?),
                "maxlvl"   => record.maxlvl   = Some(parse_decimal(key, value)?),
                "hp"       => record.hp       = Some(parse_decimal(key, value)?),
                "maxhp"    => record.maxhp    = Some(parse_decimal(key, value)?),
                "deaths"   => record.deaths   = Some(parse_decimal(key, value)?),
                "realtime" => {
                    let secs: u32 = parse_decimal(key, value)?;
                    record.realtime = Some(Duration::seconds(i64::from(secs)));
                }
                "birthdate" => record.birthdate = Some(parse_date(key, value)?),
                "deathdate" => record.deathdate = Some(parse_date(key, value)?),
                "flags" => record.flags = Some(parse_bitfield(key, value)?),
                _ => match SourceField::from_xlog_key(key) {
                    Some(field) => {
                        record.bitfields.insert(field, parse_bitfield(key, value)?);
                    }
                    None => {
                        record.extra.insert(key.to_string(), value.to_string());
                    }
                },
            }
        }

        Ok(record)
    }
}

fn invalid(field: &str, value: &str) -> RecordError {
    RecordError::Malformed(MalformedReason::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, RecordError> {
    value.parse().map_err(|_| invalid(field, value))
}

fn parse_epoch(field: &str, value: &str) -> Result<DateTime<Utc>, RecordError> {
    let secs: i64 = parse_decimal(field, value)?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| invalid(field, value))
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, RecordError> {
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| invalid(field, value))
}

/// `0x`-prefixed hexadecimal, otherwise plain decimal.
pub fn parse_bitfield(field: &str, value: &str) -> Result<u64, RecordError> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| invalid(field, value))
}
