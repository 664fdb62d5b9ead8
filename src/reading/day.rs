//! Daily observation records, one per line of a yearly `by_year` CSV.
//!
//! Lines look like `ASN00008050,18770101,PRCP,0,,,a,`.

use tracing::warn;

use super::{get_str, put_str, FixedRecord, SkipReason};

/// Number of comma separated fields in a yearly CSV line.
pub const DAY_FIELDS: usize = 8;

/// Stored when `data_value` is not a 16 bit integer.
pub const MISSING_VALUE: i16 = -999;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayRecord {
    pub station_id: String,
    pub ymd: String,
    pub element: String,
    pub data_value: i16,
    pub m_flag: String,
    pub q_flag: String,
    pub s_flag: String,
    pub obs_time: String,
}

impl DayRecord {
    /// The year of the observation, if `ymd` starts with one.
    pub fn year(&self) -> Option<i32> {
        self.ymd.get(..4)?.parse().ok()
    }
}

impl FixedRecord for DayRecord {
    const WIDTH: usize = 32;

    fn encode(&self, buf: &mut [u8]) {
        put_str(&mut buf[0..11], &self.station_id);
        put_str(&mut buf[11..19], &self.ymd);
        put_str(&mut buf[19..23], &self.element);
        buf[23..25].copy_from_slice(&self.data_value.to_le_bytes());
        put_str(&mut buf[25..26], &self.m_flag);
        put_str(&mut buf[26..27], &self.q_flag);
        put_str(&mut buf[27..28], &self.s_flag);
        put_str(&mut buf[28..32], &self.obs_time);
    }

    fn decode(buf: &[u8]) -> Self {
        DayRecord {
            station_id: get_str(&buf[0..11]),
            ymd: get_str(&buf[11..19]),
            element: get_str(&buf[19..23]),
            data_value: i16::from_le_bytes([buf[23], buf[24]]),
            m_flag: get_str(&buf[25..26]),
            q_flag: get_str(&buf[26..27]),
            s_flag: get_str(&buf[27..28]),
            obs_time: get_str(&buf[28..32]),
        }
    }
}

/// Decodes one CSV line (without its newline).
///
/// Only a wrong field count or undecodable bytes reject the line. Odd field
/// widths are logged and kept, an unusable `data_value` becomes
/// [`MISSING_VALUE`], and overlong flags and times are cut down.
pub fn decode_day(line: &[u8]) -> Result<DayRecord, SkipReason> {
    let line = std::str::from_utf8(line).map_err(|_| SkipReason::InvalidText)?;
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != DAY_FIELDS {
        return Err(SkipReason::WrongFieldCount(fields.len()));
    }

    check_width("station_id", fields[0], 11);
    check_width("ymd", fields[1], 8);
    check_width("element", fields[2], 4);

    Ok(DayRecord {
        station_id: fields[0].to_string(),
        ymd: fields[1].to_string(),
        element: fields[2].to_string(),
        data_value: parse_data_value(fields[3]),
        m_flag: truncate_field("m_flag", fields[4], 1),
        q_flag: truncate_field("q_flag", fields[5], 1),
        s_flag: truncate_field("s_flag", fields[6], 1),
        obs_time: truncate_field("obs_time", fields[7], 4),
    })
}

fn check_width(field: &str, value: &str, width: usize) {
    if value.len() != width {
        warn!("Unexpected length for {}: {}", field, value);
    }
}

fn parse_data_value(s: &str) -> i16 {
    match s.trim().parse::<i64>() {
        Ok(v) => i16::try_from(v).unwrap_or_else(|_| {
            warn!("Data value outside of i16 range: {}", v);
            MISSING_VALUE
        }),
        Err(_) => {
            warn!("Unable to convert data_value to int: {}", s);
            MISSING_VALUE
        }
    }
}

fn truncate_field(field: &str, value: &str, width: usize) -> String {
    if value.chars().count() > width {
        warn!("Unexpected length of {}: {}", field, value);
        value.chars().take(width).collect()
    } else {
        value.to_string()
    }
}

// -- Tests -------------------------------------------------------------------
