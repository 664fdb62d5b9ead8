//! Station catalog records.
//!
//! See "GHCN-Daily readme.txt Section IV" for the fixed-width format of
//! `ghcnd-stations.txt`. Column ranges are in characters and skip the single
//! blank column between fields.

use tracing::warn;

use super::{get_str, put_str, FixedRecord, SkipReason};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationRecord {
    pub station_id: String,
    pub lat: f32,
    pub lon: f32,
    pub elev: f32,
    pub state: String,
    pub name: String,
    pub gsn_flag: String,
    pub hcn_flag: String,
    pub wmo_id: String,
}

impl FixedRecord for StationRecord {
    const WIDTH: usize = 66;

    fn encode(&self, buf: &mut [u8]) {
        put_str(&mut buf[0..11], &self.station_id);
        buf[11..15].copy_from_slice(&self.lat.to_le_bytes());
        buf[15..19].copy_from_slice(&self.lon.to_le_bytes());
        buf[19..23].copy_from_slice(&self.elev.to_le_bytes());
        put_str(&mut buf[23..25], &self.state);
        put_str(&mut buf[25..55], &self.name);
        put_str(&mut buf[55..58], &self.gsn_flag);
        put_str(&mut buf[58..61], &self.hcn_flag);
        put_str(&mut buf[61..66], &self.wmo_id);
    }

    fn decode(buf: &[u8]) -> Self {
        StationRecord {
            station_id: get_str(&buf[0..11]),
            lat: f32_at(buf, 11),
            lon: f32_at(buf, 15),
            elev: f32_at(buf, 19),
            state: get_str(&buf[23..25]),
            name: get_str(&buf[25..55]),
            gsn_flag: get_str(&buf[55..58]),
            hcn_flag: get_str(&buf[58..61]),
            wmo_id: get_str(&buf[61..66]),
        }
    }
}

fn f32_at(buf: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Decodes one line of the station catalog.
pub fn decode_station(line: &str) -> Result<StationRecord, SkipReason> {
    let station_id = column(line, 0, 11);
    if station_id.is_empty() {
        return Err(SkipReason::MissingStationId);
    }
    if station_id.len() != 11 {
        return Err(SkipReason::BadStationId(station_id.to_string()));
    }

    let lat = parse_f32("lat", column(line, 11, 20))?;
    let lon = parse_f32("lon", column(line, 21, 30))?;
    let elev = parse_f32("elev", column(line, 31, 37))?;
    let state = column(line, 38, 40);

    // Non-ASCII names are kept as UTF-8; the slot cuts them at 30 bytes.
    let name = column(line, 41, 71);
    if !name.is_ascii() {
        warn!("can't encode name {} to ascii", name);
        if name.len() > 30 {
            warn!("truncating name to 30 bytes");
        }
    }

    Ok(StationRecord {
        station_id: station_id.to_string(),
        lat,
        lon,
        elev,
        state: state.to_string(),
        name: name.to_string(),
        gsn_flag: ascii_column("gsn_flag", column(line, 72, 75))?,
        hcn_flag: ascii_column("hcn_flag", column(line, 76, 79))?,
        wmo_id: ascii_column("wmo_id", column(line, 80, 85))?,
    })
}

/// Characters `start..end` of `line`, trimmed. Short lines give empty columns.
fn column(line: &str, start: usize, end: usize) -> &str {
    let mut indices = line.char_indices().map(|(i, _)| i).chain([line.len()]);
    let Some(from) = indices.nth(start) else {
        return "";
    };
    let to = indices.nth(end - start - 1).unwrap_or(line.len());

    line[from..to].trim()
}

fn parse_f32(field: &'static str, s: &str) -> Result<f32, SkipReason> {
    s.parse::<f32>().map_err(|_| SkipReason::BadNumber {
        field,
        value: s.to_string(),
    })
}

fn ascii_column(field: &'static str, s: &str) -> Result<String, SkipReason> {
    if s.is_ascii() {
        Ok(s.to_string())
    } else {
        Err(SkipReason::NonAscii(field))
    }
}

// -- Tests -------------------------------------------------------------------
