//! Extraction of one flight from raw IFF surveillance files.
//!
//! IFF files are headerless CSV with 18 columns. Track point rows (record type 3)
//! carry position columns, flight plan rows (record type 4) the filed route.
//! Unknown values are written as `?`.

use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::{parse_error, Result};

pub const TRACK_POINT: &str = "3";
pub const FLIGHT_PLAN: &str = "4";

const UNKNOWN: &str = "?";

const COL_RECORD_TYPE: usize = 0;
const COL_TIME: usize = 1;
const COL_CALLSIGN: usize = 7;
const COL_LAT: usize = 9;
const COL_LON: usize = 10;
const COL_FLIGHT_PLAN: usize = 17;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub time: f64,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FlightPlanChange {
    pub time: f64,
    pub plan: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IffRecord {
    Track(TrackPoint),
    PlanChange(FlightPlanChange),
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FlightExtract {
    pub plan_changes: Vec<FlightPlanChange>,
    pub track: Vec<TrackPoint>,
}

fn field<'a>(record: &'a StringRecord, idx: usize) -> Option<&'a str> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != UNKNOWN)
}

/// A numeric column, `None` if unknown. Values that are present but garbled are an error.
fn number(record: &StringRecord, idx: usize) -> Result<Option<f64>> {
    field(record, idx)
        .map(|v| {
            v.parse()
                .map_err(|_| parse_error!("column {} holds {:?} in {:?}", idx, v, record))
        })
        .transpose()
}

/// Parses a row that belongs to `callsign`. Rows of other flights, other
/// record types, or with unknown values in a used column yield `None`.
pub fn parse_record(record: &StringRecord, callsign: &str) -> Result<Option<IffRecord>> {
    if field(record, COL_CALLSIGN) != Some(callsign) {
        return Ok(None);
    }

    let parsed = match field(record, COL_RECORD_TYPE) {
        Some(TRACK_POINT) => {
            let time = number(record, COL_TIME)?;
            let lat = number(record, COL_LAT)?;
            let lon = number(record, COL_LON)?;
            match (time, lat, lon) {
                (Some(time), Some(lat), Some(lon)) => {
                    Some(IffRecord::Track(TrackPoint { time, lat, lon }))
                }
                _ => None,
            }
        }
        Some(FLIGHT_PLAN) => match (number(record, COL_TIME)?, field(record, COL_FLIGHT_PLAN)) {
            (Some(time), Some(plan)) => Some(IffRecord::PlanChange(FlightPlanChange {
                time,
                plan: plan.to_string(),
            })),
            _ => None,
        },
        _ => return Ok(None),
    };

    if parsed.is_none() {
        debug!("dropping incomplete row {:?}", record);
    }
    Ok(parsed)
}

/// Accumulates the records of one flight. Flight plans are kept only the first
/// time their route string shows up, so feeding rows in chunks gives the same
/// result as feeding them at once.
pub struct FlightExtractor {
    callsign: String,
    seen_plans: HashSet<String>,
    extract: FlightExtract,
}

impl FlightExtractor {
    pub fn new(callsign: &str) -> Self {
        FlightExtractor {
            callsign: callsign.to_string(),
            seen_plans: HashSet::new(),
            extract: FlightExtract::default(),
        }
    }

    pub fn push(&mut self, record: IffRecord) {
        match record {
            IffRecord::Track(point) => self.extract.track.push(point),
            IffRecord::PlanChange(change) => {
                if self.seen_plans.insert(change.plan.clone()) {
                    self.extract.plan_changes.push(change);
                }
            }
        }
    }

    pub fn extend<'a, I>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a StringRecord>,
    {
        for row in rows {
            if let Some(record) = parse_record(row, &self.callsign)? {
                self.push(record);
            }
        }
        Ok(())
    }

    pub fn finish(self) -> FlightExtract {
        self.extract
    }
}

/// Filters and deduplicates an ordered sequence of rows in one go.
pub fn extract_flight<'a, I>(rows: I, callsign: &str) -> Result<FlightExtract>
where
    I: IntoIterator<Item = &'a StringRecord>,
{
    let mut extractor = FlightExtractor::new(callsign);
    extractor.extend(rows)?;
    Ok(extractor.finish())
}

pub struct IffReader {
    path: PathBuf,
    chunk_size: usize,
}

impl IffReader {
    pub fn new<P: AsRef<Path>>(path: P, chunk_size: usize) -> Self {
        IffReader {
            path: path.as_ref().to_path_buf(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn read_flight(&self, callsign: &str) -> Result<FlightExtract> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;

        let mut extractor = FlightExtractor::new(callsign);
        let mut chunk: Vec<StringRecord> = Vec::with_capacity(self.chunk_size);
        let mut chunk_no = 0;
        let mut record = StringRecord::new();

        loop {
            let more = reader.read_record(&mut record)?;
            if more {
                chunk.push(record.clone());
            }

            if chunk.len() == self.chunk_size || (!more && !chunk.is_empty()) {
                chunk_no += 1;
                info!("reading chunk number {chunk_no}");
                extractor.extend(chunk.iter())?;
                chunk.clear();
            }

            if !more {
                break;
            }
        }

        let extract = extractor.finish();
        info!(
            "{callsign}: {} flight plan changes, {} track points",
            extract.plan_changes.len(),
            extract.track.len()
        );
        Ok(extract)
    }
}

/// Raw line count, a last line without newline included. Content is not decoded.
pub fn count_rows<P: AsRef<Path>>(path: P) -> Result<usize> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut line = Vec::new();
    let mut n = 0;
    while reader.read_until(b'\n', &mut line)? > 0 {
        n += 1;
        line.clear();
    }
    Ok(n)
}

/// `<callsign>_<date>.<ext>`
pub fn output_name(callsign: &str, date: &str, ext: &str) -> String {
    format!("{callsign}_{date}.{ext}")
}

/// Track points as `time,lat,lon` CSV.
pub fn write_track<P: AsRef<Path>>(path: P, track: &[TrackPoint]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for point in track {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}

/// Flight plan changes as `time,plan` CSV.
pub fn write_plan_changes<P: AsRef<Path>>(path: P, changes: &[FlightPlanChange]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for change in changes {
        writer.serialize(change)?;
    }
    writer.flush()?;
    Ok(())
}
