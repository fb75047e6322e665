//! Run summary extracted from a final ODB dump.
//!
//! The run page header (times, operator comment) and the chronobox channel
//! picker are both built from here.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::form::ChannelSelection;

/// Chronobox boards, in display order. Names are stable within a
/// semver-compatible analysis release.
pub const BOARDS: [&str; 4] = ["cb01", "cb02", "cb03", "cb04"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OdbError {
    #[error("failed to find JSON data in ODB dump")]
    NoJson,

    #[error("failed to parse ODB dump: {0}")]
    Parse(String),

    #[error("failed to get {0}")]
    Missing(String),

    #[error("failed to parse {field} {value:?}")]
    BadValue { field: String, value: String },

    #[error("start time after stop time")]
    TimeOrder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChronoboxChannel {
    pub board: String,
    pub number: u8,
    pub description: String,
}

impl ChronoboxChannel {
    pub fn selection(&self) -> ChannelSelection {
        ChannelSelection {
            board: self.board.clone(),
            number: self.number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    pub run_number: u32,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    pub operator_comment: String,
    /// Sorted by description, case-insensitively.
    pub channels: Vec<ChronoboxChannel>,
}

/// Parse a dump file. Analysis tools prefix the JSON with comment lines, so
/// everything before the first `{` is skipped.
pub fn parse_dump(contents: &[u8]) -> Result<Value, OdbError> {
    let start = contents
        .iter()
        .position(|&c| c == b'{')
        .ok_or(OdbError::NoJson)?;
    serde_json::from_slice(&contents[start..]).map_err(|err| OdbError::Parse(err.to_string()))
}

fn str_at<'a>(odb: &'a Value, pointer: &str) -> Result<&'a str, OdbError> {
    odb.pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| OdbError::Missing(pointer.to_string()))
}

fn binary_time(odb: &Value, pointer: &str) -> Result<DateTime<Utc>, OdbError> {
    let raw = str_at(odb, pointer)?;
    let bad = || OdbError::BadValue {
        field: pointer.to_string(),
        value: raw.to_string(),
    };
    let hex = raw.strip_prefix("0x").ok_or_else(bad)?;
    let secs = i64::from_str_radix(hex, 16).map_err(|_| bad())?;
    DateTime::from_timestamp(secs, 0).ok_or_else(bad)
}

impl RunInfo {
    pub fn try_from_odb(odb: &Value) -> Result<Self, OdbError> {
        let run_number = odb
            .pointer("/Runinfo/Run number")
            .and_then(Value::as_u64)
            .ok_or_else(|| OdbError::Missing("/Runinfo/Run number".into()))?;
        let run_number = u32::try_from(run_number).map_err(|_| OdbError::BadValue {
            field: "/Runinfo/Run number".into(),
            value: run_number.to_string(),
        })?;

        let start_time = binary_time(odb, "/Runinfo/Start time binary")?;
        let stop_time = binary_time(odb, "/Runinfo/Stop time binary")?;
        if start_time >= stop_time {
            return Err(OdbError::TimeOrder);
        }
        let operator_comment = str_at(odb, "/Experiment/Edit on start/Comment")?.to_string();

        let mut channels = Vec::new();
        for board in BOARDS {
            let pointer = format!("/Equipment/{board}/Settings/names");
            let names = odb
                .pointer(&pointer)
                .and_then(Value::as_array)
                .ok_or_else(|| OdbError::Missing(pointer.clone()))?;
            for (i, name) in names.iter().enumerate() {
                let number = u8::try_from(i).map_err(|_| OdbError::BadValue {
                    field: pointer.clone(),
                    value: i.to_string(),
                })?;
                let description = name
                    .as_str()
                    .ok_or_else(|| OdbError::Missing(format!("{pointer}/{i}")))?;
                channels.push(ChronoboxChannel {
                    board: board.to_string(),
                    number,
                    description: description.to_string(),
                });
            }
        }
        channels.sort_by_key(|c| c.description.to_lowercase());

        Ok(Self {
            run_number,
            start_time,
            stop_time,
            operator_comment,
            channels,
        })
    }

    /// Selection label for the channel at `i`, or `None` if it is hidden.
    ///
    /// Channels sharing a description (ignoring case) are usually unconnected
    /// inputs and only clutter the picker.
    pub fn label_at(&self, i: usize) -> Option<&str> {
        let channel = self.channels.get(i)?;
        let same = self
            .channels
            .iter()
            .filter(|c| c.description.eq_ignore_ascii_case(&channel.description))
            .count();
        (same == 1).then_some(channel.description.as_str())
    }

    pub fn selectable_channels(&self) -> Vec<&ChronoboxChannel> {
        (0..self.channels.len())
            .filter(|&i| self.label_at(i).is_some())
            .filter_map(|i| self.channels.get(i))
            .collect()
    }

    /// Find a selectable channel by its description (case-insensitive).
    pub fn find_channel(&self, description: &str) -> Option<&ChronoboxChannel> {
        self.selectable_channels()
            .into_iter()
            .find(|c| c.description.eq_ignore_ascii_case(description))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn odb() -> Value {
        json!({
            "Runinfo": {
                "Run number": 11084,
                "Start time binary": "0x65000000",
                "Stop time binary": "0x65000e10"
            },
            "Experiment": {"Edit on start": {"Comment": "cosmics"}},
            "Equipment": {
                "cb01": {"Settings": {"names": ["SIS_PMT", "spare", "beam"]}},
                "cb02": {"Settings": {"names": ["Spare", "AD_trigger"]}},
                "cb03": {"Settings": {"names": []}},
                "cb04": {"Settings": {"names": ["atom_stick"]}}
            }
        })
    }

    #[test]
    fn parses_header_fields() {
        let info = RunInfo::try_from_odb(&odb()).unwrap();
        assert_eq!(info.run_number, 11084);
        assert_eq!(info.operator_comment, "cosmics");
        assert_eq!((info.stop_time - info.start_time).num_seconds(), 3600);
        assert_eq!(info.channels.len(), 6);
    }

    #[test]
    fn channels_sorted_and_duplicates_hidden() {
        let info = RunInfo::try_from_odb(&odb()).unwrap();
        let labels: Vec<&str> = info
            .selectable_channels()
            .iter()
            .map(|c| c.description.as_str())
            .collect();
        assert_eq!(labels, vec!["AD_trigger", "atom_stick", "beam", "SIS_PMT"]);

        let beam = info.find_channel("BEAM").unwrap();
        assert_eq!(beam.board, "cb01");
        assert_eq!(beam.number, 2);
        assert!(info.find_channel("spare").is_none());
    }

    #[test]
    fn inverted_times_are_rejected() {
        let mut value = odb();
        value["Runinfo"]["Stop time binary"] = json!("0x64000000");
        assert_eq!(RunInfo::try_from_odb(&value), Err(OdbError::TimeOrder));
    }

    #[test]
    fn missing_board_is_reported() {
        let mut value = odb();
        value["Equipment"]
            .as_object_mut()
            .unwrap()
            .remove("cb03");
        assert_eq!(
            RunInfo::try_from_odb(&value),
            Err(OdbError::Missing("/Equipment/cb03/Settings/names".into()))
        );
    }

    #[test]
    fn dump_prefix_is_skipped() {
        let raw = b"# alpha-g-odb 0.5.4\n# run 11084\n{\"a\": 1}";
        assert_eq!(parse_dump(raw).unwrap(), json!({"a": 1}));
        assert_eq!(parse_dump(b"no json here"), Err(OdbError::NoJson));
    }
}
