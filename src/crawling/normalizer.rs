//! Raw upstream item -> [`CanonicalRecord`]
//!
//! Upstream APIs have shipped the same attribute under different keys over
//! time (`artists`/`ar`, `album`/`al`, `duration`/`dt`). Each source has an
//! ordered alias table; the first key that is present and non-null wins and
//! a typed default is used when none match.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::constants::record::{
    ATTRIBUTION_SEPARATOR, DURATION_MILLIS_THRESHOLD, MOVIE_ACTOR_CAP, UNKNOWN_MOVIE_TITLE,
    UNKNOWN_SONG_TITLE,
};
use crate::domain::{CanonicalRecord, Category, ExternalId, RecordDetails, SourceKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no usable id")]
    MissingExternalId,
}

/// Logical attributes probed on a raw record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ExternalId,
    PrimaryLabel,
    Attribution,
    Album,
    Duration,
    Score,
    VoteCount,
    ReleaseDate,
    Regions,
    Types,
    Url,
    CoverUrl,
}

/// Candidate keys for one attribute, in priority order
#[derive(Debug, Clone, Copy)]
pub struct FieldAlias {
    pub field: Field,
    pub keys: &'static [&'static str],
}

const fn alias(field: Field, keys: &'static [&'static str]) -> FieldAlias {
    FieldAlias { field, keys }
}

pub const NETEASE_ALIASES: &[FieldAlias] = &[
    alias(Field::ExternalId, &["id"]),
    alias(Field::PrimaryLabel, &["name"]),
    alias(Field::Attribution, &["artists", "ar"]),
    alias(Field::Album, &["album", "al"]),
    alias(Field::Duration, &["duration", "dt"]),
];

pub const DOUBAN_ALIASES: &[FieldAlias] = &[
    alias(Field::ExternalId, &["id"]),
    alias(Field::PrimaryLabel, &["title"]),
    alias(Field::Attribution, &["actors"]),
    alias(Field::Score, &["score"]),
    alias(Field::VoteCount, &["vote_count"]),
    alias(Field::ReleaseDate, &["release_date"]),
    alias(Field::Regions, &["regions"]),
    alias(Field::Types, &["types"]),
    alias(Field::Url, &["url"]),
    alias(Field::CoverUrl, &["cover_url"]),
];

/// Netease reports id-less tracks as `"id": 0`
pub const NETEASE_ZERO_ID_IS_ABSENT: bool = true;
pub const DOUBAN_ZERO_ID_IS_ABSENT: bool = false;

#[derive(Debug, Clone, Copy)]
pub struct RecordNormalizer {
    kind: SourceKind,
    aliases: &'static [FieldAlias],
    zero_id_is_absent: bool,
}

impl RecordNormalizer {
    pub fn for_source(kind: SourceKind) -> Self {
        let (aliases, zero_id_is_absent) = match kind {
            SourceKind::Netease => (NETEASE_ALIASES, NETEASE_ZERO_ID_IS_ABSENT),
            SourceKind::Douban => (DOUBAN_ALIASES, DOUBAN_ZERO_ID_IS_ABSENT),
        };
        Self {
            kind,
            aliases,
            zero_id_is_absent,
        }
    }

    /// Builds one record from `raw`, found under `category` at page position `rank`
    pub fn normalize(
        &self,
        raw: &Value,
        category: &Category,
        rank: u32,
    ) -> Result<CanonicalRecord, NormalizeError> {
        let object = raw.as_object().ok_or(NormalizeError::NotAnObject)?;
        let external_id = self
            .probe(object, Field::ExternalId)
            .filter(|value| !(self.zero_id_is_absent && is_numeric_zero(value)))
            .and_then(external_id)
            .ok_or(NormalizeError::MissingExternalId)?;

        let title = self.probe(object, Field::PrimaryLabel).and_then(text);

        let (primary_label, attribution, details) = match self.kind {
            SourceKind::Netease => {
                let artists = self
                    .probe(object, Field::Attribution)
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let names: Vec<String> = artists
                    .iter()
                    .map(|artist| artist.get("name").and_then(text).unwrap_or_default())
                    .collect();
                let artist_id = artists
                    .first()
                    .and_then(|artist| artist.get("id"))
                    .map_or(0, integer);

                let album = self.probe(object, Field::Album);
                let album_name = album
                    .and_then(|album| album.get("name"))
                    .and_then(text)
                    .unwrap_or_default();
                let album_id = album
                    .and_then(|album| album.get("id"))
                    .map_or(0, integer);

                let details = RecordDetails::Song {
                    artist_id,
                    album_name,
                    album_id,
                    duration_secs: duration_secs(self.probe(object, Field::Duration).map_or(0, integer)),
                };
                (
                    title.unwrap_or_else(|| UNKNOWN_SONG_TITLE.to_string()),
                    names.join(ATTRIBUTION_SEPARATOR),
                    details,
                )
            }
            SourceKind::Douban => {
                let actors = self
                    .probe(object, Field::Attribution)
                    .map(|value| joined(value, Some(MOVIE_ACTOR_CAP)))
                    .unwrap_or_default();

                let details = RecordDetails::Movie {
                    score: self.probe(object, Field::Score).map_or(0.0, float),
                    vote_count: self.probe(object, Field::VoteCount).map_or(0, integer),
                    release_date: self.text_or_empty(object, Field::ReleaseDate),
                    regions: self
                        .probe(object, Field::Regions)
                        .map(|value| joined(value, None))
                        .unwrap_or_default(),
                    types: self
                        .probe(object, Field::Types)
                        .map(|value| joined(value, None))
                        .unwrap_or_default(),
                    movie_url: self.text_or_empty(object, Field::Url),
                    cover_url: self.text_or_empty(object, Field::CoverUrl),
                };
                (
                    title.unwrap_or_else(|| UNKNOWN_MOVIE_TITLE.to_string()),
                    actors,
                    details,
                )
            }
        };

        Ok(CanonicalRecord {
            external_id,
            primary_label,
            attribution,
            grouping_label: category.name.clone(),
            grouping_id: category.id.clone(),
            rank,
            details,
        })
    }

    /// First alias of `field` present in `object` with a non-null value
    fn probe<'a>(&self, object: &'a Map<String, Value>, field: Field) -> Option<&'a Value> {
        self.aliases
            .iter()
            .filter(|alias| alias.field == field)
            .flat_map(|alias| alias.keys.iter())
            .find_map(|key| object.get(*key).filter(|value| !value.is_null()))
    }

    fn text_or_empty(&self, object: &Map<String, Value>, field: Field) -> String {
        self.probe(object, field).and_then(text).unwrap_or_default()
    }
}

/// Ids may be strings or numbers; blanks, booleans and nested values are rejected
fn external_id(value: &Value) -> Option<ExternalId> {
    match value {
        Value::String(s) => ExternalId::new(s.as_str()),
        Value::Number(n) => ExternalId::new(n.to_string()),
        _ => None,
    }
}

fn is_numeric_zero(value: &Value) -> bool {
    value.as_f64() == Some(0.0)
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer from a number or numeric string; anything else is 0
fn integer(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64))
            .unwrap_or(0),
        _ => 0,
    }
}

/// Float from a number or numeric string (Douban sends scores as "9.7"); anything else is 0.0
fn float(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Joins a list of names with `/`, keeping at most `cap` of them.
/// A bare string is passed through unchanged.
fn joined(value: &Value, cap: Option<usize>) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(text)
            .take(cap.unwrap_or(usize::MAX))
            .collect::<Vec<_>>()
            .join(ATTRIBUTION_SEPARATOR),
        other => text(other).unwrap_or_default(),
    }
}

/// Values above the threshold are milliseconds
fn duration_secs(raw: i64) -> i64 {
    if raw > DURATION_MILLIS_THRESHOLD {
        raw / 1000
    } else {
        raw
    }
}
