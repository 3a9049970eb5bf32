//! Search options and their normalization.
//!
//! [`SearchOptions`] mirrors the STAC API Item Search query parameters for
//! static catalogs. Every option is optional and unconstrained by default;
//! supplied options combine with logical AND. Inputs are accepted in the
//! flexible forms the STAC API allows (comma-separated strings, GeoJSON
//! text, simple date strings) and normalized in one validation pass before
//! any row is scanned.

use chrono::{DateTime, Utc};
use geo::{Geometry, Rect};
use rustc_hash::FxHashSet;
use serde_json::Value;
use stacq_expr::Expr;
use stacq_result::{Error, Result};

use crate::datetime;

/// Search options for [`search`](crate::search).
///
/// ```
/// use stacq::SearchOptions;
///
/// let options = SearchOptions::new()
///     .collections("area-1-1,area-2-2")
///     .bbox([-4.0, 3.0, -1.0, 4.0])
///     .filter("eo:cloud_cover < 10");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    ids: Option<ListInput>,
    collections: Option<ListInput>,
    bbox: Option<BboxInput>,
    intersects: Option<IntersectsInput>,
    datetime: Option<DatetimeInput>,
    filter: Option<FilterInput>,
    filter_lang: Option<FilterLang>,
    query: Option<Value>,
}

impl SearchOptions {
    pub fn new() -> SearchOptions {
        SearchOptions::default()
    }

    /// Restrict results to the given item ids.
    pub fn ids(mut self, ids: impl Into<ListInput>) -> Self {
        self.ids = Some(ids.into());
        self
    }

    /// Restrict results to items in the given collections.
    pub fn collections(mut self, collections: impl Into<ListInput>) -> Self {
        self.collections = Some(collections.into());
        self
    }

    /// Restrict results to items intersecting a bounding box of 4 (2D) or
    /// 6 (3D, elevation ignored) coordinates. Conflicts with `intersects`.
    pub fn bbox(mut self, bbox: impl Into<BboxInput>) -> Self {
        self.bbox = Some(bbox.into());
        self
    }

    /// Restrict results to items intersecting a GeoJSON geometry.
    /// Conflicts with `bbox`.
    pub fn intersects(mut self, intersects: impl Into<IntersectsInput>) -> Self {
        self.intersects = Some(intersects.into());
        self
    }

    /// Restrict results to a single datetime period or a closed range.
    /// Open-ended intervals are rejected during validation.
    pub fn datetime(mut self, datetime: impl Into<DatetimeInput>) -> Self {
        self.datetime = Some(datetime.into());
        self
    }

    /// Restrict results with a CQL2 filter expression.
    pub fn filter(mut self, filter: impl Into<FilterInput>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Override the filter language (defaults to `cql2-text` for string
    /// filters and `cql2-json` for JSON filters).
    pub fn filter_lang(mut self, lang: FilterLang) -> Self {
        self.filter_lang = Some(lang);
        self
    }

    /// The STAC API `query` extension is not supported; supplying it makes
    /// validation fail fast instead of silently ignoring the constraint.
    pub fn query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }

    /// Validate and normalize the options into executable parameters.
    ///
    /// All validation errors (unsupported options, conflicting options,
    /// malformed inputs) surface here, before any row is scanned.
    pub(crate) fn normalize(self) -> Result<SearchParams> {
        if self.query.is_some() {
            return Err(Error::UnsupportedOption(
                "query; express the predicate with `filter` instead".into(),
            ));
        }
        if self.bbox.is_some() && self.intersects.is_some() {
            return Err(Error::ConflictingOptions("bbox", "intersects"));
        }

        let spatial = match (self.bbox, self.intersects) {
            (Some(bbox), None) => Some(bbox.resolve()?),
            (None, Some(intersects)) => Some(intersects.resolve()?),
            (None, None) => None,
            (Some(_), Some(_)) => unreachable!(),
        };

        let filter = match self.filter {
            None => None,
            Some(input) => Some(input.parse(self.filter_lang)?),
        };

        Ok(SearchParams {
            ids: self.ids.map(ListInput::resolve),
            collections: self.collections.map(ListInput::resolve),
            spatial,
            datetime: self.datetime.as_ref().map(datetime::resolve).transpose()?,
            filter,
        })
    }
}

/// Normalized, validated search parameters.
#[derive(Debug, Clone)]
pub(crate) struct SearchParams {
    pub(crate) ids: Option<FxHashSet<String>>,
    pub(crate) collections: Option<FxHashSet<String>>,
    pub(crate) spatial: Option<Geometry<f64>>,
    pub(crate) datetime: Option<(i64, i64)>,
    pub(crate) filter: Option<Expr>,
}

/// A list-like option: either a comma-separated string or explicit values.
#[derive(Debug, Clone)]
pub enum ListInput {
    Text(String),
    Values(Vec<String>),
}

impl ListInput {
    fn resolve(self) -> FxHashSet<String> {
        match self {
            ListInput::Text(text) => text.split(',').map(str::to_string).collect(),
            ListInput::Values(values) => values.into_iter().collect(),
        }
    }
}

impl From<&str> for ListInput {
    fn from(v: &str) -> Self {
        ListInput::Text(v.to_string())
    }
}

impl From<String> for ListInput {
    fn from(v: String) -> Self {
        ListInput::Text(v)
    }
}

impl From<Vec<String>> for ListInput {
    fn from(v: Vec<String>) -> Self {
        ListInput::Values(v)
    }
}

impl From<Vec<&str>> for ListInput {
    fn from(v: Vec<&str>) -> Self {
        ListInput::Values(v.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for ListInput {
    fn from(v: &[&str]) -> Self {
        ListInput::Values(v.iter().map(|s| s.to_string()).collect())
    }
}

/// A bounding-box option: coordinates or a comma-separated string.
#[derive(Debug, Clone)]
pub enum BboxInput {
    Text(String),
    Coords(Vec<f64>),
}

impl BboxInput {
    fn resolve(self) -> Result<Geometry<f64>> {
        let coords = match self {
            BboxInput::Coords(coords) => coords,
            BboxInput::Text(text) => text
                .split(',')
                .map(|part| {
                    part.trim().parse::<f64>().map_err(|_| {
                        Error::InvalidArgumentError(format!("invalid bbox coordinate: {part:?}"))
                    })
                })
                .collect::<Result<Vec<f64>>>()?,
        };
        let (min_x, min_y, max_x, max_y) = match coords.as_slice() {
            [min_x, min_y, max_x, max_y] => (*min_x, *min_y, *max_x, *max_y),
            // 3D bbox: drop the elevation bounds.
            [min_x, min_y, _, max_x, max_y, _] => (*min_x, *min_y, *max_x, *max_y),
            other => {
                return Err(Error::InvalidArgumentError(format!(
                    "bbox must have 4 or 6 coordinates, got {}",
                    other.len()
                )));
            }
        };
        let rect = Rect::new((min_x, min_y), (max_x, max_y));
        Ok(Geometry::Polygon(rect.to_polygon()))
    }
}

impl From<&str> for BboxInput {
    fn from(v: &str) -> Self {
        BboxInput::Text(v.to_string())
    }
}

impl From<Vec<f64>> for BboxInput {
    fn from(v: Vec<f64>) -> Self {
        BboxInput::Coords(v)
    }
}

impl From<[f64; 4]> for BboxInput {
    fn from(v: [f64; 4]) -> Self {
        BboxInput::Coords(v.to_vec())
    }
}

impl From<[f64; 6]> for BboxInput {
    fn from(v: [f64; 6]) -> Self {
        BboxInput::Coords(v.to_vec())
    }
}

/// An intersection geometry: GeoJSON text, a GeoJSON value, or a parsed
/// shape.
#[derive(Debug, Clone)]
pub enum IntersectsInput {
    Text(String),
    Json(Value),
    Geometry(Geometry<f64>),
}

impl IntersectsInput {
    fn resolve(self) -> Result<Geometry<f64>> {
        let value = match self {
            IntersectsInput::Geometry(geom) => return Ok(geom),
            IntersectsInput::Json(value) => value,
            IntersectsInput::Text(text) => serde_json::from_str(&text)?,
        };
        let gj = geojson::Geometry::from_json_value(value).map_err(Error::geometry_parse)?;
        Geometry::<f64>::try_from(&gj).map_err(Error::geometry_parse)
    }
}

impl From<&str> for IntersectsInput {
    fn from(v: &str) -> Self {
        IntersectsInput::Text(v.to_string())
    }
}

impl From<Value> for IntersectsInput {
    fn from(v: Value) -> Self {
        IntersectsInput::Json(v)
    }
}

impl From<Geometry<f64>> for IntersectsInput {
    fn from(v: Geometry<f64>) -> Self {
        IntersectsInput::Geometry(v)
    }
}

/// A datetime option: a period/range string, an instant, or a closed range.
#[derive(Debug, Clone)]
pub enum DatetimeInput {
    Text(String),
    Instant(DateTime<Utc>),
    Range(DateTime<Utc>, DateTime<Utc>),
}

impl From<&str> for DatetimeInput {
    fn from(v: &str) -> Self {
        DatetimeInput::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for DatetimeInput {
    fn from(v: DateTime<Utc>) -> Self {
        DatetimeInput::Instant(v)
    }
}

impl From<(DateTime<Utc>, DateTime<Utc>)> for DatetimeInput {
    fn from((start, end): (DateTime<Utc>, DateTime<Utc>)) -> Self {
        DatetimeInput::Range(start, end)
    }
}

/// A CQL2 filter: text or JSON form.
#[derive(Debug, Clone)]
pub enum FilterInput {
    Text(String),
    Json(Value),
}

impl FilterInput {
    fn parse(self, lang: Option<FilterLang>) -> Result<Expr> {
        match (self, lang) {
            (FilterInput::Text(text), None | Some(FilterLang::Cql2Text)) => {
                stacq_expr::parse_cql2_text(&text)
            }
            (FilterInput::Text(text), Some(FilterLang::Cql2Json)) => {
                stacq_expr::parse_cql2_json_str(&text)
            }
            (FilterInput::Json(value), None | Some(FilterLang::Cql2Json)) => {
                stacq_expr::parse_cql2_json(&value)
            }
            (FilterInput::Json(_), Some(FilterLang::Cql2Text)) => Err(Error::InvalidArgumentError(
                "a JSON filter cannot be parsed as cql2-text".into(),
            )),
        }
    }
}

impl From<&str> for FilterInput {
    fn from(v: &str) -> Self {
        FilterInput::Text(v.to_string())
    }
}

impl From<String> for FilterInput {
    fn from(v: String) -> Self {
        FilterInput::Text(v)
    }
}

impl From<Value> for FilterInput {
    fn from(v: Value) -> Self {
        FilterInput::Json(v)
    }
}

/// Language variant of a `filter` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterLang {
    Cql2Text,
    Cql2Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_option_fails_fast() {
        let err = SearchOptions::new()
            .query(json!({"platform": {"eq": "SS02"}}))
            .normalize()
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOption(_)));
    }

    #[test]
    fn bbox_and_intersects_conflict() {
        let err = SearchOptions::new()
            .bbox([-4.0, 3.0, -1.0, 4.0])
            .intersects(json!({"type": "Point", "coordinates": [0.0, 0.0]}))
            .normalize()
            .unwrap_err();
        assert!(matches!(err, Error::ConflictingOptions("bbox", "intersects")));
    }

    #[test]
    fn comma_separated_lists_split() {
        let params = SearchOptions::new()
            .ids("area-2-2-imagery,area-2-2-labels")
            .normalize()
            .unwrap();
        let ids = params.ids.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("area-2-2-imagery"));
        assert!(ids.contains("area-2-2-labels"));
    }

    #[test]
    fn bbox_accepts_text_and_3d_coordinates() {
        assert!(SearchOptions::new().bbox("-4, 3, -1, 4").normalize().is_ok());
        assert!(SearchOptions::new()
            .bbox([-4.0, 3.0, 0.0, -1.0, 4.0, 100.0])
            .normalize()
            .is_ok());
        assert!(matches!(
            SearchOptions::new().bbox(vec![1.0, 2.0, 3.0]).normalize(),
            Err(Error::InvalidArgumentError(_))
        ));
    }

    #[test]
    fn malformed_filter_is_a_parse_error() {
        assert!(matches!(
            SearchOptions::new().filter("platform = =").normalize(),
            Err(Error::FilterParse(_))
        ));
    }
}
