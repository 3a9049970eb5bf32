//! STAC item model.
//!
//! An [`Item`] wraps the raw STAC Feature JSON and exposes typed accessors
//! over it. The raw document is kept intact so that table conversion and the
//! round-trip back to JSON preserve every property the item carried,
//! including extension properties this crate knows nothing about.

use chrono::{DateTime, Utc};
use geo::Geometry;
use serde_json::{Map, Value};
use stacq_result::{Error, Result};

/// A single STAC item (a GeoJSON Feature describing one asset).
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    value: Value,
}

impl Item {
    /// Wrap a parsed STAC item document.
    ///
    /// The document must be a JSON object of `"type": "Feature"` with a
    /// string `id`. Everything else is optional; missing properties become
    /// nulls during table conversion.
    pub fn from_value(value: Value) -> Result<Item> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::InvalidArgumentError("STAC item must be a JSON object".into()))?;
        match obj.get("type").and_then(Value::as_str) {
            Some("Feature") => {}
            other => {
                return Err(Error::InvalidArgumentError(format!(
                    "STAC item must have \"type\": \"Feature\", got {other:?}"
                )));
            }
        }
        if obj.get("id").and_then(Value::as_str).is_none() {
            return Err(Error::InvalidArgumentError(
                "STAC item is missing a string \"id\"".into(),
            ));
        }
        Ok(Item { value })
    }

    /// Parse an item from JSON text.
    pub fn from_json(input: &str) -> Result<Item> {
        Item::from_value(serde_json::from_str(input)?)
    }

    /// The item identifier.
    pub fn id(&self) -> &str {
        // Validated in `from_value`.
        self.value["id"].as_str().unwrap_or_default()
    }

    /// The collection this item belongs to, if any.
    pub fn collection(&self) -> Option<&str> {
        self.value.get("collection").and_then(Value::as_str)
    }

    /// The item geometry parsed into a typed shape.
    ///
    /// Items without geometry (or with an explicit GeoJSON `null`) yield
    /// `None`; such items are excluded by every spatial predicate but remain
    /// reachable through non-spatial ones.
    pub fn geometry(&self) -> Result<Option<Geometry<f64>>> {
        match self.value.get("geometry") {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => {
                let gj = geojson::Geometry::from_json_value(raw.clone())
                    .map_err(Error::geometry_parse)?;
                let geom = Geometry::<f64>::try_from(&gj).map_err(Error::geometry_parse)?;
                Ok(Some(geom))
            }
        }
    }

    /// The item's `properties.datetime`, when present and parseable.
    pub fn datetime(&self) -> Result<Option<DateTime<Utc>>> {
        match self.properties().and_then(|p| p.get("datetime")) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => {
                let parsed = DateTime::parse_from_rfc3339(text).map_err(|err| {
                    Error::InvalidArgumentError(format!("invalid item datetime {text:?}: {err}"))
                })?;
                Ok(Some(parsed.with_timezone(&Utc)))
            }
            Some(other) => Err(Error::InvalidArgumentError(format!(
                "item datetime must be an RFC 3339 string, got: {other}"
            ))),
        }
    }

    /// The item's property map, if present.
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.value.get("properties").and_then(Value::as_object)
    }

    /// Borrow the raw STAC Feature JSON.
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// Consume the item, returning the raw STAC Feature JSON.
    pub fn into_value(self) -> Value {
        self.value
    }
}

/// An ordered batch of STAC items (a GeoJSON FeatureCollection).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemCollection {
    items: Vec<Item>,
}

impl ItemCollection {
    /// Build a collection from already-parsed items.
    pub fn new(items: Vec<Item>) -> ItemCollection {
        ItemCollection { items }
    }

    /// Parse a GeoJSON FeatureCollection document.
    pub fn from_value(value: Value) -> Result<ItemCollection> {
        let obj = value.as_object().ok_or_else(|| {
            Error::InvalidArgumentError("item collection must be a JSON object".into())
        })?;
        match obj.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => {}
            other => {
                return Err(Error::InvalidArgumentError(format!(
                    "item collection must have \"type\": \"FeatureCollection\", got {other:?}"
                )));
            }
        }
        let features = obj
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::InvalidArgumentError("item collection is missing \"features\"".into())
            })?;
        let items = features
            .iter()
            .map(|f| Item::from_value(f.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(ItemCollection { items })
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Re-serialize as a GeoJSON FeatureCollection value.
    pub fn to_value(&self) -> Value {
        let features: Vec<Value> = self.items.iter().map(|i| i.as_value().clone()).collect();
        serde_json::json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }
}

impl IntoIterator for ItemCollection {
    type Item = Item;
    type IntoIter = std::vec::IntoIter<Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_item() -> Value {
        json!({
            "type": "Feature",
            "stac_version": "1.0.0",
            "id": "area-1-1-imagery",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]],
            },
            "properties": {
                "datetime": "2021-04-01T12:00:00Z",
                "platform": "SS02",
            },
            "collection": "area-1-1",
            "links": [],
            "assets": {},
        })
    }

    #[test]
    fn accessors_read_through_to_raw_json() {
        let item = Item::from_value(sample_item()).unwrap();
        assert_eq!(item.id(), "area-1-1-imagery");
        assert_eq!(item.collection(), Some("area-1-1"));
        assert!(matches!(
            item.geometry().unwrap(),
            Some(Geometry::Polygon(_))
        ));
        let dt = item.datetime().unwrap().unwrap();
        assert_eq!(dt.to_rfc3339(), "2021-04-01T12:00:00+00:00");
    }

    #[test]
    fn null_geometry_is_none_not_an_error() {
        let mut value = sample_item();
        value["geometry"] = Value::Null;
        let item = Item::from_value(value).unwrap();
        assert!(item.geometry().unwrap().is_none());
    }

    #[test]
    fn non_feature_documents_are_rejected() {
        let err = Item::from_value(json!({"type": "Catalog", "id": "x"})).unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentError(_)));
    }

    #[test]
    fn feature_collection_round_trips() {
        let collection = ItemCollection::from_value(json!({
            "type": "FeatureCollection",
            "features": [sample_item()],
        }))
        .unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.items()[0].id(), "area-1-1-imagery");
        let back = ItemCollection::from_value(collection.to_value()).unwrap();
        assert_eq!(back, collection);
    }
}
