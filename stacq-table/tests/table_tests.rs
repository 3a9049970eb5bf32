use arrow::datatypes::{DataType, TimeUnit};
use serde_json::{json, Value};
use stacq_table::{from_geoparquet, to_geoparquet, Item, ItemTable, DATETIME_COLUMN};

fn item(id: &str, collection: &str, extra_properties: Value, lon: f64, lat: f64) -> Item {
    let mut properties = json!({
        "datetime": "2021-04-01T12:00:00Z",
    });
    if let (Some(base), Some(extra)) = (properties.as_object_mut(), extra_properties.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    Item::from_value(json!({
        "type": "Feature",
        "stac_version": "1.0.0",
        "id": id,
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [lon, lat],
                [lon + 1.0, lat],
                [lon + 1.0, lat + 1.0],
                [lon, lat + 1.0],
                [lon, lat],
            ]],
        },
        "bbox": [lon, lat, lon + 1.0, lat + 1.0],
        "properties": properties,
        "links": [{"rel": "self", "href": format!("./{id}.json")}],
        "assets": {"image": {"href": format!("./{id}.tif"), "type": "image/tiff"}},
        "collection": collection,
    }))
    .unwrap()
}

#[test]
fn round_trip_preserves_items() {
    let items = vec![
        item("a-1", "area-1", json!({"platform": "SS02", "eo:cloud_cover": 12.5}), 0.0, 0.0),
        item("a-2", "area-1", json!({"platform": "SSC1"}), 2.0, 2.0),
        item("b-1", "area-2", json!({"platform": "101c", "view:azimuth": 100.5}), 4.0, 4.0),
    ];

    let table = ItemTable::from_items(&items).unwrap();
    assert_eq!(table.num_rows(), 3);

    let rebuilt = table.to_items().unwrap();
    assert_eq!(rebuilt.len(), items.len());
    for (original, back) in items.iter().zip(&rebuilt) {
        assert_eq!(back.id(), original.id());
        assert_eq!(back.collection(), original.collection());
        assert_eq!(
            back.as_value()["geometry"], original.as_value()["geometry"],
            "geometry must survive the round trip"
        );
        assert_eq!(
            back.as_value()["properties"], original.as_value()["properties"],
            "all flattened properties must survive the round trip"
        );
        assert_eq!(back.as_value()["assets"], original.as_value()["assets"]);
        assert_eq!(back.as_value()["links"], original.as_value()["links"]);
        assert_eq!(back.as_value()["bbox"], original.as_value()["bbox"]);
    }
}

#[test]
fn missing_properties_widen_to_null_columns() {
    let items = vec![
        item("a-1", "c", json!({"eo:cloud_cover": 12.5}), 0.0, 0.0),
        item("a-2", "c", json!({}), 2.0, 2.0),
    ];
    let table = ItemTable::from_items(&items).unwrap();

    let column = table.column("eo:cloud_cover").expect("column must exist");
    assert_eq!(column.null_count(), 1);

    // The item without the property reconstructs without it.
    let rebuilt = table.to_items().unwrap();
    assert!(rebuilt[1]
        .properties()
        .map(|p| !p.contains_key("eo:cloud_cover"))
        .unwrap_or(true));
}

#[test]
fn mixed_int_and_float_widen_to_float() {
    let items = vec![
        item("a-1", "c", json!({"view:azimuth": 100}), 0.0, 0.0),
        item("a-2", "c", json!({"view:azimuth": 250.5}), 2.0, 2.0),
    ];
    let table = ItemTable::from_items(&items).unwrap();
    let schema = table.schema();
    let field = schema.field_with_name("view:azimuth").unwrap();
    assert_eq!(field.data_type(), &DataType::Float64);
}

#[test]
fn datetime_becomes_a_typed_timestamp_column() {
    let items = vec![item("a-1", "c", json!({}), 0.0, 0.0)];
    let table = ItemTable::from_items(&items).unwrap();
    let schema = table.schema();
    let field = schema.field_with_name(DATETIME_COLUMN).unwrap();
    assert!(matches!(
        field.data_type(),
        DataType::Timestamp(TimeUnit::Microsecond, Some(_))
    ));
}

#[test]
fn item_without_geometry_gets_a_null_shape() {
    let bare = Item::from_value(json!({
        "type": "Feature",
        "id": "no-geom",
        "properties": {"datetime": "2021-04-01T12:00:00Z"},
    }))
    .unwrap();
    let table = ItemTable::from_items(&[bare]).unwrap();
    assert_eq!(table.num_rows(), 1);
    assert!(table.geometry()[0].is_none());

    let rebuilt = table.to_items().unwrap();
    assert_eq!(rebuilt[0].as_value()["geometry"], Value::Null);
}

#[test]
fn nested_properties_flatten_and_unflatten() {
    let items = vec![item(
        "a-1",
        "c",
        json!({"extra": {"nested": {"deep": true}, "count": 3}}),
        0.0,
        0.0,
    )];
    let table = ItemTable::from_items(&items).unwrap();
    assert!(table.has_column("extra.nested.deep"));
    assert!(table.has_column("extra.count"));

    let rebuilt = table.to_items().unwrap();
    assert_eq!(
        rebuilt[0].as_value()["properties"]["extra"],
        json!({"nested": {"deep": true}, "count": 3})
    );
}

#[test]
fn geoparquet_round_trip() {
    let items = vec![
        item("a-1", "area-1", json!({"platform": "SS02"}), 0.0, 0.0),
        item("a-2", "area-1", json!({"platform": "SSC1"}), 2.0, 2.0),
    ];
    let table = ItemTable::from_items(&items).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("items.parquet");
    to_geoparquet(&table, &path).unwrap();

    let loaded = from_geoparquet(&path).unwrap();
    assert_eq!(loaded.num_rows(), table.num_rows());
    assert_eq!(loaded.geometry(), table.geometry());
    assert_eq!(
        loaded.to_items().unwrap(),
        table.to_items().unwrap(),
        "items reconstructed from parquet must match the in-memory table"
    );
}
