//! The flat geospatial item table.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, BooleanBuilder, Float64Array, Float64Builder, Int64Array,
    Int64Builder, StringArray, StringBuilder, TimestampMicrosecondArray,
    TimestampMicrosecondBuilder,
};
use arrow::compute::filter_record_batch;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, SecondsFormat, Utc};
use geo::Geometry;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use stacq_result::{Error, Result};

use crate::inference::{flatten_properties, infer_value_type, unflatten_properties, ColumnType};
use crate::item::Item;
use crate::{
    COLLECTION_COLUMN, GEOMETRY_COLUMN, ID_COLUMN, JSON_ENCODING_KEY, JSON_ENCODING_VALUE,
    TOP_LEVEL_KEY,
};

/// Top-level item fields with dedicated handling; everything else at the top
/// level passes through as a JSON-encoded column.
const HANDLED_TOP_LEVEL: [&str; 5] = ["type", "id", "collection", "geometry", "properties"];

/// Top-level keys that precede `id` in the canonical STAC item layout.
const RECONSTRUCT_HEAD: [&str; 2] = ["stac_version", "stac_extensions"];

/// One row per STAC item: attribute columns in an Arrow [`RecordBatch`] and
/// the parsed geometries in a parallel column of typed shapes.
///
/// Row order is stable and equals catalog traversal order (or the input
/// order, if the items were supplied directly). The table is immutable;
/// filtering produces a new table.
#[derive(Debug, Clone)]
pub struct ItemTable {
    batch: RecordBatch,
    geometry: Vec<Option<Geometry<f64>>>,
}

#[derive(Debug, Clone)]
struct ColumnSpec {
    name: String,
    ty: Option<ColumnType>,
    top_level: bool,
}

impl ItemTable {
    /// Convert items into a table using two-pass schema widening: collect
    /// the union of flattened property keys and widen a column type per key,
    /// then build the arrays with nulls for missing values.
    pub fn from_items(items: &[Item]) -> Result<ItemTable> {
        let specs = collect_columns(items)?;

        let mut geometry = Vec::with_capacity(items.len());
        for item in items {
            geometry.push(item.geometry()?);
        }

        let mut id_builder = StringBuilder::new();
        let mut collection_builder = StringBuilder::new();
        let mut builders: Vec<ColumnBuilder> = specs
            .iter()
            .map(|spec| ColumnBuilder::new(spec.ty.unwrap_or(ColumnType::String)))
            .collect();

        for item in items {
            id_builder.append_value(item.id());
            collection_builder.append_option(item.collection());

            let values = flattened_values(item);
            for (spec, builder) in specs.iter().zip(builders.iter_mut()) {
                builder.append(&spec.name, values.get(spec.name.as_str()))?;
            }
        }

        let mut fields = vec![
            Field::new(ID_COLUMN, DataType::Utf8, false),
            Field::new(COLLECTION_COLUMN, DataType::Utf8, true),
        ];
        let mut arrays: Vec<ArrayRef> = vec![
            Arc::new(id_builder.finish()),
            Arc::new(collection_builder.finish()),
        ];
        for (spec, builder) in specs.into_iter().zip(builders) {
            let (array, data_type) = builder.finish();
            let mut metadata = HashMap::new();
            if matches!(spec.ty, Some(ColumnType::Json)) {
                metadata.insert(JSON_ENCODING_KEY.to_string(), JSON_ENCODING_VALUE.to_string());
            }
            if spec.top_level {
                metadata.insert(TOP_LEVEL_KEY.to_string(), "true".to_string());
            }
            fields.push(Field::new(&spec.name, data_type, true).with_metadata(metadata));
            arrays.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema, arrays)?;
        Ok(ItemTable { batch, geometry })
    }

    /// Assemble a table from an attribute batch and a matching geometry
    /// column.
    pub fn from_parts(batch: RecordBatch, geometry: Vec<Option<Geometry<f64>>>) -> Result<ItemTable> {
        if batch.num_rows() != geometry.len() {
            return Err(Error::InvalidArgumentError(format!(
                "geometry column has {} entries for a batch of {} rows",
                geometry.len(),
                batch.num_rows()
            )));
        }
        Ok(ItemTable { batch, geometry })
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Borrow the attribute batch (geometry is held separately).
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// The parsed geometry column, one entry per row; `None` marks items
    /// without geometry.
    pub fn geometry(&self) -> &[Option<Geometry<f64>>] {
        &self.geometry
    }

    /// Whether a column (including the logical geometry column) exists.
    pub fn has_column(&self, name: &str) -> bool {
        name == GEOMETRY_COLUMN || self.batch.schema().column_with_name(name).is_some()
    }

    /// Borrow an attribute column by name.
    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    /// Apply a row mask, keeping rows where the mask is `true`. The filter
    /// is stable: surviving rows keep their relative order.
    pub fn filter(&self, mask: &BooleanArray) -> Result<ItemTable> {
        if mask.len() != self.num_rows() {
            return Err(Error::InvalidArgumentError(format!(
                "row mask has {} entries for a table of {} rows",
                mask.len(),
                self.num_rows()
            )));
        }
        let batch = filter_record_batch(&self.batch, mask)?;
        let geometry = self
            .geometry
            .iter()
            .zip(mask.iter())
            .filter(|(_, keep)| matches!(keep, Some(true)))
            .map(|(geom, _)| geom.clone())
            .collect();
        Ok(ItemTable { batch, geometry })
    }

    /// Reconstruct the STAC item for one row.
    pub fn item_at(&self, row: usize) -> Result<Item> {
        if row >= self.num_rows() {
            return Err(Error::InvalidArgumentError(format!(
                "row {row} out of bounds for a table of {} rows",
                self.num_rows()
            )));
        }

        let schema = self.batch.schema();
        let mut top_level: Map<String, Value> = Map::new();
        let mut property_pairs: Vec<(String, Value)> = Vec::new();

        for (idx, field) in schema.fields().iter().enumerate() {
            let name = field.name().as_str();
            if name == ID_COLUMN || name == COLLECTION_COLUMN {
                continue;
            }
            let Some(value) = self.value_at(idx, row)? else {
                continue;
            };
            if field.metadata().get(TOP_LEVEL_KEY).map(String::as_str) == Some("true") {
                top_level.insert(name.to_string(), value);
            } else {
                property_pairs.push((name.to_string(), value));
            }
        }

        let mut out = Map::new();
        out.insert("type".to_string(), Value::String("Feature".to_string()));
        for key in RECONSTRUCT_HEAD {
            if let Some(value) = top_level.remove(key) {
                out.insert(key.to_string(), value);
            }
        }
        out.insert("id".to_string(), Value::String(self.id_at(row)?.to_string()));
        out.insert("geometry".to_string(), geometry_value(&self.geometry[row])?);
        if let Some(bbox) = top_level.remove("bbox") {
            out.insert("bbox".to_string(), bbox);
        }
        out.insert(
            "properties".to_string(),
            Value::Object(unflatten_properties(property_pairs)),
        );
        // Remaining passthrough fields (assets and anything unrecognized).
        for (key, value) in top_level {
            out.insert(key, value);
        }
        if let Some(collection) = self.collection_at(row)? {
            out.insert(
                "collection".to_string(),
                Value::String(collection.to_string()),
            );
        }

        Item::from_value(Value::Object(out))
    }

    /// Reconstruct every row as a STAC item, in row order.
    pub fn to_items(&self) -> Result<Vec<Item>> {
        (0..self.num_rows()).map(|row| self.item_at(row)).collect()
    }

    fn id_at(&self, row: usize) -> Result<&str> {
        let ids = self
            .column(ID_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| Error::Internal("table is missing its id column".into()))?;
        Ok(ids.value(row))
    }

    fn collection_at(&self, row: usize) -> Result<Option<&str>> {
        let collections = self
            .column(COLLECTION_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| Error::Internal("table is missing its collection column".into()))?;
        if collections.is_null(row) {
            Ok(None)
        } else {
            Ok(Some(collections.value(row)))
        }
    }

    /// Decode one cell back into a JSON value, `None` for nulls.
    fn value_at(&self, column: usize, row: usize) -> Result<Option<Value>> {
        let schema = self.batch.schema();
        let field = schema.field(column);
        let array = self.batch.column(column);
        if array.is_null(row) {
            return Ok(None);
        }

        let json_encoded =
            field.metadata().get(JSON_ENCODING_KEY).map(String::as_str) == Some(JSON_ENCODING_VALUE);

        let value = match field.data_type() {
            DataType::Utf8 => {
                let values = downcast::<StringArray>(array, field.name())?;
                if json_encoded {
                    serde_json::from_str(values.value(row))?
                } else {
                    Value::String(values.value(row).to_string())
                }
            }
            DataType::Int64 => {
                let values = downcast::<Int64Array>(array, field.name())?;
                Value::from(values.value(row))
            }
            DataType::Float64 => {
                let values = downcast::<Float64Array>(array, field.name())?;
                serde_json::Number::from_f64(values.value(row))
                    .map(Value::Number)
                    .ok_or_else(|| {
                        Error::Internal(format!(
                            "non-finite float in column '{}' cannot round-trip to JSON",
                            field.name()
                        ))
                    })?
            }
            DataType::Boolean => {
                let values = downcast::<BooleanArray>(array, field.name())?;
                Value::from(values.value(row))
            }
            DataType::Timestamp(TimeUnit::Microsecond, _) => {
                let values = downcast::<TimestampMicrosecondArray>(array, field.name())?;
                Value::String(micros_to_rfc3339(values.value(row))?)
            }
            other => {
                return Err(Error::Internal(format!(
                    "unsupported column type {other:?} in column '{}'",
                    field.name()
                )));
            }
        };
        Ok(Some(value))
    }
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, column: &str) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::Internal(format!("unexpected array type in column '{column}'")))
}

fn geometry_value(geometry: &Option<Geometry<f64>>) -> Result<Value> {
    match geometry {
        None => Ok(Value::Null),
        Some(geom) => {
            let gj = geojson::Geometry::new(geojson::Value::from(geom));
            Ok(serde_json::to_value(&gj)?)
        }
    }
}

/// Pass 1: the union of columns across all items, in first-seen order, with
/// widened types.
fn collect_columns(items: &[Item]) -> Result<Vec<ColumnSpec>> {
    let mut order: Vec<String> = Vec::new();
    let mut specs: FxHashMap<String, (Option<ColumnType>, bool)> = FxHashMap::default();

    let mut register = |name: &str, ty: Option<ColumnType>, top_level: bool| -> Result<()> {
        match specs.get_mut(name) {
            None => {
                order.push(name.to_string());
                specs.insert(name.to_string(), (ty, top_level));
            }
            Some((existing_ty, existing_top)) => {
                if *existing_top != top_level {
                    return Err(Error::InvalidArgumentError(format!(
                        "column name collision between a property and a top-level \
                         item field: '{name}'"
                    )));
                }
                *existing_ty = match (*existing_ty, ty) {
                    (None, t) | (t, None) => t,
                    (Some(a), Some(b)) => Some(a.widen(b)),
                };
            }
        }
        Ok(())
    };

    for item in items {
        let obj = item
            .as_value()
            .as_object()
            .ok_or_else(|| Error::Internal("item document is not an object".into()))?;

        for (key, value) in obj {
            if HANDLED_TOP_LEVEL.contains(&key.as_str()) {
                continue;
            }
            let ty = (!value.is_null()).then_some(ColumnType::Json);
            register(key, ty, true)?;
        }

        if let Some(properties) = item.properties() {
            for (column, value) in flatten_properties(properties) {
                register(&column, infer_value_type(&column, &value), false)?;
            }
        }
    }

    Ok(order
        .into_iter()
        .map(|name| {
            let (ty, top_level) = specs[&name];
            ColumnSpec {
                name,
                ty,
                top_level,
            }
        })
        .collect())
}

/// Pass 2 helper: one item's cell values keyed by column name.
fn flattened_values(item: &Item) -> FxHashMap<String, Value> {
    let mut out = FxHashMap::default();
    if let Some(obj) = item.as_value().as_object() {
        for (key, value) in obj {
            if !HANDLED_TOP_LEVEL.contains(&key.as_str()) && !value.is_null() {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    if let Some(properties) = item.properties() {
        for (column, value) in flatten_properties(properties) {
            out.insert(column, value);
        }
    }
    out
}

enum ColumnBuilder {
    Int(Int64Builder),
    Float(Float64Builder),
    Bool(BooleanBuilder),
    Str(StringBuilder),
    Timestamp(TimestampMicrosecondBuilder),
    Json(StringBuilder),
}

impl ColumnBuilder {
    fn new(ty: ColumnType) -> ColumnBuilder {
        match ty {
            ColumnType::Int => ColumnBuilder::Int(Int64Builder::new()),
            ColumnType::Float => ColumnBuilder::Float(Float64Builder::new()),
            ColumnType::Bool => ColumnBuilder::Bool(BooleanBuilder::new()),
            ColumnType::String => ColumnBuilder::Str(StringBuilder::new()),
            ColumnType::Timestamp => ColumnBuilder::Timestamp(TimestampMicrosecondBuilder::new()),
            ColumnType::Json => ColumnBuilder::Json(StringBuilder::new()),
        }
    }

    fn append(&mut self, column: &str, value: Option<&Value>) -> Result<()> {
        let value = match value {
            None | Some(Value::Null) => {
                self.append_null();
                return Ok(());
            }
            Some(value) => value,
        };
        match self {
            ColumnBuilder::Int(b) => b.append_value(value.as_i64().ok_or_else(|| {
                Error::Internal(format!("expected an integer in column '{column}'"))
            })?),
            ColumnBuilder::Float(b) => b.append_value(value.as_f64().ok_or_else(|| {
                Error::Internal(format!("expected a number in column '{column}'"))
            })?),
            ColumnBuilder::Bool(b) => b.append_value(value.as_bool().ok_or_else(|| {
                Error::Internal(format!("expected a boolean in column '{column}'"))
            })?),
            ColumnBuilder::Str(b) => b.append_value(value.as_str().ok_or_else(|| {
                Error::Internal(format!("expected a string in column '{column}'"))
            })?),
            ColumnBuilder::Timestamp(b) => {
                let text = value.as_str().ok_or_else(|| {
                    Error::InvalidArgumentError(format!(
                        "expected an RFC 3339 string in column '{column}'"
                    ))
                })?;
                b.append_value(rfc3339_to_micros(text)?);
            }
            ColumnBuilder::Json(b) => b.append_value(serde_json::to_string(value)?),
        }
        Ok(())
    }

    fn append_null(&mut self) {
        match self {
            ColumnBuilder::Int(b) => b.append_null(),
            ColumnBuilder::Float(b) => b.append_null(),
            ColumnBuilder::Bool(b) => b.append_null(),
            ColumnBuilder::Str(b) => b.append_null(),
            ColumnBuilder::Timestamp(b) => b.append_null(),
            ColumnBuilder::Json(b) => b.append_null(),
        }
    }

    fn finish(self) -> (ArrayRef, DataType) {
        match self {
            ColumnBuilder::Int(mut b) => (Arc::new(b.finish()), DataType::Int64),
            ColumnBuilder::Float(mut b) => (Arc::new(b.finish()), DataType::Float64),
            ColumnBuilder::Bool(mut b) => (Arc::new(b.finish()), DataType::Boolean),
            ColumnBuilder::Str(mut b) | ColumnBuilder::Json(mut b) => {
                (Arc::new(b.finish()), DataType::Utf8)
            }
            ColumnBuilder::Timestamp(mut b) => {
                let array = b.finish().with_timezone("UTC");
                (
                    Arc::new(array),
                    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                )
            }
        }
    }
}

/// Parse an RFC 3339 timestamp into UTC microseconds.
pub fn rfc3339_to_micros(text: &str) -> Result<i64> {
    let parsed = DateTime::parse_from_rfc3339(text).map_err(|err| {
        Error::InvalidArgumentError(format!("invalid timestamp {text:?}: {err}"))
    })?;
    Ok(parsed.with_timezone(&Utc).timestamp_micros())
}

/// Render UTC microseconds as an RFC 3339 timestamp (`Z` suffix, fractional
/// seconds only when nonzero).
pub fn micros_to_rfc3339(micros: i64) -> Result<String> {
    let dt = DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| Error::Internal(format!("timestamp {micros} out of range")))?;
    Ok(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}
