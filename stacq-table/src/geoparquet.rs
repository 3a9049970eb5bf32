//! GeoParquet persistence for item tables.
//!
//! The geometry column is serialized as WKB and the file carries the
//! GeoParquet `geo` metadata block, so other GeoParquet readers can locate
//! and decode the geometry. Attribute columns round-trip unchanged,
//! including the field metadata that marks JSON-encoded columns.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BinaryArray, BinaryBuilder};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use geo::Geometry;
use geozero::wkb::Wkb;
use geozero::{CoordDimensions, ToGeo, ToWkb};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use stacq_result::{Error, Result};

use crate::table::ItemTable;
use crate::GEOMETRY_COLUMN;

/// File-metadata key defined by the GeoParquet specification.
const GEO_METADATA_KEY: &str = "geo";

/// Write a table to a GeoParquet file.
pub fn to_geoparquet(table: &ItemTable, path: impl AsRef<Path>) -> Result<()> {
    let mut wkb_builder = BinaryBuilder::new();
    for geometry in table.geometry() {
        match geometry {
            None => wkb_builder.append_null(),
            Some(geom) => {
                let bytes = geom
                    .to_wkb(CoordDimensions::xy())
                    .map_err(Error::geometry_parse)?;
                wkb_builder.append_value(&bytes);
            }
        }
    }

    let attribute_schema = table.schema();
    let mut fields: Vec<Field> = attribute_schema
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    fields.push(Field::new(GEOMETRY_COLUMN, DataType::Binary, true));

    let mut metadata = attribute_schema.metadata().clone();
    metadata.insert(GEO_METADATA_KEY.to_string(), geo_metadata());

    let mut columns: Vec<ArrayRef> = table.batch().columns().to_vec();
    columns.push(Arc::new(wkb_builder.finish()));

    let schema = Arc::new(Schema::new_with_metadata(fields, metadata));
    let batch = RecordBatch::try_new(Arc::clone(&schema), columns)?;

    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Read a table back from a GeoParquet file.
pub fn from_geoparquet(path: impl AsRef<Path>) -> Result<ItemTable> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = Arc::clone(builder.schema());
    let reader = builder.build()?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    let combined = concat_batches(&schema, &batches)?;

    let geometry_index = schema.index_of(GEOMETRY_COLUMN).map_err(|_| {
        Error::InvalidArgumentError(format!(
            "parquet file has no '{GEOMETRY_COLUMN}' column; not a stacq GeoParquet file"
        ))
    })?;
    let wkb = combined
        .column(geometry_index)
        .as_any()
        .downcast_ref::<BinaryArray>()
        .ok_or_else(|| {
            Error::InvalidArgumentError(format!(
                "'{GEOMETRY_COLUMN}' column is not WKB binary"
            ))
        })?;

    let mut geometry: Vec<Option<Geometry<f64>>> = Vec::with_capacity(wkb.len());
    for row in 0..wkb.len() {
        if wkb.is_null(row) {
            geometry.push(None);
        } else {
            let geom = Wkb(wkb.value(row)).to_geo().map_err(Error::geometry_parse)?;
            geometry.push(Some(geom));
        }
    }

    let mut fields: Vec<Field> = Vec::with_capacity(schema.fields().len() - 1);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len() - 1);
    for (idx, field) in schema.fields().iter().enumerate() {
        if idx == geometry_index {
            continue;
        }
        fields.push(field.as_ref().clone());
        columns.push(Arc::clone(combined.column(idx)));
    }
    let mut metadata = schema.metadata().clone();
    metadata.remove(GEO_METADATA_KEY);

    let attribute_schema = Arc::new(Schema::new_with_metadata(fields, metadata));
    let batch = RecordBatch::try_new(attribute_schema, columns)?;
    ItemTable::from_parts(batch, geometry)
}

fn geo_metadata() -> String {
    serde_json::json!({
        "version": "1.1.0",
        "primary_column": GEOMETRY_COLUMN,
        "columns": {
            GEOMETRY_COLUMN: {
                "encoding": "WKB",
                "geometry_types": [],
            },
        },
    })
    .to_string()
}
