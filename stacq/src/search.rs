//! Search execution over catalogs, item lists, and tables.

use arrow::array::{Array, BooleanArray, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, TimeUnit};
use geo::{Geometry, Intersects};
use rustc_hash::FxHashSet;
use stacq_result::{Error, Result};
use stacq_table::{
    Catalog, Item, ItemCollection, ItemTable, COLLECTION_COLUMN, DATETIME_COLUMN, ID_COLUMN,
};

use crate::eval::{ArrowEvaluator, FilterEvaluator};
use crate::options::{SearchOptions, SearchParams};
use crate::result::SearchResult;

/// Anything a search can run against.
///
/// Catalogs are walked into a table first; a pre-built [`ItemTable`] (for
/// example, one loaded from GeoParquet) is searched as-is.
#[derive(Debug, Clone)]
pub enum SearchSource {
    Catalog(Catalog),
    Items(Vec<Item>),
    Table(ItemTable),
}

impl SearchSource {
    fn into_table(self) -> Result<ItemTable> {
        match self {
            SearchSource::Catalog(catalog) => ItemTable::from_items(&catalog.items()?),
            SearchSource::Items(items) => ItemTable::from_items(&items),
            SearchSource::Table(table) => Ok(table),
        }
    }
}

impl From<Catalog> for SearchSource {
    fn from(catalog: Catalog) -> Self {
        SearchSource::Catalog(catalog)
    }
}

impl From<Vec<Item>> for SearchSource {
    fn from(items: Vec<Item>) -> Self {
        SearchSource::Items(items)
    }
}

impl From<ItemCollection> for SearchSource {
    fn from(collection: ItemCollection) -> Self {
        SearchSource::Items(collection.into_items())
    }
}

impl From<ItemTable> for SearchSource {
    fn from(table: ItemTable) -> Self {
        SearchSource::Table(table)
    }
}

/// Run a search with the built-in Arrow evaluator.
///
/// Options combine with logical AND; an absent option leaves its dimension
/// unconstrained, so empty options return every item. All option validation
/// happens before the source is scanned.
pub fn search(source: impl Into<SearchSource>, options: SearchOptions) -> Result<SearchResult> {
    search_with_evaluator(source, options, &ArrowEvaluator)
}

/// Run a search with a caller-supplied filter evaluator.
pub fn search_with_evaluator(
    source: impl Into<SearchSource>,
    options: SearchOptions,
    evaluator: &dyn FilterEvaluator,
) -> Result<SearchResult> {
    let params = options.normalize()?;
    let table = source.into().into_table()?;

    if let Some(filter) = &params.filter {
        for column in filter.referenced_columns() {
            if !table.has_column(column) {
                return Err(Error::UnknownColumn(column.to_string()));
            }
        }
    }

    let mask = build_mask(&table, &params, evaluator)?;
    Ok(SearchResult::new(table.filter(&mask)?))
}

fn build_mask(
    table: &ItemTable,
    params: &SearchParams,
    evaluator: &dyn FilterEvaluator,
) -> Result<BooleanArray> {
    let rows = table.num_rows();
    let mut mask = vec![true; rows];

    if let Some(ids) = &params.ids {
        intersect(&mut mask, &membership_mask(table, ID_COLUMN, ids)?);
    }
    if let Some(collections) = &params.collections {
        intersect(
            &mut mask,
            &membership_mask(table, COLLECTION_COLUMN, collections)?,
        );
    }
    if let Some(query) = &params.spatial {
        intersect(&mut mask, &spatial_mask(table, query));
    }
    if let Some((start, end)) = params.datetime {
        intersect(&mut mask, &datetime_mask(table, start, end)?);
    }
    if let Some(filter) = &params.filter {
        let filter_mask = evaluator.evaluate(filter, table)?;
        if filter_mask.len() != rows {
            return Err(Error::Internal(format!(
                "filter evaluator produced {} mask entries for {rows} rows",
                filter_mask.len()
            )));
        }
        let as_vec: Vec<bool> = (0..rows).map(|row| filter_mask.value(row)).collect();
        intersect(&mut mask, &as_vec);
    }

    Ok(BooleanArray::from(mask))
}

fn intersect(mask: &mut [bool], other: &[bool]) {
    for (slot, keep) in mask.iter_mut().zip(other) {
        *slot = *slot && *keep;
    }
}

/// Rows whose string column value is in the wanted set; null values never
/// match.
fn membership_mask(table: &ItemTable, column: &str, wanted: &FxHashSet<String>) -> Result<Vec<bool>> {
    let values = table
        .column(column)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::Internal(format!("table is missing its '{column}' column")))?;
    Ok((0..table.num_rows())
        .map(|row| !values.is_null(row) && wanted.contains(values.value(row)))
        .collect())
}

fn spatial_mask(table: &ItemTable, query: &Geometry<f64>) -> Vec<bool> {
    table
        .geometry()
        .iter()
        .map(|geom| match geom {
            Some(shape) => shape.intersects(query),
            None => false,
        })
        .collect()
}

/// Rows whose datetime falls inside the closed `[start, end]` range. A table
/// without a datetime column (or with an untyped one) matches nothing, since
/// no row can satisfy the constraint.
fn datetime_mask(table: &ItemTable, start: i64, end: i64) -> Result<Vec<bool>> {
    let rows = table.num_rows();
    let Some(column) = table.column(DATETIME_COLUMN) else {
        return Ok(vec![false; rows]);
    };
    if !matches!(
        column.data_type(),
        DataType::Timestamp(TimeUnit::Microsecond, _)
    ) {
        return Ok(vec![false; rows]);
    }
    let values = column
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .ok_or_else(|| Error::Internal("datetime column is not a timestamp array".into()))?;
    Ok((0..rows)
        .map(|row| {
            if values.is_null(row) {
                return false;
            }
            let at = values.value(row);
            start <= at && at <= end
        })
        .collect())
}
