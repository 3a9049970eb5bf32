//! The result view over a filtered table.

use serde_json::Value;
use stacq_result::Result;
use stacq_table::{Item, ItemCollection, ItemTable};

/// The outcome of a search: the surviving rows, in source order.
#[derive(Debug, Clone)]
pub struct SearchResult {
    table: ItemTable,
}

impl SearchResult {
    pub(crate) fn new(table: ItemTable) -> SearchResult {
        SearchResult { table }
    }

    /// The number of matched items.
    pub fn matched(&self) -> usize {
        self.table.num_rows()
    }

    /// Borrow the filtered table, for further table-level work.
    pub fn table(&self) -> &ItemTable {
        &self.table
    }

    pub fn into_table(self) -> ItemTable {
        self.table
    }

    /// Reconstruct the matches as a GeoJSON FeatureCollection of items.
    pub fn item_collection(&self) -> Result<ItemCollection> {
        Ok(ItemCollection::new(self.table.to_items()?))
    }

    /// Iterate over the matched items. The iterator borrows the result, so
    /// it can be restarted by calling `items()` again.
    pub fn items(&self) -> Items<'_> {
        Items {
            table: &self.table,
            row: 0,
        }
    }

    /// The matched items as raw JSON documents.
    pub fn items_as_values(&self) -> Result<Vec<Value>> {
        Ok(self
            .table
            .to_items()?
            .into_iter()
            .map(Item::into_value)
            .collect())
    }
}

/// Row-by-row item iterator over a search result.
#[derive(Debug, Clone)]
pub struct Items<'a> {
    table: &'a ItemTable,
    row: usize,
}

impl Iterator for Items<'_> {
    type Item = Result<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.row >= self.table.num_rows() {
            return None;
        }
        let item = self.table.item_at(self.row);
        self.row += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.num_rows() - self.row;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Items<'_> {}
