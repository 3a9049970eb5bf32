//! Static STAC catalog traversal.
//!
//! A [`Catalog`] is a read-only view over a STAC `Catalog` or `Collection`
//! document on disk. Items are gathered by a recursive depth-first walk of
//! the document's `child` and `item` links, in the order the links appear,
//! resolving relative `href`s against each document's own location.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use stacq_result::{Error, Result};

use crate::item::Item;

/// A parsed STAC catalog or collection document plus the directory its
/// relative links resolve against.
#[derive(Debug, Clone)]
pub struct Catalog {
    document: Value,
    base: PathBuf,
}

impl Catalog {
    /// Read a STAC `catalog.json` or `collection.json` from disk.
    pub fn read_file(path: impl AsRef<Path>) -> Result<Catalog> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        Catalog::from_value(document, base)
    }

    /// Wrap an already-parsed catalog document.
    ///
    /// `base` is the directory used to resolve the document's relative link
    /// `href`s.
    pub fn from_value(document: Value, base: impl Into<PathBuf>) -> Result<Catalog> {
        let kind = document
            .as_object()
            .and_then(|o| o.get("type"))
            .and_then(Value::as_str);
        match kind {
            Some("Catalog") | Some("Collection") => Ok(Catalog {
                document,
                base: base.into(),
            }),
            other => Err(Error::InvalidArgumentError(format!(
                "expected a STAC Catalog or Collection document, got \"type\": {other:?}"
            ))),
        }
    }

    /// The catalog identifier.
    pub fn id(&self) -> Option<&str> {
        self.document.get("id").and_then(Value::as_str)
    }

    /// Borrow the raw catalog document.
    pub fn as_value(&self) -> &Value {
        &self.document
    }

    /// Collect every item reachable from this catalog, depth-first, in link
    /// order. The catalog itself is never mutated.
    pub fn items(&self) -> Result<Vec<Item>> {
        let mut out = Vec::new();
        collect_items(&self.document, &self.base, &mut out)?;
        Ok(out)
    }
}

fn collect_items(document: &Value, base: &Path, out: &mut Vec<Item>) -> Result<()> {
    let links = document
        .get("links")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for link in links {
        let rel = link.get("rel").and_then(Value::as_str).unwrap_or_default();
        if rel != "child" && rel != "item" {
            continue;
        }
        let href = link.get("href").and_then(Value::as_str).ok_or_else(|| {
            Error::InvalidArgumentError(format!("catalog {rel:?} link is missing \"href\""))
        })?;
        let target = resolve_href(base, href);
        let text = fs::read_to_string(&target)?;
        let linked: Value = serde_json::from_str(&text)?;

        if rel == "item" {
            out.push(Item::from_value(linked)?);
        } else {
            let child_base = target.parent().unwrap_or(base).to_path_buf();
            collect_items(&linked, &child_base, out)?;
        }
    }
    Ok(())
}

fn resolve_href(base: &Path, href: &str) -> PathBuf {
    let href = href.strip_prefix("./").unwrap_or(href);
    if Path::new(href).is_absolute() {
        PathBuf::from(href)
    } else {
        base.join(href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_item_documents() {
        let err = Catalog::from_value(
            serde_json::json!({"type": "Feature", "id": "x"}),
            PathBuf::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentError(_)));
    }

    #[test]
    fn relative_hrefs_resolve_against_base() {
        let base = Path::new("/tmp/catalog");
        assert_eq!(
            resolve_href(base, "./area-1-1/collection.json"),
            PathBuf::from("/tmp/catalog/area-1-1/collection.json")
        );
        assert_eq!(
            resolve_href(base, "item.json"),
            PathBuf::from("/tmp/catalog/item.json")
        );
    }
}
