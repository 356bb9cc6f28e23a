//! Page tree read-back
//!
//! Reads the page tree of an emitted document through its catalog, the way a
//! consuming reader would find it.

use lopdf::{Dictionary, Document, Object, ObjectId};
use crate::error::{Error, Result};

/// Facts read from the root `/Pages` object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTreeSummary {
    pub pages_id: ObjectId,
    /// The root's `/Count`
    pub count: usize,
    pub kids: Vec<ObjectId>,
}

/// Read `/Count` and `/Kids` from the root page tree
pub fn page_tree_summary(doc: &Document) -> Result<PageTreeSummary> {
    let catalog_id = reference(doc.trailer.get(b"Root").ok(), "Root in trailer")?;
    let catalog = dictionary(doc, catalog_id, "Catalog")?;

    let pages_id = reference(catalog.get(b"Pages").ok(), "Pages in catalog")?;
    let pages = dictionary(doc, pages_id, "Pages")?;

    let count = match pages.get(b"Count") {
        Ok(Object::Integer(n)) if *n >= 0 => *n as usize,
        _ => return Err(Error::InvalidPdf("Count is not a non-negative integer".to_string())),
    };

    let kids = match pages.get(b"Kids") {
        Ok(Object::Array(kids)) => kids
            .iter()
            .map(|kid| reference(Some(kid), "page reference in Kids"))
            .collect::<Result<Vec<ObjectId>>>()?,
        _ => return Err(Error::InvalidPdf("No Kids array in Pages".to_string())),
    };

    Ok(PageTreeSummary { pages_id, count, kids })
}

/// Count pages of serialized PDF bytes
pub fn count_pages(bytes: &[u8]) -> Result<usize> {
    let doc = Document::load_mem(bytes)?;
    Ok(page_tree_summary(&doc)?.count)
}

fn reference(object: Option<&Object>, what: &str) -> Result<ObjectId> {
    match object {
        Some(Object::Reference(id)) => Ok(*id),
        Some(_) => Err(Error::InvalidPdf(format!("{} is not a reference", what))),
        None => Err(Error::InvalidPdf(format!("No {}", what))),
    }
}

fn dictionary<'a>(doc: &'a Document, id: ObjectId, what: &str) -> Result<&'a Dictionary> {
    match doc.get_object(id)? {
        Object::Dictionary(dict) => Ok(dict),
        _ => Err(Error::InvalidPdf(format!("{} is not a dictionary", what))),
    }
}
