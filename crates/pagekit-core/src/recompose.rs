//! Page copying
//!
//! Builds a new document out of pages picked from one or more sources.
//!
//! The algorithm:
//! 1. Import each distinct source once, offsetting its object IDs past the
//!    destination's current maximum to avoid conflicts
//! 2. For every picked page, materialize attributes it inherits from its
//!    old page tree, point it at the new `Pages` root, and append it to Kids
//!    (a page picked twice gets a second page object sharing its content)
//! 3. Null out references to pages that were not picked (link
//!    destinations, annotation `/P` entries) so they cannot keep the old
//!    page tree alive
//! 4. Write a fresh catalog, prune everything no longer reachable
//! 5. Compress and serialize

use std::collections::BTreeSet;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::document::{OutputDocument, SourceDocument};
use crate::error::{PageKitError, Result};
use crate::page_set::PageIndex;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Pages to copy from one source, in output order.
#[derive(Debug, Clone, Copy)]
pub struct PagePick<'a> {
    pub source: &'a SourceDocument,
    pub pages: &'a [PageIndex],
}

impl<'a> PagePick<'a> {
    pub fn new(source: &'a SourceDocument, pages: &'a [PageIndex]) -> Self {
        Self { source, pages }
    }
}

struct Imported<'a> {
    source: &'a SourceDocument,
    id_offset: u32,
}

/// Copy the picked pages, in order, into a new document.
///
/// Indices are trusted; an index the source does not have is reported as a
/// corrupt source rather than a validation error.
pub fn recompose(picks: &[PagePick<'_>]) -> Result<OutputDocument> {
    let version = picks
        .iter()
        .map(|pick| pick.source.version())
        .max()
        .unwrap_or("1.7");
    let mut dest = Document::with_version(version);
    let pages_id = dest.new_object_id();

    let mut imported: Vec<Imported<'_>> = Vec::new();
    let mut used: BTreeSet<ObjectId> = BTreeSet::new();
    let mut kids: Vec<Object> = Vec::new();

    for pick in picks {
        let id_offset = match imported
            .iter()
            .find(|entry| std::ptr::eq(entry.source, pick.source))
        {
            Some(entry) => entry.id_offset,
            None => {
                let id_offset = import_objects(&mut dest, pick.source.document());
                imported.push(Imported {
                    source: pick.source,
                    id_offset,
                });
                id_offset
            }
        };

        for &page in pick.pages {
            let source_page_id = pick.source.page_id(page.offset()).ok_or_else(|| {
                PageKitError::CorruptSource(format!(
                    "page {} not found (document has {} pages)",
                    page,
                    pick.source.page_count()
                ))
            })?;

            let mut page_dict = pick
                .source
                .document()
                .get_dictionary(source_page_id)
                .map_err(|e| {
                    PageKitError::CorruptSource(format!("page {} is unreadable: {}", page, e))
                })?
                .clone();
            for (key, value) in inherited_attributes(pick.source.document(), source_page_id) {
                page_dict.set(key, value);
            }
            let mut page_dict = remap_dictionary(page_dict, id_offset);
            page_dict.set("Parent", Object::Reference(pages_id));

            let dest_page_id = (source_page_id.0 + id_offset, source_page_id.1);
            let dest_page_id = if used.contains(&dest_page_id) {
                dest.add_object(Object::Dictionary(page_dict))
            } else {
                dest.objects
                    .insert(dest_page_id, Object::Dictionary(page_dict));
                used.insert(dest_page_id);
                dest_page_id
            };
            kids.push(Object::Reference(dest_page_id));
        }
    }

    let unpicked: BTreeSet<ObjectId> = imported
        .iter()
        .flat_map(|entry| {
            (0..entry.source.page_count() as usize)
                .filter_map(|offset| entry.source.page_id(offset))
                .map(|(id, generation)| (id + entry.id_offset, generation))
                .collect::<Vec<_>>()
        })
        .filter(|id| !used.contains(id))
        .collect();
    for object in dest.objects.values_mut() {
        detach_references(object, &unpicked);
    }

    let page_count = kids.len() as u32;
    debug!(
        "recomposing {} pages from {} source(s)",
        page_count,
        imported.len()
    );

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(page_count as i64)),
        ("Kids", Object::Array(kids)),
    ]);
    dest.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = dest.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    dest.trailer.set("Root", Object::Reference(catalog_id));

    // Old catalogs, page trees and unpicked pages are no longer reachable
    dest.prune_objects();
    dest.compress();

    let mut buffer = Vec::new();
    dest.save_to(&mut buffer)
        .map_err(|e| PageKitError::Serialization(format!("Save failed: {}", e)))?;

    Ok(OutputDocument {
        bytes: buffer,
        page_count,
    })
}

/// Copy every object of `source` into `dest` with remapped IDs; returns the offset used.
fn import_objects(dest: &mut Document, source: &Document) -> u32 {
    let id_offset = dest.max_id;
    for (&(id, generation), object) in &source.objects {
        dest.objects.insert(
            (id + id_offset, generation),
            remap_object_refs(object.clone(), id_offset),
        );
    }
    dest.max_id = source.max_id + id_offset;
    id_offset
}

/// Inheritable attributes missing on the page itself, taken from the nearest ancestor.
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(Vec<u8>, Object)> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for key in INHERITABLE {
        if page.has(key) {
            continue;
        }
        let mut node = page;
        // Bounded walk: malformed files can contain Parent cycles
        for _ in 0..64 {
            let Some(parent) = node
                .get(b"Parent")
                .and_then(Object::as_reference)
                .ok()
                .and_then(|id| doc.get_dictionary(id).ok())
            else {
                break;
            };
            if let Ok(value) = parent.get(key) {
                found.push((key.to_vec(), value.clone()));
                break;
            }
            node = parent;
        }
    }
    found
}

fn remap_dictionary(mut dict: Dictionary, offset: u32) -> Dictionary {
    for (_, value) in dict.iter_mut() {
        *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
    }
    dict
}

/// Replace references to any of `targets` with null, recursively.
fn detach_references(obj: &mut Object, targets: &BTreeSet<ObjectId>) {
    if let Object::Reference(id) = *obj {
        if targets.contains(&id) {
            *obj = Object::Null;
        }
        return;
    }
    match obj {
        Object::Array(items) => {
            for item in items.iter_mut() {
                detach_references(item, targets);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                detach_references(value, targets);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                detach_references(value, targets);
            }
        }
        _ => {}
    }
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(remap_dictionary(dict, offset)),
        Object::Stream(mut stream) => {
            stream.dict = remap_dictionary(stream.dict, offset);
            Object::Stream(stream)
        }
        other => other,
    }
}
