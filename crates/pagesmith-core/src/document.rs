//! PDF document handles
//!
//! [`SourceDocument`] is an opened, validated input PDF. [`PdfBuilder`] is the
//! output side: an empty document that pages are copied into, one at a time,
//! in the exact order they must appear.

use crate::error::{PageOpError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Upper bound on page-tree depth when resolving inherited attributes
const MAX_TREE_DEPTH: usize = 64;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Basic information about an opened PDF
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PdfInfo {
    pub name: String,
    pub page_count: u32,
    pub size_bytes: usize,
    pub version: String,
}

/// An opened input PDF.
///
/// The page count is fixed when the document is opened; every page reference
/// handed to [`PdfBuilder::copy_page`] is checked against it.
pub struct SourceDocument {
    id: u64,
    name: String,
    size_bytes: usize,
    doc: Document,
    page_ids: Vec<ObjectId>,
}

impl SourceDocument {
    /// Parse `bytes` as a PDF. `name` identifies the document in logs and errors.
    pub fn open(bytes: &[u8], name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if bytes.len() < 8 || !bytes.starts_with(b"%PDF-") {
            return Err(PageOpError::InvalidPdf(format!(
                "{}: not a PDF file (missing %PDF- header)",
                name
            )));
        }

        let doc = Document::load_mem(bytes)
            .map_err(|e| PageOpError::InvalidPdf(format!("{}: {}", name, e)))?;

        if doc.is_encrypted() {
            return Err(PageOpError::InvalidPdf(format!(
                "{}: encrypted PDFs are not supported",
                name
            )));
        }

        // get_pages is keyed by 1-based page number, so values come out in page order
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(PageOpError::InvalidPdf(format!("{}: PDF has no pages", name)));
        }

        tracing::debug!(name = %name, pages = page_ids.len(), "Opened source PDF");

        Ok(Self {
            id: NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed),
            name,
            size_bytes: bytes.len(),
            doc,
            page_ids,
        })
    }

    /// Read and open a PDF from disk
    pub fn open_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::open(&bytes, name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn info(&self) -> PdfInfo {
        PdfInfo {
            name: self.name.clone(),
            page_count: self.page_count(),
            size_bytes: self.size_bytes,
            version: self.doc.version.clone(),
        }
    }

    fn page_id(&self, index: u32) -> Result<ObjectId> {
        self.page_ids
            .get(index as usize)
            .copied()
            .ok_or(PageOpError::IndexOutOfRange {
                index,
                page_count: self.page_count(),
            })
    }

    fn is_page_tree_node(&self, id: ObjectId) -> bool {
        match self.doc.get_object(id) {
            Ok(Object::Dictionary(dict)) => {
                matches!(dict.get(b"Type"), Ok(Object::Name(t)) if t == b"Page" || t == b"Pages")
            }
            _ => false,
        }
    }

    /// Look up an inheritable attribute on the page's ancestors
    fn inherited_attribute(&self, page: &Dictionary, key: &[u8]) -> Option<Object> {
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        for _ in 0..MAX_TREE_DEPTH {
            let node = self.doc.get_object(parent?).and_then(Object::as_dict).ok()?;
            if let Ok(value) = node.get(key) {
                return Some(value.clone());
            }
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
        None
    }
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("page_count", &self.page_count())
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}

/// A page that has been copied into a [`PdfBuilder`] but not yet placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopiedPage(ObjectId);

/// Output document under construction.
///
/// Pages land in the order [`PdfBuilder::append_page`] is called; there is no
/// reordering step afterwards. [`PdfBuilder::serialize`] consumes the builder.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    /// (source id, source object) -> object id in this document
    imported: HashMap<(u64, ObjectId), ObjectId>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    /// Create an empty, zero-page document
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            imported: HashMap::new(),
        }
    }

    pub fn page_count(&self) -> u32 {
        self.kids.len() as u32
    }

    /// Copy page `index` (zero-based) of `source` into this document.
    ///
    /// The page and everything it references are imported; objects shared
    /// between pages of the same source are imported only once.
    pub fn copy_page(&mut self, source: &SourceDocument, index: u32) -> Result<CopiedPage> {
        let page_id = source.page_id(index)?;
        let mut page = source
            .doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| {
                PageOpError::AssemblyFailed(format!(
                    "{}: page {} is not a dictionary: {}",
                    source.name,
                    index + 1,
                    e
                ))
            })?
            .clone();

        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Some(value) = source.inherited_attribute(&page, key) {
                    page.set(key.to_vec(), value);
                }
            }
        }
        page.remove(b"Parent");

        // Register before remapping so annotations pointing back at the page resolve to the copy.
        // A reserved id is used once; copying the same page again gets a fresh object.
        let key = (source.id, page_id);
        let reserved = self
            .imported
            .get(&key)
            .copied()
            .filter(|id| !self.doc.objects.contains_key(id));
        let new_id = match reserved {
            Some(id) => id,
            None => {
                let id = self.doc.new_object_id();
                self.imported.insert(key, id);
                id
            }
        };

        let page = self.remap_object(source, Object::Dictionary(page));
        self.doc.objects.insert(new_id, page);

        Ok(CopiedPage(new_id))
    }

    /// Allocate the output id of page `index` before it is copied.
    ///
    /// Links on earlier pages that point at a reserved page resolve to its copy
    /// instead of being dropped. Every reserved page must be copied before
    /// [`PdfBuilder::serialize`].
    pub fn reserve_page(&mut self, source: &SourceDocument, index: u32) -> Result<()> {
        let page_id = source.page_id(index)?;
        if let std::collections::hash_map::Entry::Vacant(slot) =
            self.imported.entry((source.id, page_id))
        {
            slot.insert(self.doc.new_object_id());
        }
        Ok(())
    }

    /// Place a copied page at the end of the document
    pub fn append_page(&mut self, page: CopiedPage) {
        if let Some(Object::Dictionary(dict)) = self.doc.objects.get_mut(&page.0) {
            dict.set("Parent", Object::Reference(self.pages_id));
        }
        self.kids.push(page.0);
    }

    /// Finish the page tree and write the document out
    pub fn serialize(mut self) -> Result<Vec<u8>> {
        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(self.kids.len() as i64)),
            (
                "Kids",
                Object::Array(self.kids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
        ]);
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]);
        let catalog_id = self.doc.add_object(catalog);
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        self.doc.compress();

        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| PageOpError::AssemblyFailed(format!("Save failed: {}", e)))?;

        Ok(buffer)
    }

    fn import_object(&mut self, source: &SourceDocument, id: ObjectId) -> ObjectId {
        if let Some(&new_id) = self.imported.get(&(source.id, id)) {
            return new_id;
        }

        let new_id = self.doc.new_object_id();
        self.imported.insert((source.id, id), new_id);

        let object = source.doc.get_object(id).cloned().unwrap_or(Object::Null);
        let object = self.remap_object(source, object);
        self.doc.objects.insert(new_id, object);

        new_id
    }

    /// Recursively import referenced objects and rewrite references to the new ids
    fn remap_object(&mut self, source: &SourceDocument, obj: Object) -> Object {
        match obj {
            Object::Reference(id) => {
                if let Some(&new_id) = self.imported.get(&(source.id, id)) {
                    Object::Reference(new_id)
                } else if source.is_page_tree_node(id) {
                    // Links into pages that are not part of this output
                    Object::Null
                } else {
                    Object::Reference(self.import_object(source, id))
                }
            }
            Object::Array(arr) => Object::Array(
                arr.into_iter()
                    .map(|o| self.remap_object(source, o))
                    .collect(),
            ),
            Object::Dictionary(mut dict) => {
                for (_, value) in dict.iter_mut() {
                    *value = self.remap_object(source, std::mem::replace(value, Object::Null));
                }
                Object::Dictionary(dict)
            }
            Object::Stream(mut stream) => {
                for (_, value) in stream.dict.iter_mut() {
                    *value = self.remap_object(source, std::mem::replace(value, Object::Null));
                }
                Object::Stream(stream)
            }
            other => other,
        }
    }
}
