//! Test fixtures
//!
//! Generates small PDFs whose pages carry an identifiable marker string, so
//! tests can check which source page ended up where.

use lopdf::{Dictionary, Document, Object, Stream, StringFormat};

/// Create a PDF with `num_pages` pages; page `n` shows the text `{prefix}-Page-{n}`.
///
/// MediaBox and Resources live on the page tree root, so copied pages only
/// render correctly if inherited attributes are carried over.
pub fn create_test_pdf(num_pages: u32, prefix: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Reference(font_id))])),
    )]));

    let mut page_ids = Vec::new();
    for page_num in 1..=num_pages {
        let marker = format!("{}-Page-{}", prefix, page_num);
        let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", marker);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            (
                "Annots",
                Object::Array(vec![Object::Dictionary(Dictionary::from_iter(vec![
                    ("Type", Object::Name(b"Annot".to_vec())),
                    ("Subtype", Object::Name(b"Text".to_vec())),
                    (
                        "Contents",
                        Object::String(marker.into_bytes(), StringFormat::Literal),
                    ),
                ]))]),
            ),
        ]));
        page_ids.push(page_id);
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(num_pages as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        ),
        ("Resources", Object::Reference(resources_id)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("fixture PDF serializes");
    buffer
}

/// Add a link annotation on page `from` (1-based) whose destination is page `to`
pub fn add_page_link(bytes: &[u8], from: u32, to: u32) -> Vec<u8> {
    let mut doc = Document::load_mem(bytes).expect("fixture PDF parses");
    let pages = doc.get_pages();
    let target = *pages.get(&to).expect("link target exists");
    let source = *pages.get(&from).expect("link source exists");

    let link = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Annot".to_vec())),
        ("Subtype", Object::Name(b"Link".to_vec())),
        (
            "Dest",
            Object::Array(vec![Object::Reference(target), Object::Name(b"Fit".to_vec())]),
        ),
    ]);
    let page = doc
        .get_object_mut(source)
        .and_then(Object::as_dict_mut)
        .expect("page is a dictionary");
    match page.get_mut(b"Annots") {
        Ok(Object::Array(annots)) => annots.push(Object::Dictionary(link)),
        _ => page.set("Annots", Object::Array(vec![Object::Dictionary(link)])),
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("fixture PDF serializes");
    buffer
}

/// Page number (1-based) each link on page `page` points at; `None` for dropped links
pub fn link_targets(bytes: &[u8], page: u32) -> Vec<Option<u32>> {
    let doc = Document::load_mem(bytes).expect("fixture output parses");
    let pages = doc.get_pages();
    let page_id = *pages.get(&page).expect("page exists");
    let page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .expect("page is a dictionary");

    let annots = match page.get(b"Annots") {
        Ok(Object::Array(annots)) => annots.clone(),
        _ => Vec::new(),
    };
    annots
        .iter()
        .filter_map(|annot| match annot {
            Object::Dictionary(dict) => Some(dict.clone()),
            Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
            _ => None,
        })
        .filter(|dict| matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Link"))
        .map(|dict| {
            let dest = dict.get(b"Dest").and_then(Object::as_array).ok()?;
            let target = dest.first()?.as_reference().ok()?;
            pages
                .iter()
                .find(|&(_, &id)| id == target)
                .map(|(&number, _)| number)
        })
        .collect()
}

/// Marker strings of every page in `bytes`, in page order
pub fn page_markers(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).expect("fixture output parses");
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let content = doc.get_page_content(page_id).expect("page has content");
            let text = String::from_utf8_lossy(&content);
            text.split_once('(')
                .and_then(|(_, rest)| rest.split_once(')'))
                .map(|(marker, _)| marker.to_string())
                .unwrap_or_default()
        })
        .collect()
}

/// Number of pages in `bytes`
pub fn page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes)
        .expect("fixture output parses")
        .get_pages()
        .len()
}
