//! Document output
//!
//! Assembles the finished document and hands its bytes to a transport in one piece.

use std::io::{Seek, SeekFrom, Write};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::alias::PatchReport;
use crate::config::FontSpec;
use crate::error::{Error, Result};
use crate::pdf::document::PaginatedDocument;
use crate::pdf::emit::{EmitOptions, LopdfObjectWriter};

/// Destination of the rendered document
pub trait Transport {
    /// Bytes already committed to this transport
    fn committed_len(&self) -> usize;
    fn commit(&mut self, bytes: &[u8]) -> Result<()>;
}

impl Transport for Vec<u8> {
    fn committed_len(&self) -> usize {
        self.len()
    }

    fn commit(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Transport over any writer, e.g. a file or a response body
pub struct StreamTransport<W: Write> {
    inner: W,
    written: usize,
}

impl<W: Write> StreamTransport<W> {
    /// Transport over a writer that has carried no bytes yet
    pub fn new(inner: W) -> Self {
        Self::with_committed(inner, 0)
    }

    /// Transport over a writer that already carried `committed` bytes
    ///
    /// Use this when a response body or socket was written to before the
    /// document was handed over.
    pub fn with_committed(inner: W, committed: usize) -> Self {
        Self { inner, written: committed }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Seek> StreamTransport<W> {
    /// Transport positioned at the end of `inner`, with every existing byte committed
    ///
    /// A file opened for appending reports position 0 until its first write, so
    /// the end is found by seeking rather than by asking for the position.
    pub fn at_end(mut inner: W) -> Result<Self> {
        let end = inner.seek(SeekFrom::End(0))?;
        Ok(Self::with_committed(inner, end as usize))
    }
}

impl<W: Write> Transport for StreamTransport<W> {
    fn committed_len(&self) -> usize {
        self.written
    }

    fn commit(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.inner.flush()?;
        self.written += bytes.len();
        Ok(())
    }
}

/// What [`render`] produced
#[derive(Debug, Clone)]
pub struct RenderSummary {
    pub page_count: usize,
    pub byte_len: usize,
    pub catalog_id: ObjectId,
    pub pages_id: ObjectId,
    pub page_ids: Vec<ObjectId>,
    /// Patch reports of the pages finalized by this call
    pub reports: Vec<PatchReport>,
}

/// Finalize, emit and serialize `document`, then commit it to `transport`
///
/// Fails before touching the document when the transport already holds bytes.
/// Nothing is committed unless every step succeeded.
///
/// Pages get a standard Type1 font with WinAnsi encoding as `/F1`. That font
/// cannot show two-byte text, so documents in unicode mode should go through
/// [`render_with_resources`] and supply their own composite font.
pub fn render(document: &mut PaginatedDocument, transport: &mut dyn Transport) -> Result<RenderSummary> {
    if document.config().unicode {
        log::warn!("Rendering a unicode document with the standard Type1 font resources");
    }
    let font = document.config().fonts.main.clone();
    render_with_resources(document, transport, |pdf| {
        let font_id = standard_font(pdf, &font);
        Ok(pdf.add_object(font_resources(font_id)))
    })
}

/// Like [`render`], but the page `/Resources` come from `resources`
///
/// `resources` receives the output document before any page is written and
/// returns the id of the resource dictionary every page should reference.
pub fn render_with_resources<F>(
    document: &mut PaginatedDocument,
    transport: &mut dyn Transport,
    resources: F,
) -> Result<RenderSummary>
where
    F: FnOnce(&mut Document) -> Result<ObjectId>,
{
    let committed = transport.committed_len();
    if committed > 0 {
        return Err(Error::OutputConflict(committed));
    }

    if document.is_generating() {
        document.finish_generation()?;
    }
    let reports = document.resolve_all()?;

    let mut pdf = Document::with_version("1.7");
    let resources_id = resources(&mut pdf)?;

    let options = EmitOptions::from_config(document.config(), Some(resources_id))?;
    let summary = document.emit(&mut LopdfObjectWriter::new(&mut pdf), &options)?;

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(summary.pages_id));
    let catalog_id = pdf.add_object(Object::Dictionary(catalog));
    pdf.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    pdf.save_to(&mut bytes)?;
    transport.commit(&bytes)?;

    log::debug!(
        "Rendered {} pages into {} bytes",
        summary.page_ids.len(),
        bytes.len()
    );
    Ok(RenderSummary {
        page_count: summary.page_ids.len(),
        byte_len: bytes.len(),
        catalog_id,
        pages_id: summary.pages_id,
        page_ids: summary.page_ids,
        reports,
    })
}

/// Render into a fresh byte buffer
pub fn render_to_bytes(document: &mut PaginatedDocument) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    render(document, &mut bytes)?;
    Ok(bytes)
}

/// One of the standard Type1 fonts, no embedding needed
fn standard_font(doc: &mut Document, font: &FontSpec) -> ObjectId {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"Font".to_vec()));
    dict.set("Subtype", Object::Name(b"Type1".to_vec()));
    dict.set("BaseFont", Object::Name(font.base_font().as_bytes().to_vec()));
    dict.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    doc.add_object(Object::Dictionary(dict))
}

fn font_resources(font_id: ObjectId) -> Object {
    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Reference(font_id));

    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));
    Object::Dictionary(resources)
}
