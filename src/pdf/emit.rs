//! Page object emission
//!
//! Wraps each finalized page buffer into a page dictionary plus content stream and
//! collects the pages under one root `/Pages` object.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::config::DocumentConfig;
use crate::date::{format_pdf_date, resolve_timestamp};
use crate::error::{Error, Result};
use crate::layout::{BoxName, PageDimensions, Transition};
use crate::pdf::document::PageState;

/// Allocates object ids and stores serialized objects
pub trait ObjectWriter {
    fn next_object_id(&mut self) -> ObjectId;
    fn write_object(&mut self, id: ObjectId, object: Object) -> Result<()>;
}

/// Read access to the pages being emitted, by 1-based index
pub trait PageSource {
    fn page_count(&self) -> usize;
    fn page_state(&self, index: usize) -> Result<PageState>;
    fn page_buffer(&self, index: usize) -> Result<&[u8]>;
    fn page_dimensions(&self, index: usize) -> Result<&PageDimensions>;
    fn page_annotations(&self, index: usize) -> Result<&[ObjectId]>;
}

/// [`ObjectWriter`] backed by a lopdf document
pub struct LopdfObjectWriter<'a> {
    doc: &'a mut Document,
}

impl<'a> LopdfObjectWriter<'a> {
    pub fn new(doc: &'a mut Document) -> Self {
        Self { doc }
    }
}

impl ObjectWriter for LopdfObjectWriter<'_> {
    fn next_object_id(&mut self) -> ObjectId {
        self.doc.new_object_id()
    }

    fn write_object(&mut self, id: ObjectId, object: Object) -> Result<()> {
        if self.doc.objects.contains_key(&id) {
            return Err(Error::InvalidState(format!("Object {:?} written twice", id)));
        }
        self.doc.objects.insert(id, object);
        Ok(())
    }
}

/// Compresses content stream bytes
pub trait Compressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
    /// Name of the matching `/Filter`
    fn filter(&self) -> &'static str;
}

/// zlib compression, decoded by `/FlateDecode`
#[derive(Debug, Clone, Copy, Default)]
pub struct FlateCompressor {
    level: Compression,
}

impl FlateCompressor {
    pub fn new(level: Compression) -> Self {
        Self { level }
    }
}

impl Compressor for FlateCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn filter(&self) -> &'static str {
        "FlateDecode"
    }
}

/// Document-wide settings for page dictionaries
#[derive(Debug, Clone, PartialEq)]
pub struct EmitOptions {
    pub compress: bool,
    pub page_boxes: Vec<BoxName>,
    /// Shared resource dictionary referenced by every page
    pub resources: Option<ObjectId>,
    /// PDF date for `/LastModified`
    pub last_modified: Option<String>,
    pub transparency_group: bool,
    /// Points per user unit, applied to box line widths and dashes
    pub scale_factor: f64,
}

impl EmitOptions {
    pub fn from_config(config: &DocumentConfig, resources: Option<ObjectId>) -> Result<Self> {
        let last_modified = if config.signature_approval {
            None
        } else {
            resolve_timestamp(&config.timestamp_expression()?).map(|instant| format_pdf_date(&instant))
        };

        Ok(Self {
            compress: config.compress,
            page_boxes: config.page_boxes.clone(),
            resources,
            last_modified,
            transparency_group: !config.pdfa_mode,
            scale_factor: config.unit.scale_factor(),
        })
    }
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            compress: true,
            page_boxes: BoxName::ALL.to_vec(),
            resources: None,
            last_modified: None,
            transparency_group: true,
            scale_factor: 1.0,
        }
    }
}

/// Ids assigned to one emitted page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmittedPage {
    pub index: usize,
    pub page_id: ObjectId,
    pub content_id: ObjectId,
    /// Length of the stream data as written
    pub content_len: usize,
}

/// Writes page objects and the root page tree through an [`ObjectWriter`]
pub struct PageEmitter<'a> {
    options: &'a EmitOptions,
    compressor: Option<Box<dyn Compressor + 'a>>,
    pages_id: Option<ObjectId>,
    kids: Vec<ObjectId>,
}

impl<'a> PageEmitter<'a> {
    pub fn new(options: &'a EmitOptions) -> Self {
        let compressor: Option<Box<dyn Compressor + 'a>> = if options.compress {
            Some(Box::new(FlateCompressor::default()))
        } else {
            None
        };
        Self { options, compressor, pages_id: None, kids: Vec::new() }
    }

    /// Replace the default compressor; only used when compression is enabled
    pub fn with_compressor(mut self, compressor: Box<dyn Compressor + 'a>) -> Self {
        if self.options.compress {
            self.compressor = Some(compressor);
        }
        self
    }

    /// Reserve the root `/Pages` id so pages can reference their parent
    pub fn begin(&mut self, writer: &mut dyn ObjectWriter) -> ObjectId {
        let pages_id = writer.next_object_id();
        self.pages_id = Some(pages_id);
        pages_id
    }

    /// Emit the page at 1-based `index`, which must be the next page in order
    pub fn emit_page(
        &mut self,
        source: &dyn PageSource,
        index: usize,
        writer: &mut dyn ObjectWriter,
    ) -> Result<EmittedPage> {
        let pages_id = self
            .pages_id
            .ok_or_else(|| Error::InvalidState("Page tree not started".to_string()))?;

        match source.page_state(index)? {
            PageState::Finalized => {}
            PageState::Draft => {
                return Err(Error::InvalidState(format!("Page {} is not finalized", index)));
            }
            PageState::Emitted => {
                return Err(Error::InvalidState(format!("Page {} was already emitted", index)));
            }
        }
        if index != self.kids.len() + 1 {
            return Err(Error::InvalidState(format!(
                "Page {} emitted out of order, expected page {}",
                index,
                self.kids.len() + 1
            )));
        }

        let buffer = source.page_buffer(index)?;
        let dimensions = source.page_dimensions(index)?;
        let annotations = source.page_annotations(index)?;

        // Compression can fail, so nothing is allocated or written before it succeeds
        let stream = self.content_stream(buffer)?;
        let content_len = stream.content.len();

        let page_id = writer.next_object_id();
        let content_id = writer.next_object_id();

        let page = self.page_dictionary(pages_id, content_id, dimensions, annotations);
        writer.write_object(page_id, Object::Dictionary(page))?;
        writer.write_object(content_id, Object::Stream(stream))?;

        self.kids.push(page_id);
        log::trace!("Emitted page {} as {:?} ({} content bytes)", index, page_id, content_len);
        Ok(EmittedPage { index, page_id, content_id, content_len })
    }

    /// Write the root page tree, returning its id
    pub fn finish(self, writer: &mut dyn ObjectWriter) -> Result<ObjectId> {
        let pages_id = self
            .pages_id
            .ok_or_else(|| Error::InvalidState("Page tree not started".to_string()))?;

        let kids: Vec<Object> = self.kids.iter().map(|&id| Object::Reference(id)).collect();

        let mut pages_object = Dictionary::new();
        pages_object.set("Type", Object::Name(b"Pages".to_vec()));
        pages_object.set("Kids", Object::Array(kids));
        pages_object.set("Count", Object::Integer(self.kids.len() as i64));
        writer.write_object(pages_id, Object::Dictionary(pages_object))?;

        log::debug!("Wrote page tree {:?} with {} pages", pages_id, self.kids.len());
        Ok(pages_id)
    }

    fn page_dictionary(
        &self,
        pages_id: ObjectId,
        content_id: ObjectId,
        dimensions: &PageDimensions,
        annotations: &[ObjectId],
    ) -> Dictionary {
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        if let Some(date) = &self.options.last_modified {
            page.set("LastModified", Object::String(date.as_bytes().to_vec(), StringFormat::Literal));
        }
        if let Some(resources) = self.options.resources {
            page.set("Resources", Object::Reference(resources));
        }

        for name in &self.options.page_boxes {
            if let Some(rect) = dimensions.page_box(*name) {
                page.set(
                    name.as_name(),
                    Object::Array(vec![real(rect.llx), real(rect.lly), real(rect.urx), real(rect.ury)]),
                );
            }
        }

        let box_colors = self.box_color_info(dimensions);
        if !box_colors.is_empty() {
            page.set("BoxColorInfo", Object::Dictionary(box_colors));
        }

        page.set("Contents", Object::Reference(content_id));
        page.set("Rotate", Object::Integer(dimensions.rotate));

        if self.options.transparency_group {
            let mut group = Dictionary::new();
            group.set("Type", Object::Name(b"Group".to_vec()));
            group.set("S", Object::Name(b"Transparency".to_vec()));
            group.set("CS", Object::Name(b"DeviceRGB".to_vec()));
            page.set("Group", Object::Dictionary(group));
        }

        if let Some(transition) = &dimensions.transition {
            if let Some(duration) = transition.display_duration {
                page.set("Dur", real(duration));
            }
            page.set("Trans", Object::Dictionary(transition_dictionary(transition)));
        }

        if !annotations.is_empty() {
            let annots = annotations.iter().map(|&id| Object::Reference(id)).collect();
            page.set("Annots", Object::Array(annots));
        }

        page.set("PZ", real(dimensions.zoom));
        page
    }

    fn box_color_info(&self, dimensions: &PageDimensions) -> Dictionary {
        let k = self.options.scale_factor;
        let mut info = Dictionary::new();

        for name in &self.options.page_boxes {
            let Some(colors) = dimensions.box_colors.get(name) else {
                continue;
            };
            if colors.is_empty() {
                continue;
            }

            let mut entry = Dictionary::new();
            if let Some([r, g, b]) = colors.color {
                let rgb = [r, g, b].iter().map(|c| real(f64::from(*c) / 255.0)).collect();
                entry.set("C", Object::Array(rgb));
            }
            if let Some(width) = colors.width {
                entry.set("W", real(width * k));
            }
            if let Some(style) = colors.style {
                entry.set("S", Object::Name(style.as_name().as_bytes().to_vec()));
            }
            if let Some(dashes) = &colors.dashes {
                entry.set("D", Object::Array(dashes.iter().map(|d| real(d * k)).collect()));
            }
            info.set(name.as_name(), Object::Dictionary(entry));
        }
        info
    }

    fn content_stream(&self, buffer: &[u8]) -> Result<Stream> {
        let mut dict = Dictionary::new();
        let data = match &self.compressor {
            Some(compressor) => {
                dict.set("Filter", Object::Name(compressor.filter().as_bytes().to_vec()));
                compressor.compress(buffer)?
            }
            None => buffer.to_vec(),
        };
        dict.set("Length", Object::Integer(data.len() as i64));
        Ok(Stream::new(dict, data).with_compression(false))
    }
}

fn transition_dictionary(transition: &Transition) -> Dictionary {
    let mut trans = Dictionary::new();
    trans.set("Type", Object::Name(b"Trans".to_vec()));
    if let Some(style) = transition.style {
        trans.set("S", Object::Name(style.as_name().as_bytes().to_vec()));
    }
    if let Some(duration) = transition.duration {
        trans.set("D", real(duration));
    }
    if let Some(dimension) = transition.dimension {
        trans.set("Dm", Object::Name(format!("{:?}", dimension).into_bytes()));
    }
    if let Some(motion) = transition.motion {
        trans.set("M", Object::Name(format!("{:?}", motion).into_bytes()));
    }
    if let Some(direction) = transition.direction {
        trans.set("Di", Object::Integer(direction));
    }
    if let Some(scale) = transition.scale {
        trans.set("SS", real(scale));
    }
    if let Some(opaque) = transition.opaque {
        trans.set("B", Object::Boolean(opaque));
    }
    trans
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{BoxColorInfo, BoxLineStyle, Orientation, PageFormat, TransitionStyle};
    use std::io::Read;

    struct FixedPages {
        pages: Vec<(PageState, Vec<u8>, PageDimensions, Vec<ObjectId>)>,
    }

    impl FixedPages {
        fn finalized(buffers: &[&str]) -> Self {
            let dims = PageDimensions::from_format(&PageFormat::a4(), Orientation::Portrait);
            Self {
                pages: buffers
                    .iter()
                    .map(|b| (PageState::Finalized, b.as_bytes().to_vec(), dims.clone(), Vec::new()))
                    .collect(),
            }
        }

        fn get(&self, index: usize) -> Result<&(PageState, Vec<u8>, PageDimensions, Vec<ObjectId>)> {
            index
                .checked_sub(1)
                .and_then(|i| self.pages.get(i))
                .ok_or(Error::PageNotFound(index))
        }
    }

    impl PageSource for FixedPages {
        fn page_count(&self) -> usize {
            self.pages.len()
        }
        fn page_state(&self, index: usize) -> Result<PageState> {
            Ok(self.get(index)?.0)
        }
        fn page_buffer(&self, index: usize) -> Result<&[u8]> {
            Ok(&self.get(index)?.1)
        }
        fn page_dimensions(&self, index: usize) -> Result<&PageDimensions> {
            Ok(&self.get(index)?.2)
        }
        fn page_annotations(&self, index: usize) -> Result<&[ObjectId]> {
            Ok(&self.get(index)?.3)
        }
    }

    fn dict(doc: &Document, id: ObjectId) -> &Dictionary {
        doc.get_object(id).unwrap().as_dict().unwrap()
    }

    #[test]
    fn test_emit_pages_and_root() {
        let source = FixedPages::finalized(&["BT (1) Tj ET", "BT (2) Tj ET", "BT (3) Tj ET"]);
        let options = EmitOptions { compress: false, ..EmitOptions::default() };
        let mut doc = Document::with_version("1.7");
        let mut writer = LopdfObjectWriter::new(&mut doc);

        let mut emitter = PageEmitter::new(&options);
        let pages_id = emitter.begin(&mut writer);
        let emitted: Vec<EmittedPage> = (1..=3)
            .map(|i| emitter.emit_page(&source, i, &mut writer).unwrap())
            .collect();
        assert_eq!(emitter.finish(&mut writer).unwrap(), pages_id);

        // ids strictly increase in page order
        let ids: Vec<u32> = emitted.iter().flat_map(|e| [e.page_id.0, e.content_id.0]).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(pages_id.0 < ids[0]);

        let root = dict(&doc, pages_id);
        assert_eq!(root.get(b"Count").unwrap().as_i64().unwrap(), 3);
        let kids = root.get(b"Kids").unwrap().as_array().unwrap();
        assert_eq!(kids[2].as_reference().unwrap(), emitted[2].page_id);

        let page = dict(&doc, emitted[0].page_id);
        assert_eq!(page.get(b"Type").unwrap().as_name().unwrap(), b"Page");
        assert_eq!(page.get(b"Parent").unwrap().as_reference().unwrap(), pages_id);
        assert_eq!(page.get(b"Contents").unwrap().as_reference().unwrap(), emitted[0].content_id);
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"ArtBox"));
        assert!(page.has(b"Group"));
        assert!(!page.has(b"LastModified"));
        assert!(!page.has(b"Annots"));

        let stream = doc.get_object(emitted[1].content_id).unwrap().as_stream().unwrap();
        assert_eq!(stream.content, b"BT (2) Tj ET".to_vec());
        assert!(!stream.dict.has(b"Filter"));
        assert_eq!(stream.dict.get(b"Length").unwrap().as_i64().unwrap(), 12);
    }

    #[test]
    fn test_compressed_content() {
        let source = FixedPages::finalized(&["BT (Page 1 of 1) Tj ET"]);
        let options = EmitOptions::default();
        let mut doc = Document::with_version("1.7");
        let mut writer = LopdfObjectWriter::new(&mut doc);

        let mut emitter = PageEmitter::new(&options);
        emitter.begin(&mut writer);
        let emitted = emitter.emit_page(&source, 1, &mut writer).unwrap();
        emitter.finish(&mut writer).unwrap();

        let stream = doc.get_object(emitted.content_id).unwrap().as_stream().unwrap();
        assert_eq!(stream.dict.get(b"Filter").unwrap().as_name().unwrap(), b"FlateDecode");
        assert_eq!(stream.dict.get(b"Length").unwrap().as_i64().unwrap(), emitted.content_len as i64);

        let mut inflated = Vec::new();
        flate2::read::ZlibDecoder::new(stream.content.as_slice())
            .read_to_end(&mut inflated)
            .unwrap();
        assert_eq!(inflated, b"BT (Page 1 of 1) Tj ET".to_vec());
    }

    #[test]
    fn test_non_finalized_page_rejected_before_ids() {
        let mut source = FixedPages::finalized(&["x"]);
        source.pages[0].0 = PageState::Draft;
        let options = EmitOptions::default();
        let mut doc = Document::with_version("1.7");
        let mut writer = LopdfObjectWriter::new(&mut doc);

        let mut emitter = PageEmitter::new(&options);
        emitter.begin(&mut writer);
        let before = writer.next_object_id();
        let result = emitter.emit_page(&source, 1, &mut writer);
        assert!(matches!(result, Err(Error::InvalidState(_))));
        assert_eq!(writer.next_object_id().0, before.0 + 1);
    }

    struct BrokenCompressor;

    impl Compressor for BrokenCompressor {
        fn compress(&self, _data: &[u8]) -> Result<Vec<u8>> {
            Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "deflate failed")))
        }
        fn filter(&self) -> &'static str {
            "FlateDecode"
        }
    }

    #[test]
    fn test_failed_compression_writes_no_page_objects() {
        let source = FixedPages::finalized(&["BT (1) Tj ET"]);
        let options = EmitOptions::default();
        let mut doc = Document::with_version("1.7");
        let mut writer = LopdfObjectWriter::new(&mut doc);

        let mut emitter = PageEmitter::new(&options).with_compressor(Box::new(BrokenCompressor));
        emitter.begin(&mut writer);
        let before = writer.next_object_id();
        let result = emitter.emit_page(&source, 1, &mut writer);
        assert!(matches!(result, Err(Error::Io(_))));

        // only the id taken above was allocated, and no page dictionary exists
        assert_eq!(writer.next_object_id().0, before.0 + 1);
        assert!(doc.objects.is_empty());
    }

    #[test]
    fn test_emitted_page_rejected() {
        let mut source = FixedPages::finalized(&["x"]);
        source.pages[0].0 = PageState::Emitted;
        let options = EmitOptions::default();
        let mut doc = Document::with_version("1.7");
        let mut writer = LopdfObjectWriter::new(&mut doc);

        let mut emitter = PageEmitter::new(&options);
        emitter.begin(&mut writer);
        assert!(matches!(
            emitter.emit_page(&source, 1, &mut writer),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_out_of_order_rejected() {
        let source = FixedPages::finalized(&["a", "b"]);
        let options = EmitOptions::default();
        let mut doc = Document::with_version("1.7");
        let mut writer = LopdfObjectWriter::new(&mut doc);

        let mut emitter = PageEmitter::new(&options);
        emitter.begin(&mut writer);
        assert!(matches!(
            emitter.emit_page(&source, 2, &mut writer),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_page_dictionary_extras() {
        let mut source = FixedPages::finalized(&["x"]);
        let dims = &mut source.pages[0].2;
        dims.rotate = 90;
        dims.zoom = 1.5;
        dims.box_colors.insert(
            BoxName::CropBox,
            BoxColorInfo {
                color: Some([255, 0, 0]),
                width: Some(2.0),
                style: Some(BoxLineStyle::Dashed),
                dashes: Some(vec![3.0, 1.0]),
            },
        );
        dims.transition = Some(Transition {
            display_duration: Some(5.0),
            style: Some(TransitionStyle::Split),
            dimension: Some(crate::layout::TransitionDimension::V),
            opaque: Some(true),
            ..Transition::default()
        });
        source.pages[0].3 = vec![(40, 0), (41, 0)];

        let options = EmitOptions {
            compress: false,
            page_boxes: vec![BoxName::MediaBox, BoxName::CropBox],
            resources: Some((30, 0)),
            last_modified: Some("D:20240101000000+00'00'".to_string()),
            transparency_group: false,
            scale_factor: 2.0,
        };
        let mut doc = Document::with_version("1.7");
        let mut writer = LopdfObjectWriter::new(&mut doc);
        let mut emitter = PageEmitter::new(&options);
        emitter.begin(&mut writer);
        let emitted = emitter.emit_page(&source, 1, &mut writer).unwrap();

        let page = dict(&doc, emitted.page_id);
        assert_eq!(page.get(b"Rotate").unwrap().as_i64().unwrap(), 90);
        assert_eq!(page.get(b"Resources").unwrap().as_reference().unwrap(), (30, 0));
        assert_eq!(page.get(b"LastModified").unwrap().as_str().unwrap(), b"D:20240101000000+00'00'");
        assert!(!page.has(b"Group"));
        assert!(!page.has(b"TrimBox"));
        assert_eq!(page.get(b"Annots").unwrap().as_array().unwrap().len(), 2);
        assert!(page.has(b"Dur"));

        let trans = page.get(b"Trans").unwrap().as_dict().unwrap();
        assert_eq!(trans.get(b"S").unwrap().as_name().unwrap(), b"Split");
        assert_eq!(trans.get(b"Dm").unwrap().as_name().unwrap(), b"V");
        assert!(trans.get(b"B").unwrap().as_bool().unwrap());

        let info = page.get(b"BoxColorInfo").unwrap().as_dict().unwrap();
        let crop = info.get(b"CropBox").unwrap().as_dict().unwrap();
        assert_eq!(crop.get(b"S").unwrap().as_name().unwrap(), b"D");
        assert_eq!(crop.get(b"W").unwrap().as_float().unwrap(), 4.0);
        assert_eq!(crop.get(b"D").unwrap().as_array().unwrap()[0].as_float().unwrap(), 6.0);
        assert_eq!(crop.get(b"C").unwrap().as_array().unwrap()[0].as_float().unwrap(), 1.0);
    }

    #[test]
    fn test_emit_without_begin() {
        let source = FixedPages::finalized(&["x"]);
        let options = EmitOptions::default();
        let mut doc = Document::with_version("1.7");
        let mut writer = LopdfObjectWriter::new(&mut doc);
        let mut emitter = PageEmitter::new(&options);
        assert!(matches!(
            emitter.emit_page(&source, 1, &mut writer),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_emit_options_from_config() {
        let mut config = DocumentConfig::default();
        config.modification_timestamp = "2024-11-20T10:30:00+02:00".to_string();
        let options = EmitOptions::from_config(&config, None).unwrap();
        assert_eq!(options.last_modified.as_deref(), Some("D:20241120103000+02'00'"));
        assert!(options.transparency_group);

        config.signature_approval = true;
        config.pdfa_mode = true;
        let options = EmitOptions::from_config(&config, None).unwrap();
        assert_eq!(options.last_modified, None);
        assert!(!options.transparency_group);
    }
}
