//! PDF assembly module

pub mod document;
pub mod emit;
pub mod headers;
pub mod metadata;
pub mod output;

// Re-export commonly used items
pub use document::{EmitSummary, Page, PageState, PaginatedDocument};
pub use emit::{
    Compressor, EmitOptions, EmittedPage, FlateCompressor, LopdfObjectWriter, ObjectWriter,
    PageEmitter, PageSource,
};
pub use headers::{BandPlacement, HeaderFooterRewriter, RenderedBand};
pub use metadata::{count_pages, page_tree_summary, PageTreeSummary};
pub use output::{
    render, render_to_bytes, render_with_resources, RenderSummary, StreamTransport, Transport,
};
