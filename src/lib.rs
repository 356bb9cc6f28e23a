//! Page Aliases Library
//!
//! Paginated PDF output where page numbers are written before they are known.
//! This library provides functionality to:
//! - Register placeholder tokens for page numbers and page totals
//! - Count pages and page groups once generation is finished
//! - Patch the resolved numbers into serialized page content
//! - Emit page objects and the page tree with lopdf
//!
//! # Example
//!
//! ```no_run
//! use page_aliases::config::DocumentConfig;
//! use page_aliases::pdf::{render_to_bytes, PaginatedDocument};
//!
//! let mut doc = PaginatedDocument::new(DocumentConfig::default()).expect("valid config");
//! let page = doc.add_page(doc.default_dimensions()).expect("page");
//! doc.write_content(page, b"BT /F1 10 Tf 50 50 Td (Page {:pnp:} of {:ptp:}) Tj ET")
//!     .expect("content");
//!
//! let bytes = render_to_bytes(&mut doc).expect("Failed to render");
//! std::fs::write("report.pdf", bytes).expect("Failed to write");
//! ```

pub mod alias;
pub mod config;
pub mod date;
pub mod error;
pub mod layout;
pub mod pdf;

// Re-export commonly used items
pub use error::{Error, Result};
