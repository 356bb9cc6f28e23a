//! Paginated document
//!
//! Owns the pages and page groups of one output document and drives them through
//! generation, alias resolution and emission.

use lopdf::ObjectId;

use crate::alias::{
    AliasResolver, AliasToken, GroupId, PageCounters, PageGroup, PatchReport, StreamPatcher,
    TokenRegistry,
};
use crate::config::DocumentConfig;
use crate::error::{Error, Result};
use crate::layout::PageDimensions;
use crate::pdf::emit::{EmitOptions, ObjectWriter, PageEmitter, PageSource};
use crate::pdf::headers::HeaderFooterRewriter;

/// Lifecycle of a page, each step taken exactly once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Content may still be written; tokens unresolved
    Draft,
    /// Tokens resolved, ready for emission
    Finalized,
    Emitted,
}

/// One page of the document
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based
    pub index: usize,
    pub buffer: Vec<u8>,
    pub dimensions: PageDimensions,
    pub group: Option<GroupId>,
    pub annotations: Vec<ObjectId>,
    pub state: PageState,
    /// Set when the page is finalized
    pub report: Option<PatchReport>,
}

/// Result of emitting every page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitSummary {
    pub pages_id: ObjectId,
    pub page_ids: Vec<ObjectId>,
}

pub struct PaginatedDocument {
    config: DocumentConfig,
    registry: TokenRegistry,
    pages: Vec<Page>,
    groups: Vec<PageGroup>,
    current_group: Option<GroupId>,
    counters: Option<PageCounters>,
}

impl PaginatedDocument {
    /// Document using the standard token set for the configured font mode
    pub fn new(config: DocumentConfig) -> Result<Self> {
        let registry = TokenRegistry::standard(config.unicode, config.token_style);
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: DocumentConfig, registry: TokenRegistry) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            pages: Vec::new(),
            groups: Vec::new(),
            current_group: None,
            counters: None,
        })
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// Register an extra token the layout will write
    pub fn register_token(&mut self, token: AliasToken) -> Result<()> {
        self.ensure_generating("register an alias token")?;
        self.registry.register(token)
    }

    /// Rewriter for the configured header and footer
    pub fn header_footer(&self) -> HeaderFooterRewriter {
        HeaderFooterRewriter::new(
            self.config.header_footer.clone(),
            self.config.unicode,
            self.config.token_style,
        )
    }

    /// Dimensions of a page in the configured format and orientation
    pub fn default_dimensions(&self) -> PageDimensions {
        PageDimensions::from_format(&self.config.page_format, self.config.orientation)
    }

    pub fn is_generating(&self) -> bool {
        self.counters.is_none()
    }

    /// Start a new group; pages added from now on belong to it
    pub fn start_page_group(&mut self, total_override: Option<usize>) -> Result<GroupId> {
        self.ensure_generating("start a page group")?;
        let id = self.groups.len() as GroupId + 1;
        self.groups.push(PageGroup { id, total_override });
        self.current_group = Some(id);
        log::debug!("Started page group {} at page {}", id, self.pages.len() + 1);
        Ok(id)
    }

    pub fn end_page_group(&mut self) -> Result<()> {
        self.ensure_generating("end a page group")?;
        match self.current_group.take() {
            Some(id) => {
                log::debug!("Ended page group {} after page {}", id, self.pages.len());
                Ok(())
            }
            None => Err(Error::InvalidState("No page group is open".to_string())),
        }
    }

    /// Append a page, returning its 1-based index
    pub fn add_page(&mut self, dimensions: PageDimensions) -> Result<usize> {
        self.ensure_generating("add a page")?;
        let index = self.pages.len() + 1;
        self.pages.push(Page {
            index,
            buffer: Vec::new(),
            dimensions,
            group: self.current_group,
            annotations: Vec::new(),
            state: PageState::Draft,
            report: None,
        });
        Ok(index)
    }

    /// Append serialized content to a page
    pub fn write_content(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        self.ensure_generating("write page content")?;
        self.page_mut(index)?.buffer.extend_from_slice(bytes);
        Ok(())
    }

    pub fn add_annotation(&mut self, index: usize, annotation: ObjectId) -> Result<()> {
        self.ensure_generating("add an annotation")?;
        self.page_mut(index)?.annotations.push(annotation);
        Ok(())
    }

    /// Close generation and freeze the page counters
    pub fn finish_generation(&mut self) -> Result<&PageCounters> {
        self.ensure_generating("finish generation")?;
        let memberships: Vec<Option<GroupId>> = self.pages.iter().map(|page| page.group).collect();
        let counters = PageCounters::compute(&memberships, &self.groups)?;
        self.current_group = None;
        log::debug!("Generation finished with {} pages", counters.page_count());
        Ok(self.counters.insert(counters))
    }

    pub fn counters(&self) -> Option<&PageCounters> {
        self.counters.as_ref()
    }

    pub fn resolver(&self) -> AliasResolver<'_> {
        AliasResolver::new(
            self.counters.as_ref(),
            self.config.starting_page_number,
            self.config.numbering_style,
            self.config.unicode,
        )
    }

    /// Resolve and patch the aliases of one page, making it Finalized
    ///
    /// Pages are finalized in index order.
    pub fn resolve_page(&mut self, index: usize) -> Result<&PatchReport> {
        if self.counters.is_none() {
            return Err(Error::PrematureResolution);
        }
        let page = self.page(index)?;
        if page.state != PageState::Draft {
            return Err(Error::InvalidState(format!("Page {} is already finalized", index)));
        }
        if index > 1 && self.page(index - 1)?.state == PageState::Draft {
            return Err(Error::InvalidState(format!(
                "Page {} finalized before page {}",
                index,
                index - 1
            )));
        }

        let aliases = self.resolver().resolve_page(index)?;
        let patched = StreamPatcher::new(&self.registry, &self.config.patch).patch(&page.buffer, &aliases);
        log::debug!(
            "Finalized page {}: {} substitutions, delta {}, {} -> {} bytes",
            index,
            patched.report.substitutions.len(),
            patched.report.max_delta,
            patched.report.original_len,
            patched.report.patched_len
        );

        let page = self.page_mut(index)?;
        page.buffer = patched.bytes;
        page.state = PageState::Finalized;
        Ok(page.report.insert(patched.report))
    }

    /// Finalize every page still in Draft
    pub fn resolve_all(&mut self) -> Result<Vec<PatchReport>> {
        let mut reports = Vec::new();
        for index in 1..=self.pages.len() {
            if self.page(index)?.state == PageState::Draft {
                reports.push(self.resolve_page(index)?.clone());
            }
        }
        Ok(reports)
    }

    /// Emit every page and the root page tree through `writer`
    ///
    /// All pages must be Finalized; nothing is written otherwise.
    pub fn emit(&mut self, writer: &mut dyn ObjectWriter, options: &EmitOptions) -> Result<EmitSummary> {
        if let Some(page) = self.pages.iter().find(|page| page.state != PageState::Finalized) {
            return Err(Error::InvalidState(format!(
                "Page {} is {:?}, expected Finalized",
                page.index, page.state
            )));
        }

        let mut emitter = PageEmitter::new(options);
        let pages_id = emitter.begin(writer);
        let mut page_ids = Vec::with_capacity(self.pages.len());
        for index in 1..=self.pages.len() {
            let emitted = emitter.emit_page(&*self, index, writer)?;
            page_ids.push(emitted.page_id);
        }
        emitter.finish(writer)?;

        // Pages stay Finalized unless the whole tree made it out
        for page in &mut self.pages {
            page.state = PageState::Emitted;
        }

        Ok(EmitSummary { pages_id, page_ids })
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Result<&Page> {
        index
            .checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .ok_or(Error::PageNotFound(index))
    }

    fn page_mut(&mut self, index: usize) -> Result<&mut Page> {
        index
            .checked_sub(1)
            .and_then(|i| self.pages.get_mut(i))
            .ok_or(Error::PageNotFound(index))
    }

    fn ensure_generating(&self, action: &str) -> Result<()> {
        if self.is_generating() {
            Ok(())
        } else {
            Err(Error::InvalidState(format!("Cannot {} after generation finished", action)))
        }
    }
}

impl PageSource for PaginatedDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_state(&self, index: usize) -> Result<PageState> {
        Ok(self.page(index)?.state)
    }

    fn page_buffer(&self, index: usize) -> Result<&[u8]> {
        Ok(&self.page(index)?.buffer)
    }

    fn page_dimensions(&self, index: usize) -> Result<&PageDimensions> {
        Ok(&self.page(index)?.dimensions)
    }

    fn page_annotations(&self, index: usize) -> Result<&[ObjectId]> {
        Ok(&self.page(index)?.annotations)
    }
}
