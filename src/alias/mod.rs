//! Page number aliases
//!
//! Placeholder tokens are written while pages are generated, counted once every page
//! exists, resolved per page and finally patched into the page buffers.

pub mod counter;
pub mod patcher;
pub mod registry;
pub mod resolver;

pub use counter::{GroupId, GroupPosition, PageCounters, PageGroup};
pub use patcher::{PatchConfig, MAX_SHIFT_RATIO, PatchReport, PatchedBuffer, StreamPatcher, Substitution};
pub use registry::{AliasKind, AliasToken, Encoding, TokenRegistry, TokenStyle};
pub use resolver::{AliasResolver, NumberingStyle, PageAliases, ResolvedAlias};
