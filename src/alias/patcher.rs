//! Stream patcher
//!
//! Replaces alias tokens in a serialized page buffer with their resolved numerals
//! and compensates the width change at right-shift anchors.

use serde::{Deserialize, Serialize};

use crate::alias::registry::{find, AliasKind, AliasToken, Encoding, TokenRegistry};
use crate::alias::resolver::PageAliases;

/// Marker the layout leaves around vector graphics scopes
pub const EPS_MARKER: &str = "x#!#EPS#!#x";

/// Largest accepted [`PatchConfig::shift_ratio`]
pub const MAX_SHIFT_RATIO: f64 = 16.0;

/// Tuning for the patch pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatchConfig {
    /// Spaces emitted per character of remaining anchor width
    pub shift_ratio: f64,
    /// Generation-only byte sequences stripped after substitution
    pub internal_markers: Vec<String>,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            shift_ratio: 1.0,
            internal_markers: vec![EPS_MARKER.to_string()],
        }
    }
}

/// One token variant replaced on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub kind: AliasKind,
    pub encoding: Encoding,
    pub occurrences: usize,
    pub byte_delta: i64,
    pub unit_delta: i64,
}

/// What the patcher did to one buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub substitutions: Vec<Substitution>,
    /// Unit delta of largest magnitude, sign kept
    pub max_delta: i64,
    /// Characters the content after each anchor moved left
    pub shift: i64,
    pub anchors: usize,
    /// Token-shaped runs left untouched, as (offset, bytes) in the patched buffer
    pub unknown_tokens: Vec<(usize, Vec<u8>)>,
    pub original_len: usize,
    pub patched_len: usize,
}

/// Patched buffer together with its report
#[derive(Debug, Clone)]
pub struct PatchedBuffer {
    pub bytes: Vec<u8>,
    pub report: PatchReport,
}

pub struct StreamPatcher<'a> {
    registry: &'a TokenRegistry,
    config: &'a PatchConfig,
}

impl<'a> StreamPatcher<'a> {
    pub fn new(registry: &'a TokenRegistry, config: &'a PatchConfig) -> Self {
        Self { registry, config }
    }

    /// Patch one page buffer with the page's resolved aliases
    pub fn patch(&self, buffer: &[u8], aliases: &PageAliases) -> PatchedBuffer {
        let mut bytes = buffer.to_vec();
        let mut report = PatchReport {
            original_len: buffer.len(),
            ..PatchReport::default()
        };

        for kind in AliasKind::SUBSTITUTION_ORDER {
            for token in self.registry.tokens_of(kind) {
                let Some(resolved) = aliases.get(kind) else {
                    if find(&bytes, &token.bytes, 0).is_some() {
                        log::warn!(
                            "Page {} has no value for {:?}, leaving its tokens in place",
                            aliases.index,
                            kind
                        );
                    }
                    continue;
                };

                let occurrences = replace_all(&mut bytes, &token.bytes, resolved.encoded(token.encoding));
                if occurrences == 0 {
                    continue;
                }

                let substitution = Substitution {
                    kind,
                    encoding: token.encoding,
                    occurrences,
                    byte_delta: resolved.width_delta(token),
                    unit_delta: resolved.unit_delta(token),
                };
                log::trace!(
                    "Page {}: {} x {:?}/{:?} -> {:?} (delta {} bytes)",
                    aliases.index,
                    occurrences,
                    kind,
                    token.encoding,
                    resolved.text,
                    substitution.byte_delta
                );
                if substitution.unit_delta.abs() > report.max_delta.abs() {
                    report.max_delta = substitution.unit_delta;
                }
                report.substitutions.push(substitution);
            }
        }

        for anchor in self.registry.tokens_of(AliasKind::RightShiftAnchor) {
            let occurrences = self.shift_anchor(&mut bytes, anchor, report.max_delta, aliases.index);
            if occurrences > 0 {
                report.anchors += occurrences;
                report.shift = report.max_delta.min(anchor.reserved_chars() as i64);
            }
        }

        for marker in &self.config.internal_markers {
            replace_all(&mut bytes, marker.as_bytes(), &[]);
        }

        report.unknown_tokens = self.registry.unrecognized_tokens(&bytes);
        for (offset, token) in &report.unknown_tokens {
            log::warn!(
                "Page {}: unrecognized alias token {:?} at offset {}",
                aliases.index,
                String::from_utf8_lossy(token),
                offset
            );
        }

        report.patched_len = bytes.len();
        PatchedBuffer { bytes, report }
    }

    /// Replace each anchor with padding that absorbs `delta` characters
    fn shift_anchor(&self, bytes: &mut Vec<u8>, anchor: &AliasToken, delta: i64, page: usize) -> usize {
        let width = anchor.reserved_chars() as i64;
        let ratio = self.config.shift_ratio.clamp(0.0, MAX_SHIFT_RATIO);
        let remaining = ((width - delta) as f64 * ratio).floor() as i64;
        if remaining < 0 {
            log::warn!(
                "Page {}: width delta {} exceeds the anchor budget of {} characters",
                page,
                delta,
                width
            );
        }

        let padding = " ".repeat(remaining.max(0) as usize);
        replace_all(bytes, &anchor.bytes, &anchor.encoding.encode(&padding))
    }
}

/// Replace every non-overlapping occurrence of `from`, returning the count
fn replace_all(bytes: &mut Vec<u8>, from: &[u8], to: &[u8]) -> usize {
    let mut occurrences = 0;
    let mut patched = Vec::with_capacity(bytes.len());
    let mut cursor = 0;

    while let Some(position) = find(bytes, from, cursor) {
        patched.extend_from_slice(&bytes[cursor..position]);
        patched.extend_from_slice(to);
        cursor = position + from.len();
        occurrences += 1;
    }

    if occurrences > 0 {
        patched.extend_from_slice(&bytes[cursor..]);
        *bytes = patched;
    }
    occurrences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::counter::{PageCounters, PageGroup};
    use crate::alias::registry::{encode_wide, TokenStyle};
    use crate::alias::resolver::{AliasResolver, NumberingStyle};

    fn aliases(pages: usize, index: usize, unicode: bool) -> PageAliases {
        let counters = PageCounters::compute(&vec![None; pages], &[]).unwrap();
        AliasResolver::new(Some(&counters), 1, NumberingStyle::Decimal, unicode)
            .resolve_page(index)
            .unwrap()
    }

    fn one_digit_registry() -> TokenRegistry {
        let mut registry = TokenRegistry::new();
        registry
            .register(AliasToken::new(AliasKind::TotalPages, Encoding::Narrow, b"#".to_vec()))
            .unwrap();
        registry
            .register(AliasToken::new(AliasKind::AbsolutePageNumber, Encoding::Narrow, b"@".to_vec()))
            .unwrap();
        registry
            .register(AliasToken::new(AliasKind::RightShiftAnchor, Encoding::Narrow, b"%%".to_vec()))
            .unwrap();
        registry
    }

    #[test]
    fn test_standard_tokens_replaced() {
        let registry = TokenRegistry::standard(false, TokenStyle::Textual);
        let config = PatchConfig::default();
        let patched = StreamPatcher::new(&registry, &config)
            .patch(b"(Page {:pnp:} of {:ptp:}) Tj", &aliases(3, 2, false));

        assert_eq!(patched.bytes, b"(Page 2 of 3) Tj".to_vec());
        assert_eq!(patched.report.substitutions.len(), 2);
        assert_eq!(patched.report.max_delta, -6);
        assert!(patched.report.unknown_tokens.is_empty());
    }

    #[test]
    fn test_wrapped_form_consumed_before_bare_form() {
        let registry = TokenRegistry::standard(false, TokenStyle::Textual);
        let config = PatchConfig::default();
        let patched = StreamPatcher::new(&registry, &config)
            .patch(b"{{:ptp:}}/{:ptp:}", &aliases(4, 1, false));
        assert_eq!(patched.bytes, b"4/4".to_vec());
    }

    #[test]
    fn test_equal_width_keeps_length() {
        let registry = one_digit_registry();
        let config = PatchConfig::default();
        let buffer = b"BT (@ / #%%right) Tj ET";
        let patched = StreamPatcher::new(&registry, &config).patch(buffer, &aliases(9, 4, false));

        assert_eq!(patched.bytes, b"BT (4 / 9  right) Tj ET".to_vec());
        assert_eq!(patched.report.original_len, patched.report.patched_len);
        assert_eq!(patched.report.max_delta, 0);
        assert_eq!(patched.report.shift, 0);
    }

    #[test]
    fn test_wider_total_shifts_anchor() {
        let registry = one_digit_registry();
        let config = PatchConfig::default();
        let buffer = b"(#%%right)";
        let patched = StreamPatcher::new(&registry, &config).patch(buffer, &aliases(12, 1, false));

        assert_eq!(patched.bytes, b"(12 right)".to_vec());
        assert_eq!(patched.bytes.len(), buffer.len());
        assert_eq!(patched.report.max_delta, 1);
        assert_eq!(patched.report.shift, 1);
        assert_eq!(patched.report.anchors, 1);
    }

    #[test]
    fn test_delta_over_budget_clamps_padding() {
        let registry = one_digit_registry();
        let config = PatchConfig::default();
        let patched = StreamPatcher::new(&registry, &config).patch(b"#%%", &aliases(1000, 1, false));
        assert_eq!(patched.bytes, b"1000".to_vec());
        assert_eq!(patched.report.max_delta, 3);
        assert_eq!(patched.report.shift, 2);
    }

    #[test]
    fn test_shift_ratio_clamped() {
        let registry = one_digit_registry();
        let config = PatchConfig { shift_ratio: 1e12, ..PatchConfig::default() };
        let patched = StreamPatcher::new(&registry, &config).patch(b"#%%", &aliases(9, 1, false));

        let mut expected = b"9".to_vec();
        expected.extend(vec![b' '; 2 * MAX_SHIFT_RATIO as usize]);
        assert_eq!(patched.bytes, expected);
    }

    #[test]
    fn test_wide_tokens() {
        let registry = TokenRegistry::standard(true, TokenStyle::Textual);
        let config = PatchConfig::default();
        let mut buffer = b"(".to_vec();
        buffer.extend(encode_wide("{{:ptp:}}"));
        buffer.extend(b") Tj");

        let patched = StreamPatcher::new(&registry, &config).patch(&buffer, &aliases(12, 1, true));
        assert_eq!(patched.bytes, b"(\x001\x002) Tj".to_vec());

        let substitution = &patched.report.substitutions[0];
        assert_eq!(substitution.encoding, Encoding::Wide);
        assert_eq!(substitution.byte_delta, 4 - 18);
        assert_eq!(substitution.unit_delta, -7);
    }

    #[test]
    fn test_guarded_wide_tokens_leave_user_text_alone() {
        let registry = TokenRegistry::standard(true, TokenStyle::Guarded);
        let config = PatchConfig::default();
        let text = format!(
            "{}/{} {{:pnp:}}",
            AliasKind::AbsolutePageNumber.markup(TokenStyle::Guarded, false),
            AliasKind::TotalPages.markup(TokenStyle::Guarded, false)
        );
        let patched = StreamPatcher::new(&registry, &config).patch(&encode_wide(&text), &aliases(3, 2, true));

        assert_eq!(patched.bytes, encode_wide("2/3 {:pnp:}"));
        assert_eq!(patched.report.substitutions.len(), 2);
        assert!(patched.report.substitutions.iter().all(|s| s.encoding == Encoding::Wide));
        assert_eq!(patched.report.max_delta, -8);
        assert_eq!(patched.report.unknown_tokens, vec![(8, encode_wide("{:pnp:}"))]);
    }

    #[test]
    fn test_wide_anchor_padded_in_wide_spaces() {
        let mut registry = TokenRegistry::new();
        registry
            .register(AliasToken::new(AliasKind::TotalPages, Encoding::Wide, encode_wide("#")))
            .unwrap();
        registry
            .register(AliasToken::new(AliasKind::RightShiftAnchor, Encoding::Wide, encode_wide("%%%")))
            .unwrap();
        let config = PatchConfig::default();
        let buffer = encode_wide("#%%%end");
        let patched = StreamPatcher::new(&registry, &config).patch(&buffer, &aliases(12, 1, true));

        assert_eq!(patched.bytes, encode_wide("12  end"));
        assert_eq!(patched.bytes.len(), buffer.len());
        assert_eq!(patched.report.substitutions[0].byte_delta, 2);
        assert_eq!(patched.report.max_delta, 1);
        assert_eq!(patched.report.shift, 1);
        assert_eq!(patched.report.anchors, 1);
    }

    #[test]
    fn test_group_tokens_on_ungrouped_page_left_in_place() {
        let registry = TokenRegistry::standard(false, TokenStyle::Textual);
        let config = PatchConfig::default();
        let patched = StreamPatcher::new(&registry, &config).patch(b"{:png:}", &aliases(2, 1, false));
        assert_eq!(patched.bytes, b"{:png:}".to_vec());
        assert!(patched.report.substitutions.is_empty());
    }

    #[test]
    fn test_group_tokens_resolved() {
        let memberships = [Some(1), Some(1), Some(2)];
        let groups = [
            PageGroup { id: 1, total_override: None },
            PageGroup { id: 2, total_override: None },
        ];
        let counters = PageCounters::compute(&memberships, &groups).unwrap();
        let page = AliasResolver::new(Some(&counters), 1, NumberingStyle::Decimal, false)
            .resolve_page(2)
            .unwrap();

        let registry = TokenRegistry::standard(false, TokenStyle::Textual);
        let config = PatchConfig::default();
        let patched = StreamPatcher::new(&registry, &config).patch(b"{:png:}/{:ptg:} ({:pnp:})", &page);
        assert_eq!(patched.bytes, b"2/2 (2)".to_vec());
    }

    #[test]
    fn test_internal_marker_removed() {
        let registry = TokenRegistry::standard(false, TokenStyle::Textual);
        let config = PatchConfig::default();
        let patched = StreamPatcher::new(&registry, &config)
            .patch(b"q x#!#EPS#!#x1 0 0 1 0 0 cm Q", &aliases(1, 1, false));
        assert_eq!(patched.bytes, b"q 1 0 0 1 0 0 cm Q".to_vec());
    }

    #[test]
    fn test_unknown_token_reported_not_modified() {
        let registry = TokenRegistry::standard(false, TokenStyle::Textual);
        let config = PatchConfig::default();
        let patched = StreamPatcher::new(&registry, &config).patch(b"({:abc:})", &aliases(1, 1, false));
        assert_eq!(patched.bytes, b"({:abc:})".to_vec());
        assert_eq!(patched.report.unknown_tokens, vec![(1, b"{:abc:}".to_vec())]);
    }

    #[test]
    fn test_replace_all() {
        let mut bytes = b"aXbXc".to_vec();
        assert_eq!(replace_all(&mut bytes, b"X", b"--"), 2);
        assert_eq!(bytes, b"a--b--c".to_vec());
        assert_eq!(replace_all(&mut bytes, b"Z", b""), 0);
    }
}
