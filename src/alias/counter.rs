//! Counter tracker
//!
//! Totals are only known once every page exists, so they are computed in one pass
//! over the finished page sequence and frozen in [`PageCounters`].

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Ordinal identifier of a page group, 1-based in creation order
pub type GroupId = u32;

/// A sub-range of pages with its own numbering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageGroup {
    pub id: GroupId,
    /// Explicit total; when unset the total is the number of member pages
    pub total_override: Option<usize>,
}

/// Group-relative position of one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPosition {
    pub group: GroupId,
    /// 1-based position of the page inside its group
    pub ordinal: usize,
    pub total: usize,
}

/// Final page counts, computed once after generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCounters {
    page_count: usize,
    group_totals: BTreeMap<GroupId, usize>,
    positions: Vec<Option<GroupPosition>>,
}

impl PageCounters {
    /// Count pages and group membership
    ///
    /// `memberships` holds the group of each page in index order.
    pub fn compute(memberships: &[Option<GroupId>], groups: &[PageGroup]) -> Result<Self> {
        let mut counted: BTreeMap<GroupId, usize> = BTreeMap::new();
        for group in memberships.iter().flatten() {
            if !groups.iter().any(|g| g.id == *group) {
                return Err(Error::GroupNotFound(*group));
            }
            *counted.entry(*group).or_insert(0) += 1;
        }

        let group_totals: BTreeMap<GroupId, usize> = groups
            .iter()
            .map(|group| {
                let members = counted.get(&group.id).copied().unwrap_or(0);
                (group.id, group.total_override.unwrap_or(members))
            })
            .collect();

        let mut seen: BTreeMap<GroupId, usize> = BTreeMap::new();
        let positions = memberships
            .iter()
            .map(|membership| {
                membership.map(|group| {
                    let ordinal = seen.entry(group).or_insert(0);
                    *ordinal += 1;
                    GroupPosition {
                        group,
                        ordinal: *ordinal,
                        total: group_totals.get(&group).copied().unwrap_or(0),
                    }
                })
            })
            .collect();

        let counters = Self {
            page_count: memberships.len(),
            group_totals,
            positions,
        };
        log::debug!(
            "Counted {} pages in {} groups: {:?}",
            counters.page_count,
            counters.group_totals.len(),
            counters.group_totals
        );
        Ok(counters)
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn group_total(&self, group: GroupId) -> Option<usize> {
        self.group_totals.get(&group).copied()
    }

    /// Group position of the page at 1-based `index`, `None` for ungrouped pages
    pub fn position(&self, index: usize) -> Result<Option<GroupPosition>> {
        index
            .checked_sub(1)
            .and_then(|i| self.positions.get(i))
            .copied()
            .ok_or(Error::PageNotFound(index))
    }
}
