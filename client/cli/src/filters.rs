//! Filter state for the file listing.
//!
//! Keystrokes and selections land in [`DraftFilters`]. The listing is fetched
//! from [`AppliedFilters`] only, and only the controller operations below move
//! values between the two records.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One filterable attribute of the listing, plus the sort preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    SearchTerm,
    FileType,
    MinSize,
    MaxSize,
    Ordering,
}

impl FilterField {
    /// Fields that count towards [`AppliedFilters::is_filtering`].
    pub const FILTERABLE: [FilterField; 4] = [
        FilterField::SearchTerm,
        FilterField::FileType,
        FilterField::MinSize,
        FilterField::MaxSize,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterField::SearchTerm => "searchTerm",
            FilterField::FileType => "fileType",
            FilterField::MinSize => "minSize",
            FilterField::MaxSize => "maxSize",
            FilterField::Ordering => "ordering",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Upload-time ordering of the listing. Newest first unless asked otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid sort order '{0}' (expected 'asc' or 'desc')")]
pub struct ParseSortOrderError(String);

impl SortOrder {
    /// Lenient token parsing: only `asc` selects ascending, anything else
    /// falls back to the default. Matches how the server reads `sort`.
    pub fn from_token(token: &str) -> Self {
        if token.trim().eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortOrder::Asc => "Oldest first",
            SortOrder::Desc => "Newest first",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ParseSortOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(ParseSortOrderError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTypeOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Common MIME types offered by the type selector. The empty token means any type.
pub const FILE_TYPES: &[FileTypeOption] = &[
    FileTypeOption { value: "", label: "All Types" },
    FileTypeOption { value: "application/pdf", label: "PDF" },
    FileTypeOption { value: "image/jpeg", label: "JPEG" },
    FileTypeOption { value: "image/png", label: "PNG" },
    FileTypeOption { value: "application/msword", label: "DOC" },
    FileTypeOption {
        value: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        label: "DOCX",
    },
    FileTypeOption { value: "text/plain", label: "TXT" },
    FileTypeOption { value: "application/zip", label: "ZIP" },
];

/// Display label for a file type token, or the token itself when it is not in the catalog.
pub fn file_type_label(token: &str) -> &str {
    FILE_TYPES
        .iter()
        .find(|t| t.value == token)
        .map(|t| t.label)
        .unwrap_or(token)
}

/// Values as currently edited, not yet used for fetching.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DraftFilters {
    pub search_term: String,
    pub file_type: String,
    /// Kilobytes, as typed.
    pub min_size: String,
    /// Kilobytes, as typed.
    pub max_size: String,
    pub ordering: SortOrder,
}

impl DraftFilters {
    pub fn get(&self, field: FilterField) -> &str {
        match field {
            FilterField::SearchTerm => &self.search_term,
            FilterField::FileType => &self.file_type,
            FilterField::MinSize => &self.min_size,
            FilterField::MaxSize => &self.max_size,
            FilterField::Ordering => self.ordering.as_str(),
        }
    }
}

/// The last committed filters. `is_filtering` is always derived from the
/// four filterable fields, which is why the fields are private.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppliedFilters {
    search_term: String,
    file_type: String,
    min_size: String,
    max_size: String,
    ordering: SortOrder,
    is_filtering: bool,
}

impl AppliedFilters {
    pub fn new(
        search_term: impl Into<String>,
        file_type: impl Into<String>,
        min_size: impl Into<String>,
        max_size: impl Into<String>,
        ordering: SortOrder,
    ) -> Self {
        let mut applied = Self {
            search_term: search_term.into(),
            file_type: file_type.into(),
            min_size: min_size.into(),
            max_size: max_size.into(),
            ordering,
            is_filtering: false,
        };
        applied.recompute_is_filtering();
        applied
    }

    fn from_drafts(drafts: &DraftFilters) -> Self {
        Self::new(
            drafts.search_term.clone(),
            drafts.file_type.clone(),
            drafts.min_size.clone(),
            drafts.max_size.clone(),
            drafts.ordering,
        )
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    pub fn min_size(&self) -> &str {
        &self.min_size
    }

    pub fn max_size(&self) -> &str {
        &self.max_size
    }

    pub fn ordering(&self) -> SortOrder {
        self.ordering
    }

    pub fn is_filtering(&self) -> bool {
        self.is_filtering
    }

    pub fn get(&self, field: FilterField) -> &str {
        match field {
            FilterField::SearchTerm => &self.search_term,
            FilterField::FileType => &self.file_type,
            FilterField::MinSize => &self.min_size,
            FilterField::MaxSize => &self.max_size,
            FilterField::Ordering => self.ordering.as_str(),
        }
    }

    /// Labels for the filters currently in effect, in display order.
    pub fn active_filters(&self) -> Vec<(FilterField, String)> {
        [
            (FilterField::SearchTerm, format!("Search: {}", self.search_term)),
            (FilterField::FileType, format!("Type: {}", file_type_label(&self.file_type))),
            (FilterField::MinSize, format!("Min Size: {} KB", self.min_size)),
            (FilterField::MaxSize, format!("Max Size: {} KB", self.max_size)),
        ]
        .into_iter()
        .filter(|(field, _)| !self.get(*field).is_empty())
        .collect()
    }

    fn clear(&mut self, field: FilterField) {
        match field {
            FilterField::SearchTerm => self.search_term.clear(),
            FilterField::FileType => self.file_type.clear(),
            FilterField::MinSize => self.min_size.clear(),
            FilterField::MaxSize => self.max_size.clear(),
            FilterField::Ordering => self.ordering = SortOrder::default(),
        }
        self.recompute_is_filtering();
    }

    fn recompute_is_filtering(&mut self) {
        self.is_filtering = FilterField::FILTERABLE
            .iter()
            .any(|field| !self.get(*field).is_empty());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Drafts mirror the applied filters.
    Synced,
    /// Drafts hold edits that have not been committed.
    Editing,
}

/// Owns the draft and applied records for one listing session.
#[derive(Debug, Clone, Default)]
pub struct FilterController {
    drafts: DraftFilters,
    applied: AppliedFilters,
    panel_open: bool,
    revision: u64,
}

impl FilterController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drafts(&self) -> &DraftFilters {
        &self.drafts
    }

    pub fn applied(&self) -> &AppliedFilters {
        &self.applied
    }

    /// Bumped every time the applied filters change. A listing fetched for an
    /// older revision is stale.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn state(&self) -> SyncState {
        let in_sync = FilterField::FILTERABLE
            .iter()
            .all(|field| self.drafts.get(*field) == self.applied.get(*field))
            && self.drafts.ordering == self.applied.ordering;
        if in_sync {
            SyncState::Synced
        } else {
            SyncState::Editing
        }
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }

    pub fn toggle_panel(&mut self) {
        self.panel_open = !self.panel_open;
    }

    /// Overwrite one draft value. Applied filters are untouched.
    pub fn set_draft(&mut self, field: FilterField, value: impl Into<String>) {
        let value = value.into();
        match field {
            FilterField::SearchTerm => self.drafts.search_term = value,
            FilterField::FileType => self.drafts.file_type = value,
            FilterField::MinSize => self.drafts.min_size = value,
            FilterField::MaxSize => self.drafts.max_size = value,
            FilterField::Ordering => self.drafts.ordering = SortOrder::from_token(&value),
        }
    }

    /// Promote every draft to the applied filters and close the filter panel.
    /// Always counts as a change, even when nothing differs.
    pub fn commit(&mut self) {
        self.applied = AppliedFilters::from_drafts(&self.drafts);
        self.panel_open = false;
        tracing::debug!(
            is_filtering = self.applied.is_filtering,
            ordering = %self.applied.ordering,
            "filters applied"
        );
        self.applied_changed();
    }

    /// Clear drafts and applied filters back to their initial values.
    pub fn reset(&mut self) {
        self.drafts = DraftFilters::default();
        self.applied = AppliedFilters::default();
        tracing::debug!("filters cleared");
        self.applied_changed();
    }

    /// Drop a single applied filter. Ordering cannot be empty, so removing it
    /// restores the default order instead.
    pub fn remove_field(&mut self, field: FilterField) {
        self.applied.clear(field);
        match field {
            FilterField::SearchTerm => self.drafts.search_term.clear(),
            FilterField::FileType => self.drafts.file_type.clear(),
            FilterField::MinSize => self.drafts.min_size.clear(),
            FilterField::MaxSize => self.drafts.max_size.clear(),
            FilterField::Ordering => self.drafts.ordering = SortOrder::default(),
        }
        tracing::debug!(%field, is_filtering = self.applied.is_filtering, "filter removed");
        self.applied_changed();
    }

    /// Sort order skips the draft/commit cycle and applies at once.
    pub fn change_sort_immediately(&mut self, order: SortOrder) {
        self.drafts.ordering = order;
        self.applied.ordering = order;
        tracing::debug!(ordering = %order, "sort order changed");
        self.applied_changed();
    }

    /// Overwrite every draft with the applied value so a reopened panel shows
    /// what is in effect rather than abandoned edits.
    pub fn reconcile_drafts_from_applied(&mut self) {
        self.drafts = DraftFilters {
            search_term: self.applied.search_term.clone(),
            file_type: self.applied.file_type.clone(),
            min_size: self.applied.min_size.clone(),
            max_size: self.applied.max_size.clone(),
            ordering: self.applied.ordering,
        };
    }

    fn applied_changed(&mut self) {
        self.revision = self.revision.wrapping_add(1);
        self.reconcile_drafts_from_applied();
    }
}
