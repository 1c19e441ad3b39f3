//! Page requests and page responses for the event listing.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::validation::ValidationErrors;

/// Maximum page size accepted from clients
const MAX_PAGE_SIZE: u32 = 100;

/// Default page size
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Columns an event page may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSortField {
    Id,
    Name,
    Date,
    Location,
}

impl EventSortField {
    /// Column name, safe to splice into SQL since it never comes from input.
    pub fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Date => "date",
            Self::Location => "location",
        }
    }

    /// Text columns order case-insensitively, with the raw value breaking ties.
    pub fn is_text(self) -> bool {
        matches!(self, Self::Name | Self::Location)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: EventSortField,
    pub direction: Direction,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: EventSortField::Name,
            direction: Direction::Asc,
        }
    }
}

impl Sort {
    /// Parses `field` or `field,asc|desc`.
    pub fn parse(raw: &str) -> Result<Self, ValidationErrors> {
        let mut parts = raw.split(',').map(str::trim);
        let field = match parts.next().unwrap_or_default().to_ascii_lowercase().as_str() {
            "id" => EventSortField::Id,
            "name" => EventSortField::Name,
            "date" => EventSortField::Date,
            "location" => EventSortField::Location,
            other => {
                return Err(ValidationErrors::single(
                    "sort",
                    format!("Unknown sort field '{other}'. Allowed: id, name, date, location."),
                ));
            }
        };
        let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("") | Some("asc") => Direction::Asc,
            Some("desc") => Direction::Desc,
            Some(other) => {
                return Err(ValidationErrors::single(
                    "sort",
                    format!("Unknown sort direction '{other}'. Allowed: asc, desc."),
                ));
            }
        };
        Ok(Self { field, direction })
    }

    /// ORDER BY body for the events table. Ties always fall back to the id so
    /// pages are stable. Built only from whitelisted fields.
    pub fn order_by_sql(&self) -> String {
        let column = self.field.column();
        let dir = self.direction.keyword();
        if self.field == EventSortField::Id {
            format!("id {dir}")
        } else if self.field.is_text() {
            format!("LOWER({column}) {dir}, {column} COLLATE \"C\" {dir}, id ASC")
        } else {
            format!("{column} {dir}, id ASC")
        }
    }
}

/// PageRequest
///
/// A zero-based page request. Size is clamped to `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub sort: Sort,
}

impl PageRequest {
    pub fn new(page: u32, size: u32, sort: Sort) -> Self {
        Self {
            page,
            size: size.clamp(1, MAX_PAGE_SIZE),
            sort,
        }
    }

    /// SQL OFFSET value.
    pub fn offset(&self) -> u64 {
        self.page as u64 * self.size as u64
    }

    /// SQL LIMIT value.
    pub fn limit(&self) -> u32 {
        self.size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE, Sort::default())
    }
}

/// Page
///
/// One page of results plus the metadata clients need to navigate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_elements: i64,
    pub total_pages: u32,
    pub last: bool,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: i64) -> Self {
        let total = total_elements.max(0) as u64;
        let size = request.size as u64;
        let total_pages = total.div_ceil(size) as u32;
        Self {
            content,
            page_number: request.page,
            page_size: request.size,
            total_elements,
            total_pages,
            last: request.page as u64 + 1 >= total_pages as u64,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_size: self.page_size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            last: self.last,
        }
    }
}
