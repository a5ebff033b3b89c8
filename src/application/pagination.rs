//! Page-number pagination over ordered listings.
//!
//! Resolution of the requested page follows the classic `get_page` rules: an
//! absent or non-numeric page yields the first page, a number outside
//! `1..=num_pages` yields the last page, and an empty listing still has one
//! empty page.

use std::num::NonZeroU32;

use serde::Serialize;

/// Default number of posts on a listing page.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Offset/limit pair handed to repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u32,
}

/// Splits a listing of known size into fixed-size pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: NonZeroU32,
    count: u64,
}

impl Paginator {
    pub fn new(per_page: NonZeroU32, count: u64) -> Self {
        Self { per_page, count }
    }

    /// Total number of pages, never less than one.
    pub fn num_pages(&self) -> u64 {
        self.count.div_ceil(u64::from(self.per_page.get())).max(1)
    }

    /// Resolve a raw `?page=` value to a valid page number.
    pub fn resolve(&self, raw: Option<&str>) -> u64 {
        let Some(value) = raw.map(str::trim) else {
            return 1;
        };

        let last = self.num_pages();
        let parsed = match value.parse::<i64>() {
            Ok(parsed) => parsed,
            // An integer too wide for i64 still names a page past the end.
            Err(_) if is_integer_literal(value) => return last,
            Err(_) => return 1,
        };

        match u64::try_from(parsed) {
            Ok(number) if (1..=last).contains(&number) => number,
            _ => last,
        }
    }

    /// Window covering `number`, which must already be resolved.
    pub fn window(&self, number: u64) -> PageWindow {
        let limit = self.per_page.get();
        PageWindow {
            offset: number.saturating_sub(1) * u64::from(limit),
            limit,
        }
    }

    pub fn page<T>(&self, number: u64, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number,
            num_pages: self.num_pages(),
            count: self.count,
            per_page: self.per_page.get(),
        }
    }
}

/// One page of a listing plus the metadata navigation needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_page_number(&self) -> u64 {
        self.number + 1
    }

    pub fn previous_page_number(&self) -> u64 {
        self.number.saturating_sub(1)
    }

    pub fn page_range(&self) -> Vec<u64> {
        (1..=self.num_pages).collect()
    }
}

fn is_integer_literal(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
