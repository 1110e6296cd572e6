//! # Data Selection
//!
//! Applies a parsed [`Query`] to a collection of [`Selectable`] items.

use super::parser::{parse_filter, parse_order_by, FilterBy, OrderBy};
use super::Selectable;
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::error::{AdmError, AdmResult};
use regex::Regex;
use std::cmp::Ordering;

/// Page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_size: usize,
    pub offset: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Pagination {
    /// `page_size` 0 selects the default page size
    pub fn new(page_size: i32, offset: i32) -> AdmResult<Self> {
        if !(0..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(AdmError::invalid(format!(
                "validation error:\n - page_size: value must be greater than or equal to 0 and less than or equal to {MAX_PAGE_SIZE} [int32.gte_lte]"
            )));
        }
        let Ok(offset) = usize::try_from(offset) else {
            return Err(AdmError::invalid(
                "validation error:\n - offset: value must be greater than or equal to 0 [uint32.gte]",
            ));
        };
        let page_size = match usize::try_from(page_size) {
            Ok(0) | Err(_) => DEFAULT_PAGE_SIZE,
            Ok(n) => n,
        };
        Ok(Self { page_size, offset })
    }

    fn window(&self, len: usize) -> Option<(usize, usize)> {
        if self.offset >= len {
            return None;
        }
        Some((self.offset, (self.offset + self.page_size).min(len)))
    }
}

/// Ordering, filter and page window of a List request
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub order_by: Vec<OrderBy>,
    pub filter: Vec<FilterBy>,
    pub pagination: Pagination,
}

impl Query {
    pub fn parse(order_by: &str, filter: &str, page_size: i32, offset: i32) -> AdmResult<Self> {
        Ok(Self {
            order_by: parse_order_by(order_by)?,
            filter: parse_filter(filter)?,
            pagination: Pagination::new(page_size, offset)?,
        })
    }

    /// Filter, sort, then cut the page
    pub fn select<T: Selectable>(&self, items: Vec<T>) -> Vec<T> {
        self.select_counted(items).0
    }

    /// Like [`Query::select`], also returning the number of items that passed the filter
    pub fn select_counted<T: Selectable>(&self, items: Vec<T>) -> (Vec<T>, usize) {
        let mut items = self.filter(items);
        let matched = items.len();
        self.sort(&mut items);
        (self.paginate(items), matched)
    }

    /// Keep items where any expression matches a known field
    pub fn filter<T: Selectable>(&self, items: Vec<T>) -> Vec<T> {
        if self.filter.is_empty() {
            return items;
        }
        items
            .into_iter()
            .filter(|item| {
                self.filter.iter().any(|f| {
                    item.field(&f.field)
                        .is_some_and(|value| contains(&value, &f.value))
                })
            })
            .collect()
    }

    pub fn sort<T: Selectable>(&self, items: &mut [T]) {
        if self.order_by.is_empty() {
            return;
        }
        items.sort_by(|a, b| self.compare(a, b));
    }

    fn compare<T: Selectable>(&self, a: &T, b: &T) -> Ordering {
        for clause in &self.order_by {
            let (Some(x), Some(y)) = (a.field(&clause.field), b.field(&clause.field)) else {
                break;
            };
            let ordering = x.to_lowercase().cmp(&y.to_lowercase());
            if ordering != Ordering::Equal {
                return if clause.ascending {
                    ordering
                } else {
                    ordering.reverse()
                };
            }
        }
        Ordering::Equal
    }

    pub fn paginate<T>(&self, items: Vec<T>) -> Vec<T> {
        match self.pagination.window(items.len()) {
            Some((start, end)) => items.into_iter().skip(start).take(end - start).collect(),
            None => Vec::new(),
        }
    }
}

/// Case-insensitive containment; `*` in `pattern` is a wildcard over the whole value
fn contains(value: &str, pattern: &str) -> bool {
    let value = value.to_lowercase();
    let pattern = pattern.to_lowercase();
    if !pattern.contains('*') {
        return value.contains(&pattern);
    }
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$")).is_ok_and(|re| re.is_match(&value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: &'static str,
        state: &'static str,
    }

    impl Selectable for Item {
        fn field(&self, name: &str) -> Option<String> {
            match name {
                "name" => Some(self.name.to_string()),
                "status" => Some(self.state.to_string()),
                _ => None,
            }
        }
    }

    fn items() -> Vec<Item> {
        vec![
            Item { name: "bravo", state: "RUNNING" },
            Item { name: "Alpha", state: "DOWN" },
            Item { name: "charlie", state: "RUNNING" },
        ]
    }

    #[test]
    fn test_pagination_bounds() {
        assert_eq!(Pagination::new(0, 0).unwrap().page_size, 10);
        assert_eq!(Pagination::new(100, 0).unwrap().page_size, 100);
        assert!(Pagination::new(101, 0).is_err());
        assert!(Pagination::new(-1, 0).is_err());
        assert_eq!(
            Pagination::new(10, -1).unwrap_err().message(),
            "validation error:\n - offset: value must be greater than or equal to 0 [uint32.gte]"
        );
    }

    #[test]
    fn test_sort_is_case_insensitive() {
        let query = Query::parse("name desc", "", 0, 0).unwrap();
        let names: Vec<_> = query.select(items()).iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["charlie", "bravo", "Alpha"]);
    }

    #[test]
    fn test_sort_by_two_fields() {
        let query = Query::parse("status asc, name asc", "", 0, 0).unwrap();
        let names: Vec<_> = query.select(items()).iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["Alpha", "bravo", "charlie"]);
    }

    #[test]
    fn test_unknown_sort_field_keeps_order() {
        let query = Query::parse("bogus", "", 0, 0).unwrap();
        assert_eq!(query.select(items()), items());
    }

    #[test]
    fn test_filter_contains_and_wildcard() {
        let query = Query::parse("", "name=ALP", 0, 0).unwrap();
        assert_eq!(query.select(items()).len(), 1);
        let query = Query::parse("", "name=*o", 0, 0).unwrap();
        assert_eq!(query.select(items())[0].name, "bravo");
        let query = Query::parse("", "name=c*e status=down", 0, 0).unwrap();
        assert_eq!(query.select(items()).len(), 2);
        let query = Query::parse("", "bogus=x", 0, 0).unwrap();
        assert!(query.select(items()).is_empty());
    }

    #[test]
    fn test_paginate_window() {
        let query = Query::parse("name", "", 2, 1).unwrap();
        let names: Vec<_> = query.select(items()).iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["bravo", "charlie"]);
        let query = Query::parse("", "", 2, 3).unwrap();
        assert!(query.select(items()).is_empty());
    }

    #[test]
    fn test_select_counted_reports_filtered_total() {
        let query = Query::parse("", "status=running", 1, 0).unwrap();
        let (page, matched) = query.select_counted(items());
        assert_eq!(page.len(), 1);
        assert_eq!(matched, 2);
    }
}
