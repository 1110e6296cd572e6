//! # Query Planner
//!
//! Ordering, filtering and pagination applied to collections the object
//! store returns. Items expose their sortable fields through [`Selectable`].
//!
//! Order of application is filter, sort, paginate.

mod labels;
mod parser;
mod selector;

pub use labels::{matches_label_filters, parse_label_filter};
pub use parser::{parse_filter, parse_order_by, FilterBy, OrderBy};
pub use selector::{Pagination, Query};

/// Collection element the planner can compare and match
pub trait Selectable {
    /// Field value used for sorting and filtering; `None` for unknown fields
    fn field(&self, name: &str) -> Option<String>;
}
