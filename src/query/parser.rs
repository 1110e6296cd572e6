//! # Query Parameter Parsing

use crate::error::{AdmError, AdmResult};

/// One `field [asc|desc]` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub ascending: bool,
}

/// One `field=value` expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterBy {
    pub field: String,
    pub value: String,
}

/// Parse `"name asc, displayName desc"`
pub fn parse_order_by(order_by: &str) -> AdmResult<Vec<OrderBy>> {
    if order_by.is_empty() {
        return Ok(Vec::new());
    }
    order_by
        .split(',')
        .map(|clause| {
            let parts: Vec<&str> = clause.split_whitespace().collect();
            let (field, ascending) = match parts.as_slice() {
                [field] => (*field, true),
                [field, direction] => match direction.to_lowercase().as_str() {
                    "asc" => (*field, true),
                    "desc" => (*field, false),
                    _ => {
                        return Err(AdmError::invalid(
                            "invalid order direction; must be 'asc' or 'desc'",
                        ))
                    }
                },
                _ => return Err(AdmError::invalid("invalid format for order by parameter")),
            };
            Ok(OrderBy {
                field: field.to_string(),
                ascending,
            })
        })
        .collect()
}

/// Parse whitespace-joined `field=value` expressions, optionally quoted
///
/// Expressions are alternatives. Boolean operators are not accepted.
pub fn parse_filter(filter: &str) -> AdmResult<Vec<FilterBy>> {
    let mut filter = filter.trim();
    if filter.len() > 1 && filter.starts_with('"') && filter.ends_with('"') {
        filter = &filter[1..filter.len() - 1];
    }
    filter
        .split_whitespace()
        .map(|expr| {
            if expr.eq_ignore_ascii_case("and") || expr.eq_ignore_ascii_case("or") {
                return Err(AdmError::invalid("invalid filter request"));
            }
            match expr.split_once('=') {
                Some((field, value)) if !field.is_empty() && !value.is_empty() => Ok(FilterBy {
                    field: field.to_string(),
                    value: value.to_string(),
                }),
                _ => Err(AdmError::invalid("invalid filter request")),
            }
        })
        .collect()
}
