//! Client-supplied name filters.
//!
//! A filter arrives as a `;`-separated list of names; the literal `ALL`
//! disables it. Values are always bound as one `text[]` parameter and matched
//! with `= ANY(..)`, so quotes or other punctuation inside a name are matched
//! literally instead of ending up in the SQL text.

use sqlx::{Postgres, QueryBuilder};
use thiserror::Error;

/// Sentinel meaning "no filter on this dimension".
pub const ALL: &str = "ALL";

/// Separator between names in a filter parameter.
pub const SEPARATOR: char = ';';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameFilter {
    All,
    Only(Vec<String>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("filter '{param}' has {count} values; at most {max} are allowed")]
    TooManyValues {
        param: &'static str,
        count: usize,
        max: usize,
    },
    #[error("filter '{param}' contains a NUL character")]
    NulCharacter { param: &'static str },
}

impl NameFilter {
    /// Absent, empty and `ALL` all mean no filter. Anything else is split on
    /// `;` without trimming; empty pieces stay as names that match nothing.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") | Some(ALL) => NameFilter::All,
            Some(list) => NameFilter::Only(split_names(list)),
        }
    }

    pub fn values(&self) -> Option<&[String]> {
        match self {
            NameFilter::All => None,
            NameFilter::Only(values) => Some(values),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, NameFilter::All)
    }

    pub fn validate(&self, param: &'static str, max_values: usize) -> Result<(), FilterError> {
        let Some(values) = self.values() else {
            return Ok(());
        };
        if values.len() > max_values {
            return Err(FilterError::TooManyValues {
                param,
                count: values.len(),
                max: max_values,
            });
        }
        // Postgres text cannot hold NUL; reject instead of failing in the driver.
        if values.iter().any(|v| v.contains('\0')) {
            return Err(FilterError::NulCharacter { param });
        }
        Ok(())
    }
}

pub fn split_names(list: &str) -> Vec<String> {
    list.split(SEPARATOR).map(str::to_owned).collect()
}

/// Append one `column = ANY($n)` predicate per active filter, joined with AND.
/// Inactive (`ALL`) filters add nothing; with no active filter no WHERE is emitted.
pub fn push_where(qb: &mut QueryBuilder<'_, Postgres>, filters: &[(&str, &NameFilter)]) {
    let mut first = true;
    for (column, filter) in filters {
        let Some(values) = filter.values() else {
            continue;
        };
        qb.push(if first { " WHERE " } else { " AND " });
        first = false;
        qb.push(*column)
            .push(" = ANY(")
            .push_bind(values.to_vec())
            .push(")");
    }
}
