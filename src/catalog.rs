//! Series returned by catalog queries and their aggregation.

use crate::library::union_shelves;
use serde::Deserialize;
use std::collections::BTreeMap;

/// A server-side series, tagged with the shelves of the queries matching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    /// Server-assigned identifier.
    pub id: i64,
    /// Names of the queries that returned this series.
    pub shelves: Vec<String>,
}

/// Series keyed by identity.
pub type SeriesMap = BTreeMap<i64, Series>;

/// The part of a series response we read.
#[derive(Debug, Deserialize)]
pub(crate) struct SeriesDto {
    pub id: i64,
}

impl Series {
    /// Tag a series with the query that found it.
    pub fn tagged(id: i64, shelf: &str) -> Self {
        Self {
            id,
            shelves: vec![shelf.to_string()],
        }
    }
}

/// Insert `series`, or extend the shelves of the entry already holding its id.
pub fn merge_series(map: &mut SeriesMap, series: Series) {
    match map.get_mut(&series.id) {
        Some(existing) => union_shelves(&mut existing.shelves, &series.shelves),
        None => {
            map.insert(series.id, series);
        }
    }
}

/// Merge per-query results into one map.
pub fn aggregate<I>(per_query: I) -> SeriesMap
where
    I: IntoIterator<Item = Vec<Series>>,
{
    let mut map = SeriesMap::new();
    for list in per_query {
        for series in list {
            merge_series(&mut map, series);
        }
    }
    map
}
