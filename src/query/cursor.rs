use std::cmp::Ordering;

use super::compare::compare_optional;
use crate::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Post-match shaping of a result set.
///
/// Applied in a fixed order regardless of how the options were built:
/// sort, then skip, then limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub sort: Vec<(String, SortOrder)>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((field.into(), order));
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sort.is_empty() && self.skip.is_none() && self.limit.is_none()
    }
}

/// Matched documents awaiting sort/skip/limit.
#[derive(Debug, Clone)]
pub struct Cursor {
    documents: Vec<Document>,
    options: QueryOptions,
}

impl Cursor {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            options: QueryOptions::default(),
        }
    }

    /// Add sort keys; earlier keys take precedence.
    pub fn sort<I, K>(mut self, spec: I) -> Self
    where
        I: IntoIterator<Item = (K, SortOrder)>,
        K: Into<String>,
    {
        self.options
            .sort
            .extend(spec.into_iter().map(|(k, o)| (k.into(), o)));
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.options.skip = Some(n);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.options.limit = Some(n);
        self
    }

    pub fn with_options(mut self, options: &QueryOptions) -> Self {
        self = self.sort(options.sort.iter().cloned());
        if let Some(n) = options.skip {
            self = self.skip(n);
        }
        if let Some(n) = options.limit {
            self = self.limit(n);
        }
        self
    }

    pub fn all(self) -> Vec<Document> {
        let Cursor {
            mut documents,
            options,
        } = self;

        if !options.sort.is_empty() {
            documents.sort_by(|a, b| {
                for (field, order) in &options.sort {
                    let ord = compare_optional(a.get_path(field), b.get_path(field));
                    let ord = match order {
                        SortOrder::Ascending => ord,
                        SortOrder::Descending => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let skip = options.skip.unwrap_or(0);
        let limit = options.limit.unwrap_or(usize::MAX);
        documents.into_iter().skip(skip).take(limit).collect()
    }

    pub fn first(self) -> Option<Document> {
        self.all().into_iter().next()
    }

    /// Number of documents `all` would return.
    pub fn count(self) -> usize {
        let total = self.documents.len();
        let after_skip = total.saturating_sub(self.options.skip.unwrap_or(0));
        after_skip.min(self.options.limit.unwrap_or(usize::MAX))
    }
}
