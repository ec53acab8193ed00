//! Resource Fetcher
//!
//! Walks a continuation-token listing until the provider stops returning a
//! token, keeping the records that pass the client-side predicate.

use super::client::{CloudClient, ListTarget, RawRecord};
use super::error::ClassifiedError;
use super::filter::FilterCriteria;
use std::collections::BTreeMap;

/// Items of one listing plus an optional info or error marker
#[derive(Debug, Clone)]
pub struct ListResult<T> {
    pub items: Vec<T>,
    pub status: Option<ClassifiedError>,
}

impl<T> ListResult<T> {
    pub fn ok(items: Vec<T>) -> Self {
        Self { items, status: None }
    }

    /// Failed listing; nothing accumulated is kept
    pub fn failed(error: ClassifiedError) -> Self {
        Self {
            items: Vec::new(),
            status: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status.as_ref().is_some_and(ClassifiedError::is_error)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ListResult<U> {
        ListResult {
            items: self.items.into_iter().map(f).collect(),
            status: self.status,
        }
    }

    /// Group items by key, keeping arrival order inside each group
    pub fn group_by(self, mut key: impl FnMut(&T) -> String) -> GroupedList<T> {
        let mut groups: BTreeMap<String, Vec<T>> = BTreeMap::new();
        for item in self.items {
            groups.entry(key(&item)).or_default().push(item);
        }
        GroupedList {
            groups,
            status: self.status,
        }
    }
}

/// Items grouped by a key such as instance state
#[derive(Debug, Clone)]
pub struct GroupedList<T> {
    pub groups: BTreeMap<String, Vec<T>>,
    pub status: Option<ClassifiedError>,
}

impl<T> GroupedList<T> {
    pub fn count(&self, key: &str) -> usize {
        self.groups.get(key).map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Stop paginating once this many records matched
    pub max_items: Option<usize>,
}

/// Fetch all matching resources (auto-paginate)
pub async fn fetch_resources(
    client: &dyn CloudClient,
    target: &ListTarget,
    criteria: &FilterCriteria,
    options: FetchOptions,
) -> ListResult<RawRecord> {
    let clauses = criteria.server_clauses();
    let predicate = criteria.client_predicate(target.layout());
    let mut all_items = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = match client
            .list_resources(target, &clauses, page_token.as_deref())
            .await
        {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!(
                    "listing {}s failed on page {}, discarding {} accumulated: {}",
                    target.noun(),
                    pages + 1,
                    all_items.len(),
                    err
                );
                return ListResult::failed(ClassifiedError::from(&err));
            }
        };
        pages += 1;

        all_items.extend(page.items.into_iter().filter(|item| predicate.matches(item)));

        if let Some(max) = options.max_items {
            if all_items.len() >= max {
                let more = all_items.len() > max || page.next_token.is_some();
                all_items.truncate(max);
                tracing::debug!("{} limit of {} reached after {} page(s)", target.noun(), max, pages);
                let mut result = ListResult::ok(all_items);
                if more {
                    result.status = Some(
                        ClassifiedError::empty(format!(
                            "more {}s exist than the limit of {}; showing the first {}",
                            target.noun(),
                            max,
                            max
                        ))
                        .with_metadata("limit", max.to_string()),
                    );
                }
                return result;
            }
        }

        match page.next_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    tracing::debug!("fetched {} {}(s) in {} page(s)", all_items.len(), target.noun(), pages);

    if all_items.is_empty() {
        return ListResult {
            items: all_items,
            status: Some(ClassifiedError::empty(format!("no {}s found", target.noun()))),
        };
    }

    ListResult::ok(all_items)
}
