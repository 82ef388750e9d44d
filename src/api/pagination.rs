use serde::Serialize;
use url::form_urlencoded;

use crate::api::request::Request;
use crate::database::{EntityStore, Query, Record, StoreError};
use crate::filter::FilterOrder;

/// `{self, first, last, prev, next}`; `prev`/`next` are null at the boundaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    #[serde(rename = "self")]
    pub self_link: String,
    pub first: String,
    pub last: String,
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// One page of a result set, with enough context to build its links
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<Record>,
    pub total: u64,
    pub per_page: u32,
    pub current_page: u32,
    /// Base URL plus every active filter/sort parameter
    link_prefix: String,
}

impl Page {
    pub fn new(items: Vec<Record>, total: u64, per_page: u32, current_page: u32, link_prefix: String) -> Self {
        Self { items, total, per_page: per_page.max(1), current_page: current_page.max(1), link_prefix }
    }

    /// Last page number; an empty result still has one (empty) page
    pub fn last_page(&self) -> u32 {
        let pages = self.total.div_ceil(u64::from(self.per_page));
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    pub fn url_for(&self, number: u32) -> String {
        format!("{}page[number]={}&page[size]={}", self.link_prefix, number, self.per_page)
    }

    pub fn links(&self) -> PageLinks {
        let last = self.last_page();
        let current = self.current_page;
        PageLinks {
            self_link: self.url_for(current),
            first: self.url_for(1),
            last: self.url_for(last),
            prev: (current > 1).then(|| self.url_for(current - 1)),
            next: (current < last).then(|| self.url_for(current + 1)),
        }
    }
}

/// Build `<base>?<filters>&<sort>&` so page parameters can be appended.
///
/// Sort is taken from the query's parsed order so ascending columns are
/// always written as `%2B`.
pub fn link_prefix(request: &Request, query: &Query) -> String {
    let mut params: Vec<String> = request
        .filter()
        .iter()
        .map(|(column, value)| {
            let encoded: Vec<String> = value.to_param().split(',').map(encode).collect();
            format!("filter[{}]={}", encode(column), encoded.join(","))
        })
        .collect();
    if !query.order().is_empty() {
        params.push(format!("sort={}", FilterOrder::to_param(query.order())));
    }

    let mut prefix = format!("{}?", request.base_url());
    for param in params {
        prefix.push_str(&param);
        prefix.push('&');
    }
    prefix
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Fetch one page of `query`. `total` is counted here unless the caller
/// already counted it.
pub async fn paginate(
    store: &dyn EntityStore,
    query: &Query,
    request: &Request,
    number: u32,
    total: Option<u64>,
) -> Result<Page, StoreError> {
    let total = match total {
        Some(total) => total,
        None => store.count(query).await?,
    };
    let size = request.page_size();
    let items = store.page(query, number, size).await?;
    tracing::debug!(
        "Page {} of {} ({} per page, {} rows, {} on page)",
        number,
        query.type_name(),
        size,
        total,
        items.len()
    );
    Ok(Page::new(items, total, size, number, link_prefix(request, query)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterValue, SortDirection};
    use crate::types::Method;

    fn page(total: u64, per_page: u32, current: u32) -> Page {
        Page::new(vec![], total, per_page, current, "/posts?".to_string())
    }

    #[test]
    fn last_page_rounds_up_and_never_reaches_zero() {
        assert_eq!(page(10, 3, 1).last_page(), 4);
        assert_eq!(page(9, 3, 1).last_page(), 3);
        assert_eq!(page(0, 3, 1).last_page(), 1);
    }

    #[test]
    fn boundary_links_are_null() {
        let first = page(10, 3, 1).links();
        assert_eq!(first.prev, None);
        assert_eq!(first.next.as_deref(), Some("/posts?page[number]=2&page[size]=3"));
        assert_eq!(first.last, "/posts?page[number]=4&page[size]=3");

        let last = page(10, 3, 4).links();
        assert_eq!(last.prev.as_deref(), Some("/posts?page[number]=3&page[size]=3"));
        assert_eq!(last.next, None);

        let only = page(2, 3, 1).links();
        assert_eq!((only.prev, only.next), (None, None));
    }

    #[test]
    fn page_past_the_end_links_back() {
        let links = page(4, 2, 5).links();
        assert_eq!(links.self_link, "/posts?page[number]=5&page[size]=2");
        assert_eq!(links.prev.as_deref(), Some("/posts?page[number]=4&page[size]=2"));
        assert_eq!(links.next, None);
    }

    #[test]
    fn links_carry_filter_and_sort() {
        let request = Request::new("/posts?page[number]=1", Method::Get)
            .with_filter("status", FilterValue::Any(vec!["open".into(), "a b".into()]));
        let mut query = Query::new("posts");
        query.order_by("title", SortDirection::Asc).order_by("score", SortDirection::Desc);

        assert_eq!(link_prefix(&request, &query), "/posts?filter[status]=open,a+b&sort=%2Btitle,-score&");
    }

    #[test]
    fn filter_columns_are_encoded_in_links() {
        let request = Request::new("/posts", Method::Get).with_filter("st&x", FilterValue::One("a".into()));
        let prefix = link_prefix(&request, &Query::new("posts"));
        assert_eq!(prefix, "/posts?filter[st%26x]=a&");

        let reparsed = Request::from_query("/posts", Method::Get, prefix.split_once('?').map(|(_, q)| q), 50, 100).unwrap();
        assert_eq!(reparsed.filter().get("st&x"), Some(&FilterValue::One("a".into())));
    }

    #[test]
    fn links_serialize_self_key() {
        let value = serde_json::to_value(page(1, 1, 1).links()).unwrap();
        assert!(value.get("self").is_some());
        assert!(value["prev"].is_null());
    }
}
