use std::collections::{BTreeMap, BTreeSet};

use url::form_urlencoded;

use crate::error::ApiError;
use crate::filter::FilterValue;
use crate::types::Method;

/// A normalized inbound API call. Built once per request and read-only afterwards.
///
/// `page_number` is only set when both `page[number]` and `page[size]` were
/// supplied; otherwise the request is not paginated.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    url: String,
    method: Method,
    id: Option<String>,
    content: Option<String>,
    include: Vec<String>,
    sort: Vec<String>,
    filter: BTreeMap<String, FilterValue>,
    page_number: Option<u32>,
    page_size: u32,
    relation: Option<String>,
    fields: BTreeMap<String, BTreeSet<String>>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 50;

impl Request {
    pub fn new(url: impl Into<String>, method: Method) -> Self {
        Self {
            url: url.into(),
            method,
            id: None,
            content: None,
            include: vec![],
            sort: vec![],
            filter: BTreeMap::new(),
            page_number: None,
            page_size: DEFAULT_PAGE_SIZE,
            relation: None,
            fields: BTreeMap::new(),
        }
    }

    /// Parse JSON:API query parameters.
    ///
    /// A literal `+` in `sort` is an ascending marker, not an encoded space.
    /// The rest of the value is percent-decoded like any other parameter.
    pub fn from_query(
        url: impl Into<String>,
        method: Method,
        raw_query: Option<&str>,
        default_page_size: u32,
        max_page_size: u32,
    ) -> Result<Self, ApiError> {
        let mut request = Self::new(url, method);
        request.page_size = default_page_size;

        let mut page_number = None;
        let mut page_size = None;

        for pair in raw_query.unwrap_or("").split('&').filter(|p| !p.is_empty()) {
            let Some((key, value)) = form_urlencoded::parse(pair.as_bytes()).next() else {
                continue;
            };
            let key = key.into_owned();

            if key == "sort" {
                request.sort.extend(split_list(&decode_sort(pair)));
            } else if key == "include" {
                request.include.extend(split_list(&value));
            } else if key == "page[number]" {
                page_number = Some(parse_page_value("page[number]", &value)?);
            } else if key == "page[size]" {
                page_size = Some(parse_page_value("page[size]", &value)?);
            } else if let Some(column) = bracketed(&key, "filter") {
                request.filter.insert(column.to_string(), FilterValue::parse(&value));
            } else if let Some(type_name) = bracketed(&key, "fields") {
                request
                    .fields
                    .entry(type_name.to_string())
                    .or_default()
                    .extend(split_list(&value));
            }
        }

        match (page_number, page_size) {
            (Some(number), Some(size)) => {
                request.page_number = Some(number);
                request.page_size = size.min(max_page_size.max(1));
            }
            (None, None) => {}
            _ => tracing::warn!("Ignoring incomplete page parameters; both page[number] and page[size] are required"),
        }

        Ok(request)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    pub fn with_include(mut self, paths: &[&str]) -> Self {
        self.include = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_sort(mut self, specs: &[&str]) -> Self {
        self.sort = specs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_filter(mut self, column: impl Into<String>, value: FilterValue) -> Self {
        self.filter.insert(column.into(), value);
        self
    }

    pub fn with_page(mut self, number: u32, size: u32) -> Self {
        self.page_number = Some(number.max(1));
        self.page_size = size.max(1);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// URL without its query string
    pub fn base_url(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn sort(&self) -> &[String] {
        &self.sort
    }

    pub fn filter(&self) -> &BTreeMap<String, FilterValue> {
        &self.filter
    }

    pub fn page_number(&self) -> Option<u32> {
        self.page_number
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn relation(&self) -> Option<&str> {
        self.relation.as_deref()
    }

    /// Sparse fieldsets are parsed but not applied
    pub fn fields(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.fields
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

/// `filter[name]` -> `name` for prefix `filter`
fn bracketed<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)?
        .strip_prefix('[')?
        .strip_suffix(']')
        .filter(|inner| !inner.is_empty())
}

fn decode_sort(pair: &str) -> String {
    let protected = pair.replace('+', "%2B");
    form_urlencoded::parse(protected.as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

fn parse_page_value(parameter: &str, value: &str) -> Result<u32, ApiError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ApiError::InvalidPageParameter { parameter: parameter.to_string(), value: value.to_string() }),
    }
}
