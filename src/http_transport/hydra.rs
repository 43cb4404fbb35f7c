//! Hydra JSON-LD collections with page links

use crate::storage::Page;
use serde::Serialize;
use std::collections::BTreeMap;

pub const HYDRA_CONTEXT: &str = "http://www.w3.org/ns/hydra/context.jsonld";
pub const COLLECTION_TYPE: &str = "hydra:Collection";
pub const PARTIAL_COLLECTION_VIEW_TYPE: &str = "hydra:PartialCollectionView";

/// Parsed query string. Keys are kept sorted so generated links are stable,
/// and the first value of a repeated key wins.
pub type QueryParams = BTreeMap<String, String>;

pub fn parse_query(raw: Option<&str>) -> QueryParams {
    let mut params = QueryParams::new();
    if let Some(raw) = raw {
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
    }
    params
}

/// Read `page` and `size`. Unparseable values fall back to the defaults and
/// a size below one is treated as the default size.
pub fn page_from_query(params: &QueryParams) -> Page {
    let page = params
        .get("page")
        .and_then(|p| p.parse::<usize>().ok())
        .unwrap_or(0);
    let size = params
        .get("size")
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|s| *s >= 1)
        .unwrap_or(Page::DEFAULT_SIZE);
    Page::new(page, size)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialCollectionView {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub view_type: &'static str,
    pub first: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    pub last: String,
}

impl PartialCollectionView {
    /// Links for `page` of a collection with `total` items.
    ///
    /// `base` is the path the links point at; `params` is the request query,
    /// with `page` and `size` replaced per link.
    pub fn new(request_uri: &str, base: &str, params: &QueryParams, page: Page, total: u64) -> Self {
        let last = (total / page.size as u64) as usize;
        let link = |n: usize| {
            let mut query = params.clone();
            query.insert("page".to_string(), n.to_string());
            query.insert("size".to_string(), page.size.to_string());
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query.iter())
                .finish();
            format!("{base}?{encoded}")
        };

        Self {
            id: request_uri.to_string(),
            view_type: PARTIAL_COLLECTION_VIEW_TYPE,
            first: link(0),
            previous: page
                .page
                .checked_sub(1)
                .filter(|p| *p <= last)
                .map(&link),
            next: Some(page.page.saturating_add(1))
                .filter(|p| *p <= last)
                .map(&link),
            last: link(last),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Collection<T> {
    #[serde(rename = "@context")]
    pub context: &'static str,
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub collection_type: &'static str,
    #[serde(rename = "hydra:totalItems")]
    pub total_items: u64,
    #[serde(rename = "hydra:member")]
    pub member: Vec<T>,
    #[serde(rename = "hydra:view", skip_serializing_if = "Option::is_none")]
    pub view: Option<PartialCollectionView>,
}

impl<T> Collection<T> {
    /// Unpaged collection; the total is the member count
    pub fn new(path: &str, member: Vec<T>) -> Self {
        Self {
            context: HYDRA_CONTEXT,
            id: path.to_string(),
            collection_type: COLLECTION_TYPE,
            total_items: member.len() as u64,
            member,
            view: None,
        }
    }

    pub fn paged(path: &str, member: Vec<T>, total: u64, view: PartialCollectionView) -> Self {
        Self {
            total_items: total,
            view: Some(view),
            ..Self::new(path, member)
        }
    }
}
