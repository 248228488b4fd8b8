//! Limit/offset pagination.
//!
//! Lists are plain JSON arrays unless the request carries a positive `limit`;
//! then they are wrapped as `{count, next, previous, results}` with absolute
//! links to the neighbouring pages.

use axum::extract::{FromRequestParts, OriginalUri};
use axum::http::header;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::AppError;
use crate::infra::store::PageWindow;

const LIMIT_PARAM: &str = "limit";
const OFFSET_PARAM: &str = "offset";

/// Raw `limit`/`offset` parameters. Values that do not parse are ignored
/// rather than rejected.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl PageQuery {
    pub fn window(&self) -> Option<PageWindow> {
        let limit = parse_number(self.limit.as_deref()).filter(|limit| *limit > 0)?;
        let offset = parse_number(self.offset.as_deref())
            .filter(|offset| *offset >= 0)
            .unwrap_or(0);
        Some(PageWindow { limit, offset })
    }
}

fn parse_number(value: Option<&str>) -> Option<i64> {
    value.and_then(|value| value.trim().parse().ok())
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Page<T> {
    All(Vec<T>),
    Window {
        count: i64,
        next: Option<String>,
        previous: Option<String>,
        results: Vec<T>,
    },
}

impl<T> Page<T> {
    pub fn window(url: &Url, window: PageWindow, count: i64, results: Vec<T>) -> Self {
        Page::Window {
            count,
            next: next_link(url, window, count),
            previous: previous_link(url, window),
            results,
        }
    }
}

/// Absolute URL of the current request, `http://<Host><path>?<query>`.
pub struct RequestUrl(pub Url);

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestUrl
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("localhost");
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| parts.uri.clone());
        let path_and_query = uri
            .path_and_query()
            .map(|value| value.as_str())
            .unwrap_or("/");

        Url::parse(&format!("http://{}{}", host, path_and_query))
            .map(RequestUrl)
            .map_err(|_| AppError::bad_request("invalid Host header"))
    }
}

fn next_link(url: &Url, window: PageWindow, count: i64) -> Option<String> {
    let next_offset = window.offset.saturating_add(window.limit);
    if next_offset >= count {
        return None;
    }
    Some(replace_query_params(url, window.limit, Some(next_offset)))
}

fn previous_link(url: &Url, window: PageWindow) -> Option<String> {
    if window.offset <= 0 {
        return None;
    }
    let previous_offset = window.offset - window.limit;
    if previous_offset <= 0 {
        return Some(replace_query_params(url, window.limit, None));
    }
    Some(replace_query_params(url, window.limit, Some(previous_offset)))
}

// Keeps unrelated parameters and writes all of them back sorted by name.
fn replace_query_params(url: &Url, limit: i64, offset: Option<i64>) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != LIMIT_PARAM && key != OFFSET_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    pairs.push((LIMIT_PARAM.to_string(), limit.to_string()));
    if let Some(offset) = offset {
        pairs.push((OFFSET_PARAM.to_string(), offset.to_string()));
    }
    pairs.sort();

    let mut url = url.clone();
    url.query_pairs_mut().clear().extend_pairs(pairs);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(limit: Option<&str>, offset: Option<&str>) -> PageQuery {
        PageQuery {
            limit: limit.map(str::to_string),
            offset: offset.map(str::to_string),
        }
    }

    fn url(query: &str) -> Url {
        Url::parse(&format!("http://testserver/api/v1/posts/?{}", query)).unwrap()
    }

    #[test]
    fn window_requires_a_positive_limit() {
        assert_eq!(query(None, Some("2")).window(), None);
        assert_eq!(query(Some("0"), None).window(), None);
        assert_eq!(query(Some("-3"), None).window(), None);
        assert_eq!(query(Some("abc"), None).window(), None);
        assert_eq!(
            query(Some("2"), Some("-1")).window(),
            Some(PageWindow { limit: 2, offset: 0 })
        );
        assert_eq!(
            query(Some("2"), Some("x")).window(),
            Some(PageWindow { limit: 2, offset: 0 })
        );
        assert_eq!(
            query(Some("5"), Some("10")).window(),
            Some(PageWindow { limit: 5, offset: 10 })
        );
    }

    #[test]
    fn first_page_has_no_previous() {
        let window = PageWindow { limit: 2, offset: 0 };
        assert_eq!(
            next_link(&url("limit=2"), window, 5).as_deref(),
            Some("http://testserver/api/v1/posts/?limit=2&offset=2")
        );
        assert_eq!(previous_link(&url("limit=2"), window), None);
    }

    #[test]
    fn second_page_drops_offset_from_previous() {
        let window = PageWindow { limit: 2, offset: 2 };
        let current = url("limit=2&offset=2");
        assert_eq!(
            next_link(&current, window, 5).as_deref(),
            Some("http://testserver/api/v1/posts/?limit=2&offset=4")
        );
        assert_eq!(
            previous_link(&current, window).as_deref(),
            Some("http://testserver/api/v1/posts/?limit=2")
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let window = PageWindow { limit: 2, offset: 4 };
        let current = url("offset=4&limit=2&search=cat");
        assert_eq!(next_link(&current, window, 5), None);
        assert_eq!(
            previous_link(&current, window).as_deref(),
            Some("http://testserver/api/v1/posts/?limit=2&offset=2&search=cat")
        );
    }

    #[test]
    fn huge_limit_does_not_overflow() {
        let window = PageWindow {
            limit: i64::MAX,
            offset: 5,
        };
        let current = url("limit=9223372036854775807&offset=5");
        assert_eq!(next_link(&current, window, 1), None);
        assert_eq!(
            previous_link(&current, window).as_deref(),
            Some("http://testserver/api/v1/posts/?limit=9223372036854775807")
        );
    }

    #[test]
    fn page_serializes_as_array_or_envelope() {
        let all: Page<i64> = Page::All(vec![1, 2]);
        assert_eq!(serde_json::to_value(&all).unwrap(), serde_json::json!([1, 2]));

        let page = Page::window(&url("limit=1"), PageWindow { limit: 1, offset: 0 }, 2, vec![1]);
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            serde_json::json!({
                "count": 2,
                "next": "http://testserver/api/v1/posts/?limit=1&offset=1",
                "previous": null,
                "results": [1],
            })
        );
    }
}
