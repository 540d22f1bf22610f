use serde::Serialize;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PageLink {
    pub page: u64,
    pub limit: u64,
}

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct PaginationLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageLink>,
}

/// Largest offset or page size a store is asked for; Postgres binds them as `BIGINT`.
pub const MAX_INDEX: u64 = i64::MAX as u64;

/// Offset pagination window for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub start_index: u64,
    pub end_index: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64) -> Self {
        let page = page.clamp(1, MAX_INDEX);
        let limit = limit.clamp(1, MAX_INDEX);

        Self {
            page,
            limit,
            start_index: (page - 1).saturating_mul(limit).min(MAX_INDEX),
            end_index: page.saturating_mul(limit).min(MAX_INDEX),
        }
    }

    /// Reads `page` and `limit` like `parseInt`: leading digits count, anything that is not a
    /// positive number falls back to the default.
    pub fn from_params(
        page: Option<&str>,
        limit: Option<&str>,
        default_page: u64,
        default_limit: u64,
        max_limit: Option<u64>,
    ) -> Self {
        let page = page.and_then(leading_integer).unwrap_or(default_page).max(1);
        let limit = limit.and_then(leading_integer).unwrap_or(default_limit).max(1);
        let limit = match max_limit {
            Some(max_limit) => limit.min(max_limit.max(1)),
            None => limit,
        };

        Self::new(page, limit)
    }

    pub fn links(&self, total: u64) -> PaginationLinks {
        PaginationLinks {
            next: (self.end_index < total).then(|| PageLink {
                page: self.page.saturating_add(1),
                limit: self.limit,
            }),
            prev: (self.start_index > 0).then(|| PageLink {
                page: self.page - 1,
                limit: self.limit,
            }),
        }
    }
}

fn leading_integer(raw: &str) -> Option<u64> {
    let raw = raw.trim_start();
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    digits[..end]
        .parse::<u64>()
        .ok()
        .filter(|value| *value > 0)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_default_to_first_page_of_twenty_five() {
        assert_eq!(
            Pagination::from_params(None, None, 1, 25, None),
            Pagination {
                page: 1,
                limit: 25,
                start_index: 0,
                end_index: 25
            }
        );
    }

    #[test]
    fn should_parse_like_parse_int() {
        let pagination = Pagination::from_params(Some("2abc"), Some(" 10.5"), 1, 25, None);
        assert_eq!((pagination.page, pagination.limit), (2, 10));

        for raw in ["abc", "0", "-3", "", "99999999999999999999999"] {
            let pagination = Pagination::from_params(Some(raw), Some(raw), 1, 25, None);
            assert_eq!((pagination.page, pagination.limit), (1, 25), "{raw}");
        }
    }

    #[test]
    fn should_clamp_limit() {
        let pagination = Pagination::from_params(None, Some("500"), 1, 25, Some(100));
        assert_eq!(pagination.limit, 100);
    }

    #[test]
    fn should_saturate_huge_windows() {
        let pagination =
            Pagination::from_params(Some("99999999999999"), Some("99999999"), 1, 25, None);
        assert_eq!((pagination.page, pagination.limit), (99999999999999, 99999999));
        assert_eq!(pagination.start_index, MAX_INDEX);
        assert_eq!(pagination.end_index, MAX_INDEX);

        let links = pagination.links(35);
        assert_eq!(links.next, None);
        assert_eq!(
            links.prev,
            Some(PageLink {
                page: 99999999999998,
                limit: 99999999
            })
        );

        let pagination = Pagination::from_params(
            Some("18446744073709551615"),
            Some("18446744073709551615"),
            1,
            25,
            None,
        );
        assert_eq!((pagination.page, pagination.limit), (MAX_INDEX, MAX_INDEX));
        assert_eq!(pagination.start_index, MAX_INDEX);
    }

    #[test]
    fn should_link_neighbouring_pages() {
        let links = Pagination::new(2, 10).links(35);
        assert_eq!(
            links,
            PaginationLinks {
                next: Some(PageLink { page: 3, limit: 10 }),
                prev: Some(PageLink { page: 1, limit: 10 }),
            }
        );

        assert_eq!(Pagination::new(1, 25).links(25), PaginationLinks::default());
        assert_eq!(Pagination::new(4, 10).links(35).next, None);
    }

    #[test]
    fn should_omit_missing_links_when_serialized() {
        let links = Pagination::new(1, 10).links(11);
        assert_eq!(
            serde_json::to_value(links).unwrap(),
            json!({ "next": { "page": 2, "limit": 10 } })
        );
    }
}
