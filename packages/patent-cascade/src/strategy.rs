//! Data-source strategies, in fixed priority order.
//!
//! A strategy is an immutable descriptor: name, priority position, and a
//! request builder. Strategies hold no state and are shared read-only
//! across all concurrent queries; the response side is handled by the
//! extraction engine, which is source-agnostic.

use url::Url;

use crate::fetch::FetchRequest;

/// One external patent-data source plus its request adapter.
#[derive(Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    /// Provider group whose credentials this source needs, if any
    pub credential_group: Option<&'static str>,
    build: fn(&str) -> Url,
}

impl Strategy {
    /// Build the request spec for one query.
    pub fn request(&self, query: &str) -> FetchRequest {
        let mut request = FetchRequest::new(self.name, (self.build)(query));
        if let Some(group) = self.credential_group {
            request = request.with_credential_group(group);
        }
        request
    }
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy")
            .field("name", &self.name)
            .field("credential_group", &self.credential_group)
            .finish()
    }
}

/// The fixed cascade order. Priority is position: Google Patents first,
/// Lens.org last.
pub fn default_strategies() -> Vec<Strategy> {
    vec![
        Strategy {
            name: "google_patents",
            credential_group: None,
            build: google_patents_url,
        },
        Strategy {
            name: "google_search",
            credential_group: None,
            build: google_search_url,
        },
        Strategy {
            name: "espacenet",
            credential_group: None,
            build: espacenet_url,
        },
        Strategy {
            name: "wipo_patentscope",
            credential_group: None,
            build: wipo_url,
        },
        Strategy {
            name: "lens",
            credential_group: None,
            build: lens_url,
        },
    ]
}

fn google_patents_url(query: &str) -> Url {
    Url::parse_with_params("https://patents.google.com/", &[("q", query), ("num", "20")])
        .expect("static base URL is valid")
}

fn google_search_url(query: &str) -> Url {
    let scoped = format!("{query} site:patents.google.com");
    Url::parse_with_params(
        "https://www.google.com/search",
        &[("q", scoped.as_str()), ("num", "20")],
    )
    .expect("static base URL is valid")
}

fn espacenet_url(query: &str) -> Url {
    Url::parse_with_params(
        "https://worldwide.espacenet.com/patent/search",
        &[("q", query)],
    )
    .expect("static base URL is valid")
}

fn wipo_url(query: &str) -> Url {
    Url::parse_with_params(
        "https://patentscope.wipo.int/search/en/search.jsf",
        &[("query", query)],
    )
    .expect("static base URL is valid")
}

fn lens_url(query: &str) -> Url {
    Url::parse_with_params(
        "https://www.lens.org/lens/search/patent/list",
        &[("q", query)],
    )
    .expect("static base URL is valid")
}

/// Sources consulted when resolving the national (BR) family of a WO
/// publication, in preference order.
pub fn br_lookup_requests(wo_number: &str) -> Vec<FetchRequest> {
    let candidates = [
        (
            "google_patents_detail",
            format!("https://patents.google.com/patent/{wo_number}"),
        ),
        (
            "google_patents",
            format!("https://patents.google.com/?q={wo_number}"),
        ),
        (
            "espacenet",
            format!("https://worldwide.espacenet.com/patent/search?q=pn%3D{wo_number}"),
        ),
        (
            "lens",
            format!("https://www.lens.org/lens/search/patent/list?q={wo_number}"),
        ),
    ];

    candidates
        .into_iter()
        .filter_map(|(source, url)| Some(FetchRequest::new(source, Url::parse(&url).ok()?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_order_is_fixed() {
        let names: Vec<&str> = default_strategies().iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            [
                "google_patents",
                "google_search",
                "espacenet",
                "wipo_patentscope",
                "lens"
            ]
        );
    }

    #[test]
    fn queries_are_url_encoded() {
        let strategies = default_strategies();
        let request = strategies[0].request("darolutamide patent");
        assert_eq!(
            request.url.as_str(),
            "https://patents.google.com/?q=darolutamide+patent&num=20"
        );

        let scoped = strategies[1].request("aspirin");
        assert!(scoped
            .url
            .as_str()
            .contains("q=aspirin+site%3Apatents.google.com"));
    }

    #[test]
    fn br_lookup_covers_four_sources() {
        let requests = br_lookup_requests("WO2011051540");
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0].source, "google_patents_detail");
        assert!(requests[0]
            .url
            .as_str()
            .ends_with("/patent/WO2011051540"));
    }
}
