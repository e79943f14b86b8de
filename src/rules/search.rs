//! Search engine detection and branded-term classification.
//!
//! A referrer is attributed to a search engine when the engine's domain
//! fragment appears in the referrer hostname. The search term is pulled from
//! the engine's designated query parameter, then tested against the
//! configured brand-term patterns.

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// One search engine the branded-search matcher understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEngine {
    /// Hostname fragment identifying the engine (e.g. `google` matches
    /// `www.google.co.uk` as well as `www.google.com`).
    pub domain: String,
    /// Query parameter carrying the search term (e.g. `q`).
    pub param: String,
}

/// Engines recognized out of the box.
pub fn default_engines() -> Vec<SearchEngine> {
    [("google", "q"), ("bing", "q"), ("yahoo", "p"), ("ask", "q")]
        .into_iter()
        .map(|(domain, param)| SearchEngine {
            domain: domain.to_string(),
            param: param.to_string(),
        })
        .collect()
}

/// Attribute a referrer URL to a search engine and classify its term.
///
/// Returns the matched engine's domain fragment and whether the extracted
/// term contained any brand pattern. An empty or absent term is always
/// unbranded. Returns `None` for unparsable referrers and hostnames no
/// configured engine appears in.
pub fn classify_referer<'a>(
    referer: &str,
    engines: &'a [SearchEngine],
    brand_terms: &[Regex],
    fragment_search: bool,
) -> Option<(&'a str, bool)> {
    let url = Url::parse(referer).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let engine = engines.iter().find(|e| host.contains(&e.domain))?;
    let branded = match extract_term(&url, &engine.param, fragment_search) {
        Some(term) => brand_terms.iter().any(|pattern| pattern.is_match(&term)),
        None => false,
    };
    Some((engine.domain.as_str(), branded))
}

/// Pull the search term out of the referrer URL.
///
/// Some engines encode the live-search query after the fragment marker
/// (`/#q=term`), so when `fragment_search` is set the fragment is consulted
/// before the standard query string.
fn extract_term(url: &Url, param: &str, fragment_search: bool) -> Option<String> {
    if fragment_search {
        if let Some(fragment) = url.fragment() {
            let term = url::form_urlencoded::parse(fragment.as_bytes())
                .find(|(k, _)| k == param)
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty());
            if term.is_some() {
                return term;
            }
        }
    }
    url.query_pairs()
        .find(|(k, _)| k == param)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::RegexBuilder;

    fn brand_terms() -> Vec<Regex> {
        ["brand", "branded", "branded.co.uk"]
            .iter()
            .map(|term| {
                RegexBuilder::new(term)
                    .case_insensitive(true)
                    .build()
                    .unwrap()
            })
            .collect()
    }

    fn classify(referer: &str) -> Option<(String, bool)> {
        let engines = default_engines();
        classify_referer(referer, &engines, &brand_terms(), true)
            .map(|(engine, branded)| (engine.to_string(), branded))
    }

    #[test]
    fn test_ask_branded() {
        let got = classify("http://uk.ask.com/web?q=branded+test&search=&qsrc=0&o=312&l=dir");
        assert_eq!(got, Some(("ask".to_string(), true)));
    }

    #[test]
    fn test_ask_unbranded() {
        let got = classify("http://uk.ask.com/web?q=random+test&search=&qsrc=0&o=312&l=dir");
        assert_eq!(got, Some(("ask".to_string(), false)));
    }

    #[test]
    fn test_bing_branded() {
        let got = classify("http://www.bing.com/search?q=branded.co.uk+test+term&go=&form=QBRE");
        assert_eq!(got, Some(("bing".to_string(), true)));
    }

    #[test]
    fn test_yahoo_term_parameter() {
        let got = classify(
            "http://uk.search.yahoo.com/search;_ylt=Anai?vc=&p=brand+search+term&toggle=1",
        );
        assert_eq!(got, Some(("yahoo".to_string(), true)));

        let got = classify(
            "http://uk.search.yahoo.com/search;_ylt=Anai?vc=&p=random+search+term&toggle=1",
        );
        assert_eq!(got, Some(("yahoo".to_string(), false)));
    }

    #[test]
    fn test_google_instant_fragment_query() {
        let got = classify("http://www.google.com/#sclient=psy&hl=en&q=branded.co.uk+test&aq=f");
        assert_eq!(got, Some(("google".to_string(), true)));

        let got = classify("http://www.google.com/#sclient=psy&hl=en&q=term+search+random&aq=f");
        assert_eq!(got, Some(("google".to_string(), false)));
    }

    #[test]
    fn test_fragment_search_disabled_ignores_fragment() {
        let engines = default_engines();
        let got = classify_referer(
            "http://www.google.com/#q=branded+test",
            &engines,
            &brand_terms(),
            false,
        );
        // Term is invisible without fragment extraction, so unbranded.
        assert_eq!(got, Some(("google", false)));
    }

    #[test]
    fn test_no_query_string_is_unbranded() {
        let got = classify("http://www.google.co.uk/");
        assert_eq!(got, Some(("google".to_string(), false)));
    }

    #[test]
    fn test_unrecognized_engine_is_no_match() {
        assert_eq!(classify("http://www.example.com/?q=branded"), None);
    }

    #[test]
    fn test_unparsable_referer_is_no_match() {
        assert_eq!(classify("http://"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn test_engine_table_order_wins() {
        // A hostname containing two engine fragments resolves to the first
        // table entry, mirroring ordered iteration of the configuration.
        let engines = vec![
            SearchEngine {
                domain: "ask".into(),
                param: "q".into(),
            },
            SearchEngine {
                domain: "google".into(),
                param: "q".into(),
            },
        ];
        let got = classify_referer(
            "http://ask.google.com/?q=brand",
            &engines,
            &brand_terms(),
            true,
        );
        assert_eq!(got, Some(("ask", true)));
    }
}
