use common::{SiteConfig, SourcesConfig};
use rand::Rng;
use std::fmt;

/// Percent chance that an iteration reads a search term rather than a site.
pub const SEARCH_TERM_PERCENT: u32 = 25;

// Don't read too much into this list (-_-;)
pub const DEFAULT_SEARCH_TERMS: &[&str] = &[
    "", // blank asks for the top stories
    "aids",
    "alligators",
    "cooking",
    "duck dynasty",
    "ebola",
    "feminism",
    "fishing",
    "football",
    "gardening",
    "healthcare",
    "hunting",
    "misandry",
    "misogyny",
    "queer",
    "science fiction",
    "sex",
    "silicon valley",
    "transgender",
];

pub const DEFAULT_SITES: &[(&str, &str)] = &[
    ("apnews", "https://feedx.net/rss/ap.xml"),
    ("bbc", "https://feeds.bbci.co.uk/news/rss.xml"),
    ("npr", "https://feeds.npr.org/1001/rss.xml"),
    ("nytimes", "https://rss.nytimes.com/services/xml/rss/nyt/HomePage.xml"),
    ("guardian", "https://www.theguardian.com/us-news/rss"),
    ("aljazeera", "https://www.aljazeera.com/xml/rss/all.xml"),
    ("cbsnews", "https://www.cbsnews.com/latest/rss/main"),
    ("abcnews", "https://abcnews.go.com/abcnews/topstories"),
    ("latimes", "https://www.latimes.com/local/rss2.0.xml"),
    ("washingtonpost", "https://feeds.washingtonpost.com/rss/national"),
];

/// Configured search terms, or the built-in list.
pub fn search_terms(config: &SourcesConfig) -> Vec<String> {
    match &config.search_terms {
        Some(terms) => terms.clone(),
        None => DEFAULT_SEARCH_TERMS.iter().map(|t| t.to_string()).collect(),
    }
}

/// Configured sites, or the built-in catalog.
pub fn sites(config: &SourcesConfig) -> Vec<SiteConfig> {
    match &config.sites {
        Some(sites) => sites.clone(),
        None => DEFAULT_SITES
            .iter()
            .map(|&(name, url)| SiteConfig {
                name: name.to_string(),
                url: url.to_string(),
            })
            .collect(),
    }
}

/// Where a batch of articles comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    SearchTerm(String),
    Site(String),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::SearchTerm(term) if term.is_empty() => write!(f, "top stories"),
            Source::SearchTerm(term) => write!(f, "search '{}'", term),
            Source::Site(name) => write!(f, "site {}", name),
        }
    }
}

/// Unused sources of one run. Every draw removes the source it returns.
#[derive(Debug, Clone, Default)]
pub struct SourcePool {
    terms: Vec<String>,
    sites: Vec<String>,
}

impl SourcePool {
    pub fn new<T, S>(terms: T, sites: S) -> Self
    where
        T: IntoIterator<Item = String>,
        S: IntoIterator<Item = String>,
    {
        Self {
            terms: unique(terms),
            sites: unique(sites),
        }
    }

    pub fn from_config(config: &SourcesConfig) -> Self {
        Self::new(
            search_terms(config),
            sites(config).into_iter().map(|site| site.name),
        )
    }

    pub fn remaining(&self) -> usize {
        self.terms.len() + self.sites.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Picks the next source: a search term `SEARCH_TERM_PERCENT`% of the
    /// time, a site otherwise, falling back to whichever pool still has
    /// entries. `None` once both are empty.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Source> {
        let prefer_term = rng.gen_range(0..100) < SEARCH_TERM_PERCENT;

        if prefer_term && !self.terms.is_empty() {
            return Some(Source::SearchTerm(take_random(&mut self.terms, rng)));
        }
        if !self.sites.is_empty() {
            return Some(Source::Site(take_random(&mut self.sites, rng)));
        }
        if !self.terms.is_empty() {
            return Some(Source::SearchTerm(take_random(&mut self.terms, rng)));
        }
        None
    }
}

fn unique<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn take_random<R: Rng + ?Sized>(items: &mut Vec<String>, rng: &mut R) -> String {
    let index = rng.gen_range(0..items.len());
    items.swap_remove(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn every_source_is_drawn_once() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut pool = SourcePool::new(strings(&["a", "b", "c"]), strings(&["x", "y"]));

        let mut seen = HashSet::new();
        while let Some(source) = pool.draw(&mut rng) {
            assert!(seen.insert(source.clone()), "{} drawn twice", source);
        }

        assert_eq!(seen.len(), 5);
        assert!(pool.is_exhausted());
        assert_eq!(pool.draw(&mut rng), None);
    }

    #[test]
    fn falls_back_to_terms_when_sites_run_out() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut pool = SourcePool::new(strings(&["a", "b"]), Vec::new());

        assert!(matches!(pool.draw(&mut rng), Some(Source::SearchTerm(_))));
        assert!(matches!(pool.draw(&mut rng), Some(Source::SearchTerm(_))));
        assert_eq!(pool.draw(&mut rng), None);
    }

    #[test]
    fn duplicate_entries_collapse() {
        let pool = SourcePool::new(strings(&["a", "a", ""]), strings(&["x", "x"]));
        assert_eq!(pool.remaining(), 3);
    }

    #[test]
    fn search_terms_are_drawn_about_a_quarter_of_the_time() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut terms = 0;
        let rounds = 4000;

        for _ in 0..rounds {
            let mut pool = SourcePool::new(strings(&["t"]), strings(&["s"]));
            if let Some(Source::SearchTerm(_)) = pool.draw(&mut rng) {
                terms += 1;
            }
        }

        let share = terms as f64 / rounds as f64;
        assert!((0.2..0.3).contains(&share), "search term share {}", share);
    }

    #[test]
    fn defaults_apply_when_catalog_is_missing() {
        let config = SourcesConfig::default();
        let pool = SourcePool::from_config(&config);
        assert_eq!(pool.remaining(), DEFAULT_SEARCH_TERMS.len() + DEFAULT_SITES.len());
        assert!(search_terms(&config).contains(&String::new()));
    }

    #[test]
    fn display_names_sources() {
        assert_eq!(Source::SearchTerm(String::new()).to_string(), "top stories");
        assert_eq!(Source::SearchTerm("ebola".into()).to_string(), "search 'ebola'");
        assert_eq!(Source::Site("npr".into()).to_string(), "site npr");
    }
}
