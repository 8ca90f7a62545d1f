use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::ingestion::ArticleFetcher;
use crate::sentence::{self, Normalizer, Speaker, POST_LENGTH};
use crate::sources::{Source, SourcePool};
use crate::storage::DedupFilter;
use crate::tokenize::Tokenizer;

/// Minimum size of each bucket, and of the pairings that fit a post.
pub const MIN_CANDIDATES: usize = 15;

#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("failed to fetch articles from {origin}: {error:#}")]
    Fetch { origin: Source, error: anyhow::Error },

    #[error("failed to split articles from {origin} into sentences: {error:#}")]
    Tokenize { origin: Source, error: anyhow::Error },

    #[error("used-quote filter failed: {0:#}")]
    Dedup(anyhow::Error),

    #[error("ran out of search terms and news sites ({female} female, {male} male, {pairs} pairs)")]
    SourceExhaustion { female: usize, male: usize, pairs: usize },
}

/// A composed two-line post and the quotes it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidatePair {
    pub text: String,
    /// `[female, male]`
    pub quotes: [String; 2],
}

impl CandidatePair {
    pub fn female(&self) -> &str {
        &self.quotes[0]
    }

    pub fn male(&self) -> &str {
        &self.quotes[1]
    }
}

/// Quotes collected so far, one ordered duplicate-free list per speaker.
#[derive(Debug, Clone, Default)]
pub struct Buckets {
    female: Vec<String>,
    male: Vec<String>,
}

impl Buckets {
    pub fn female(&self) -> &[String] {
        &self.female
    }

    pub fn male(&self) -> &[String] {
        &self.male
    }

    pub fn get(&self, speaker: Speaker) -> &[String] {
        match speaker {
            Speaker::Female => &self.female,
            Speaker::Male => &self.male,
        }
    }

    /// Appends the quotes not already in the speaker's bucket.
    pub fn merge(&mut self, speaker: Speaker, quotes: Vec<String>) {
        let bucket = match speaker {
            Speaker::Female => &mut self.female,
            Speaker::Male => &mut self.male,
        };
        for quote in quotes {
            if !bucket.contains(&quote) {
                bucket.push(quote);
            }
        }
    }
}

/// Two-line post, female line first when `female_first`.
pub fn compose(female: &str, male: &str, female_first: bool) -> String {
    let female_line = format!("{} {}", Speaker::Female.marker(), female);
    let male_line = format!("{} {}", Speaker::Male.marker(), male);
    if female_first {
        format!("{}\n{}", female_line, male_line)
    } else {
        format!("{}\n{}", male_line, female_line)
    }
}

fn fits(female: &str, male: &str) -> bool {
    // Line order does not change the length.
    sentence::text_length(&compose(female, male, true)) <= POST_LENGTH
}

/// Number of female/male combinations that fit in one post.
pub fn count_pairs(female: &[String], male: &[String]) -> usize {
    female
        .iter()
        .map(|f| male.iter().filter(|m| fits(f, m)).count())
        .sum()
}

/// Every female quote crossed with every male quote, in bucket order, with a
/// coin flip per pair for which line comes first. Pairs over the post length
/// are dropped.
pub fn pair_candidates<R: Rng + ?Sized>(
    female: &[String],
    male: &[String],
    rng: &mut R,
) -> Vec<CandidatePair> {
    let mut pairs = Vec::new();
    for f in female {
        for m in male {
            let text = compose(f, m, rng.gen_bool(0.5));
            if sentence::text_length(&text) <= POST_LENGTH {
                pairs.push(CandidatePair {
                    text,
                    quotes: [f.clone(), m.clone()],
                });
            }
        }
    }
    pairs
}

/// One candidate-generation run. Owns its source pool and buckets, so a
/// generator is built fresh for every run.
pub struct CandidateGenerator {
    fetcher: Arc<dyn ArticleFetcher>,
    tokenizer: Arc<dyn Tokenizer>,
    normalizer: Normalizer,
    pool: SourcePool,
    buckets: Buckets,
    rng: StdRng,
}

impl CandidateGenerator {
    pub fn new(fetcher: Arc<dyn ArticleFetcher>, tokenizer: Arc<dyn Tokenizer>, pool: SourcePool) -> Self {
        Self {
            fetcher,
            tokenizer,
            normalizer: Normalizer::default(),
            pool,
            buckets: Buckets::default(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    fn needs_more(&self, pairs: usize) -> bool {
        self.buckets.female.len() < MIN_CANDIDATES
            || self.buckets.male.len() < MIN_CANDIDATES
            || pairs < MIN_CANDIDATES
    }

    /// Collects quotes source by source until both buckets and their
    /// pairings reach `MIN_CANDIDATES`, then pairs them up.
    pub async fn generate_candidates(
        mut self,
        dedup: Option<&dyn DedupFilter>,
    ) -> Result<Vec<CandidatePair>, CandidateError> {
        loop {
            let pairs = count_pairs(&self.buckets.female, &self.buckets.male);
            debug!(
                female = self.buckets.female.len(),
                male = self.buckets.male.len(),
                combined = pairs,
                "candidate totals"
            );

            if !self.needs_more(pairs) {
                break;
            }

            let source = self.pool.draw(&mut self.rng).ok_or(CandidateError::SourceExhaustion {
                female: self.buckets.female.len(),
                male: self.buckets.male.len(),
                pairs,
            })?;
            info!(%source, remaining = self.pool.remaining(), "gathering articles");

            self.gather(&source, dedup).await?;
        }

        let pairs = pair_candidates(&self.buckets.female, &self.buckets.male, &mut self.rng);
        info!(count = pairs.len(), "candidates ready");
        Ok(pairs)
    }

    /// One collecting step: fetch, split, classify, normalize, filter, merge.
    async fn gather(&mut self, source: &Source, dedup: Option<&dyn DedupFilter>) -> Result<(), CandidateError> {
        let articles = self
            .fetcher
            .fetch_articles(source)
            .await
            .map_err(|error| CandidateError::Fetch { origin: source.clone(), error })?;

        let mut sentences = Vec::new();
        for article in &articles {
            let split = self
                .tokenizer
                .tokenize(article)
                .map_err(|error| CandidateError::Tokenize { origin: source.clone(), error })?;
            sentences.extend(split);
        }

        sentences.retain(|s| sentence::mentions_said(s));
        debug!(articles = articles.len(), said = sentences.len(), "sentences mentioning said");

        for speaker in [Speaker::Female, Speaker::Male] {
            let mut quotes = self
                .normalizer
                .normalize_all(sentences.iter().filter(|s| speaker.matches(s)));

            if let Some(filter) = dedup {
                quotes = filter.exclude(quotes).await.map_err(CandidateError::Dedup)?;
            }

            debug!(?speaker, survivors = quotes.len(), "normalized quotes");
            self.buckets.merge(speaker, quotes);
        }

        Ok(())
    }
}
