//! Manual check of a live source: fetches it and shows which sentences
//! survive as quotes.
//!
//!   cargo run --bin probe_source -- "gardening" site:npr

use common::{PolitenessConfig, SourcesConfig};
use said::ingestion::{ArticleFetcher, NewsFetcher};
use said::sentence::{self, Normalizer, Speaker};
use said::sources::Source;
use said::tokenize::{SentenceSplitter, Tokenizer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let fetcher = NewsFetcher::new(&SourcesConfig::default(), &PolitenessConfig::default())?;
    let normalizer = Normalizer::default().with_cosmetic(true);

    let mut sources: Vec<Source> = std::env::args()
        .skip(1)
        .map(|arg| match arg.strip_prefix("site:") {
            Some(name) => Source::Site(name.to_string()),
            None => Source::SearchTerm(arg),
        })
        .collect();
    if sources.is_empty() {
        sources.push(Source::SearchTerm(String::new()));
    }

    for source in sources {
        println!("\n{}", "=".repeat(60));
        println!("Probing: {}", source);
        println!("{}", "=".repeat(60));

        let articles = match fetcher.fetch_articles(&source).await {
            Ok(articles) => articles,
            Err(e) => {
                println!("✗ Failed: {:#}", e);
                continue;
            }
        };
        println!("✓ {} articles", articles.len());

        for article in &articles {
            let sentences = match SentenceSplitter.tokenize(article) {
                Ok(sentences) => sentences,
                Err(e) => {
                    println!("✗ Tokenize failed: {:#}", e);
                    continue;
                }
            };

            for raw in sentences.iter().filter(|s| sentence::mentions_said(s)) {
                for speaker in [Speaker::Female, Speaker::Male] {
                    if !speaker.matches(raw) {
                        continue;
                    }
                    match normalizer.normalize(raw) {
                        Some(quote) => println!("  {} {}", speaker.marker(), quote),
                        None => println!("  ✗ {}", raw),
                    }
                }
            }
        }
    }

    Ok(())
}
