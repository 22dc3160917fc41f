use super::generator::TextGenerator;
use super::matching::{compose_prompt, format_ranking, MatchResult, TOP_K};
use super::storage::VectorStore;
use crate::embedding::{embed, GaitEmbedding, GaitMetrics};
use crate::error::Result;
use crate::runner::RunnerRecord;
use std::io::Write;

/// Upload side: embeds runner records and writes them to the store.
pub struct Indexer<S> {
    store: S,
}

impl<S: VectorStore> Indexer<S> {
    pub fn new(store: S) -> Self {
        Indexer { store }
    }

    /// Embeds every record, then submits the whole collection as one batch.
    /// Nothing is sent unless every record embeds.
    pub async fn index<W: Write>(&self, runners: &[RunnerRecord], out: &mut W) -> Result<usize> {
        let mut vectors: Vec<(String, GaitEmbedding)> = Vec::with_capacity(runners.len());
        for runner in runners {
            let vector = embed(&runner.metrics())?;
            debug!("embed {} -> {}", runner, vector);
            writeln!(out, "✓ {:20} → {}", runner.name, vector)?;
            vectors.push((runner.name.clone(), vector));
        }

        if vectors.is_empty() {
            info!("no runners to upload, skip upsert");
            return Ok(0);
        }

        let count = self.store.upsert(&vectors).await?;
        if count != vectors.len() {
            warn!(
                "submitted {} vectors but store reports {} upserted",
                vectors.len(),
                count
            );
        }
        Ok(vectors.len())
    }
}

#[derive(Debug, PartialEq)]
pub enum QueryOutcome {
    /// The store had nothing similar; generation was never attempted.
    NoMatches,
    Analysed {
        matches: Vec<MatchResult>,
        analysis: String,
    },
}

/// Query side: similarity search followed by a narrated analysis.
pub struct Brain<S, G> {
    store: S,
    generator: G,
}

impl<S: VectorStore, G: TextGenerator> Brain<S, G> {
    pub fn new(store: S, generator: G) -> Self {
        Brain { store, generator }
    }

    pub async fn query<W: Write>(&self, metrics: &GaitMetrics, out: &mut W) -> Result<QueryOutcome> {
        let vector = embed(metrics)?;
        writeln!(out, "\nQuery vector: {}", vector)?;

        writeln!(out, "\nSearching for similar gaits...")?;
        let matches = self.store.query(&vector, TOP_K, true).await?;
        if matches.is_empty() {
            info!("query {} has no matches", vector);
            writeln!(out, "\nNo similar results found.")?;
            return Ok(QueryOutcome::NoMatches);
        }

        writeln!(out, "\nTop {} matches:\n", matches.len())?;
        write!(out, "{}", format_ranking(&matches))?;

        let prompt = compose_prompt(metrics, &matches);
        debug!("analysis prompt: {}", prompt);
        writeln!(out, "\nGenerating expert analysis...\n")?;
        out.flush()?;
        let analysis = self.generator.generate_analysis(&prompt).await?;
        writeln!(out, "{}", analysis)?;

        Ok(QueryOutcome::Analysed { matches, analysis })
    }
}
