use crate::embedding::GaitMetrics;
use serde::Deserialize;

pub const TOP_K: usize = 5;

/// One hit from a similarity query.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MatchResult {
    pub id: String,
    pub score: f32,
}

/// Highest score first. NaN scores sink to the bottom.
pub fn rank(matches: &mut [MatchResult]) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or_else(|| a.score.is_nan().cmp(&b.score.is_nan()))
    });
}

/// Console listing shown to the operator.
pub fn format_ranking(matches: &[MatchResult]) -> String {
    matches
        .iter()
        .enumerate()
        .map(|(i, m)| format!("  {}. {:25} (similarity: {:.3})\n", i + 1, m.id, m.score))
        .collect()
}

/// Context block embedded in the analysis prompt.
pub fn format_context(matches: &[MatchResult]) -> String {
    let mut context = format!("Top {} most similar gaits:\n", TOP_K);
    for (i, m) in matches.iter().enumerate() {
        context += &format!("{}. {} (similarity: {:.3})\n", i + 1, m.id, m.score);
    }
    context
}

pub fn compose_prompt(metrics: &GaitMetrics, matches: &[MatchResult]) -> String {
    format!(
        "You are a biomechanics expert. Analyze this gait pattern based on the similar matches found.

Input gait:
- Cadence: {} steps/min
- Heel strike ratio: {} (0=toe, 1=heel)
- Vertical oscillation: {} cm

{}

Provide a brief analysis explaining what this gait pattern suggests.",
        metrics.cadence,
        metrics.heel_strike,
        metrics.vertical_oscillation,
        format_context(matches)
    )
}
