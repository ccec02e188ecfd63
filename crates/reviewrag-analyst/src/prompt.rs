//! Fixed analysis prompts and context assembly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use reviewrag_core::error::Error;
use reviewrag_core::types::RetrievedReview;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisType {
    #[default]
    General,
    RootCause,
    FeatureRequests,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 3] = [AnalysisType::General, AnalysisType::RootCause, AnalysisType::FeatureRequests];

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisType::General => "General Analysis",
            AnalysisType::RootCause => "Root Cause Analysis",
            AnalysisType::FeatureRequests => "Feature Requests",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            AnalysisType::General => "general",
            AnalysisType::RootCause => "root-cause",
            AnalysisType::FeatureRequests => "feature-requests",
        }
    }

    fn template(&self) -> &'static str {
        match self {
            AnalysisType::General => GENERAL_TEMPLATE,
            AnalysisType::RootCause => ROOT_CAUSE_TEMPLATE,
            AnalysisType::FeatureRequests => FEATURE_REQUEST_TEMPLATE,
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AnalysisType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        AnalysisType::ALL
            .into_iter()
            .find(|t| t.slug().eq_ignore_ascii_case(wanted) || t.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::InvalidConfig(format!("unknown analysis type '{}'", wanted)))
    }
}

const GENERAL_TEMPLATE: &str = "You are a senior Product Analyst analyzing user feedback.

User Reviews:
{context}

Question: {query}

Provide:
1. Direct answer with specific evidence
2. Key patterns identified
3. Actionable recommendations with priority
4. Timeline context if relevant

Be concise and data-driven.";

const ROOT_CAUSE_TEMPLATE: &str = "You are a senior Product Analyst conducting root cause analysis.

User Reviews:
{context}

Question: {query}

Analyze:
1. Primary root causes (ranked by evidence strength)
2. Supporting evidence with dates
3. Timeline: When did this issue emerge?
4. Affected user segments
5. Quick wins vs long-term fixes

Focus on recent trends.";

const FEATURE_REQUEST_TEMPLATE: &str = "You are a senior Product Analyst evaluating feature requests.

User Reviews:
{context}

Question: {query}

Provide:
1. Most requested features (ranked by frequency)
2. User pain points driving each request
3. Expected impact on satisfaction
4. Implementation priority
5. Emerging trends

Focus on what users want NOW.";

/// `Review N:` blocks, 1-based, separated by a blank line.
pub fn build_context(reviews: &[RetrievedReview]) -> String {
    reviews
        .iter()
        .enumerate()
        .map(|(i, r)| format!("Review {}:\n{}", i + 1, r.document))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_prompt(analysis: AnalysisType, query: &str, context: &str) -> String {
    // single pass so a literal "{query}" inside a review is left alone
    let template = analysis.template();
    let (head, rest) = template.split_once("{context}").unwrap_or((template, ""));
    format!("{}{}{}", head, context, rest.replacen("{query}", query, 1))
}
