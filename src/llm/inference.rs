use crate::error::{ReconcileError, Result};
use crate::inference::{ColumnInference, InferenceProposals, InferenceRequest, InferredColumn};
use crate::llm::client::GeminiClient;
use crate::llm::prompts::SYSTEM_PROMPT_COLUMN_MAPPING;
use crate::llm::types::{gemini_schema, Content};
use futures::future::{BoxFuture, FutureExt};
use log::{debug, info, warn};
use std::fmt::Write as _;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Column inference backed by a Gemini model with a JSON response schema.
pub struct GeminiColumnInference {
    client: GeminiClient,
    model: String,
}

impl GeminiColumnInference {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn run(&self, request: &InferenceRequest) -> Result<Vec<InferredColumn>> {
        if request.columns.is_empty() || request.candidates.is_empty() {
            return Ok(Vec::new());
        }

        info!(
            "Asking {} to map {} column(s) of {}",
            self.model,
            request.columns.len(),
            request.dataset
        );

        let schema = gemini_schema(schemars::schema_for!(InferenceProposals))?;
        let text = self
            .client
            .generate_content(
                &self.model,
                SYSTEM_PROMPT_COLUMN_MAPPING,
                vec![Content::user(build_prompt(request))],
                Some(schema),
            )
            .await?;
        debug!("Raw inference response: {}", text);

        let proposals = parse_proposals(&text)?;
        Ok(accept_proposals(request, proposals))
    }
}

impl ColumnInference for GeminiColumnInference {
    fn name(&self) -> &str {
        &self.model
    }

    fn infer<'a>(
        &'a self,
        request: &'a InferenceRequest,
    ) -> BoxFuture<'a, Result<Vec<InferredColumn>>> {
        self.run(request).boxed()
    }
}

pub fn build_prompt(request: &InferenceRequest) -> String {
    let mut prompt = format!("Dataset type: {}\n\n## UNMATCHED COLUMNS\n", request.dataset.label());
    for column in &request.columns {
        let _ = writeln!(prompt, "- \"{}\" samples: {:?}", column.name, column.samples);
    }

    prompt.push_str("\n## CANDIDATE FIELDS\n");
    for candidate in &request.candidates {
        let _ = writeln!(
            prompt,
            "- {} ({:?}{}): {}. Known labels: {}",
            candidate.name,
            candidate.kind,
            if candidate.required { ", required" } else { "" },
            candidate.description,
            candidate.labels.join(", ")
        );
    }
    prompt
}

/// Parses the model reply, tolerating a surrounding markdown code fence.
pub fn parse_proposals(text: &str) -> Result<InferenceProposals> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim())
        .map_err(|e| ReconcileError::InferenceFailed(format!("Unparseable model response: {}", e)))
}

/// Drops null proposals and anything naming an unknown column or a non-candidate field.
fn accept_proposals(
    request: &InferenceRequest,
    proposals: InferenceProposals,
) -> Vec<InferredColumn> {
    proposals
        .mappings
        .into_iter()
        .filter(|p| {
            let Some(canonical) = p.canonical.as_deref() else {
                return false;
            };
            let known = request.columns.iter().any(|c| c.name == p.column)
                && request.candidate(canonical).is_some();
            if !known {
                warn!("Ignoring proposal {} -> {}", p.column, canonical);
            }
            known
        })
        .collect()
}
