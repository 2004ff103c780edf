//! Insight generator — asks an LLM for a structured market analysis of an
//! industry.
//!
//! Generation is the slow part of a profile update, so callers run it
//! before opening any transaction. A failed generation fails the whole
//! operation; there is no partial insight.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::error::InsightError;
use crate::insights::model::InsightData;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};

/// Tuning knobs for insight generation.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// LLM temperature. Low, since the output must be strict JSON.
    pub temperature: f32,
    /// Max tokens for the generated payload.
    pub max_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 2048,
        }
    }
}

/// Produces the AI-generated insight payload for an industry.
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate(&self, industry: &str) -> Result<InsightData, InsightError>;
}

/// LLM-backed generator.
pub struct LlmInsightGenerator {
    llm: Arc<dyn LlmProvider>,
    config: GeneratorConfig,
}

impl LlmInsightGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, config: GeneratorConfig) -> Self {
        Self { llm, config }
    }

    fn build_prompt(industry: &str) -> String {
        format!(
            "Analyze the current state of the {industry} industry and provide insights in ONLY \
             the following JSON format without any additional notes or explanations:\n\
             {{\n\
               \"salaryRanges\": [\n\
                 {{ \"role\": \"string\", \"min\": number, \"max\": number, \"median\": number, \"location\": \"string\" }}\n\
               ],\n\
               \"growthRate\": number,\n\
               \"demandLevel\": \"High\" | \"Medium\" | \"Low\",\n\
               \"topSkills\": [\"skill1\", \"skill2\"],\n\
               \"marketOutlook\": \"Positive\" | \"Neutral\" | \"Negative\",\n\
               \"keyTrends\": [\"trend1\", \"trend2\"],\n\
               \"recommendedSkills\": [\"skill1\", \"skill2\"]\n\
             }}\n\n\
             IMPORTANT: Return ONLY the JSON. No additional text, notes, or markdown formatting.\n\
             Include at least 5 common roles for salary ranges. Growth rate should be a percentage.\n\
             Include at least 5 skills and trends."
        )
    }
}

#[async_trait]
impl InsightGenerator for LlmInsightGenerator {
    async fn generate(&self, industry: &str) -> Result<InsightData, InsightError> {
        info!(industry = industry, model = self.llm.model_name(), "Generating industry insight");

        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You are a labor-market analyst. You respond with machine-readable JSON only.",
            ),
            ChatMessage::user(Self::build_prompt(industry)),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = self.llm.complete(request).await.map_err(InsightError::Generation)?;

        let json_str = extract_json_object(&response.content);
        let data: InsightData = serde_json::from_str(&json_str).map_err(|e| {
            warn!(
                error = %e,
                industry = industry,
                response = %response.content,
                "Failed to parse generated insight payload"
            );
            InsightError::InvalidPayload(e.to_string())
        })?;

        let (input_rate, output_rate) = self.llm.cost_per_token();
        let cost = input_rate * Decimal::from(response.input_tokens)
            + output_rate * Decimal::from(response.output_tokens);
        info!(
            industry = industry,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            cost = %cost,
            roles = data.salary_ranges.len(),
            "Industry insight generated"
        );

        Ok(data)
    }
}

/// Extract a JSON object from LLM output that might contain markdown or extra text.
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    // Already a JSON object
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Wrapped in markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    // Try to find object bounds
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                return trimmed[start..=end].to_string();
            }
        }
    }

    // Give up, return as-is
    error!(text = trimmed, "Could not extract JSON object from LLM response");
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::insights::model::{DemandLevel, MarketOutlook};
    use crate::llm::provider::{CompletionResponse, FinishReason};

    const VALID_PAYLOAD: &str = r#"{
        "salaryRanges": [
            { "role": "Engineer", "min": 80000, "max": 160000, "median": 120000, "location": "US" }
        ],
        "growthRate": 5.1,
        "demandLevel": "Medium",
        "topSkills": ["a", "b"],
        "marketOutlook": "Neutral",
        "keyTrends": ["t1"],
        "recommendedSkills": ["r1"]
    }"#;

    struct StubLlm {
        response: String,
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn model_name(&self) -> &str {
            "stub-model"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: self.response.clone(),
                input_tokens: 100,
                output_tokens: 50,
                finish_reason: FinishReason::Stop,
                response_id: None,
            })
        }
    }

    fn generator(response: &str) -> LlmInsightGenerator {
        LlmInsightGenerator::new(
            Arc::new(StubLlm {
                response: response.to_string(),
            }),
            GeneratorConfig::default(),
        )
    }

    #[test]
    fn extract_json_direct() {
        let input = r#"{"growthRate": 5.0}"#;
        assert_eq!(extract_json_object(input), input);
    }

    #[test]
    fn extract_json_from_markdown() {
        let input = "Here is the analysis:\n```json\n{\"growthRate\": 5.0}\n```\n";
        let result = extract_json_object(input);
        assert!(result.starts_with('{'));
        assert!(result.contains("growthRate"));
    }

    #[test]
    fn extract_json_with_surrounding_text() {
        let input = "Sure! {\"growthRate\": 5.0} hope that helps";
        let result = extract_json_object(input);
        assert!(result.starts_with('{'));
        assert!(result.ends_with('}'));
    }

    #[test]
    fn prompt_names_the_industry_and_contract() {
        let prompt = LlmInsightGenerator::build_prompt("healthcare-nursing");
        assert!(prompt.contains("healthcare-nursing"));
        assert!(prompt.contains("salaryRanges"));
        assert!(prompt.contains("ONLY the JSON"));
    }

    #[tokio::test]
    async fn generate_parses_clean_payload() {
        let data = generator(VALID_PAYLOAD).generate("tech").await.unwrap();
        assert_eq!(data.demand_level, DemandLevel::Medium);
        assert_eq!(data.market_outlook, MarketOutlook::Neutral);
        assert_eq!(data.salary_ranges.len(), 1);
    }

    #[tokio::test]
    async fn generate_unwraps_fenced_payload() {
        let fenced = format!("```json\n{VALID_PAYLOAD}\n```");
        let data = generator(&fenced).generate("tech").await.unwrap();
        assert_eq!(data.growth_rate, 5.1);
    }

    #[tokio::test]
    async fn generate_rejects_malformed_payload() {
        let err = generator("not json at all").generate("tech").await.unwrap_err();
        assert!(matches!(err, InsightError::InvalidPayload(_)));
    }
}
