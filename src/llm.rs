use crate::capability::{Generator, RepairRequest, SqlRepairer};
use crate::config::LlmConfig;
use crate::error::{QueryError, Result};
use crate::schema::catalog::Schema;
use crate::schema::semantic::SemanticCatalog;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, warn};

lazy_static! {
    /// A fenced block, with or without a language tag on the opening line.
    // Constant pattern; compiled once.
    static ref FENCE: Regex = Regex::new(r"(?s)```(?:[A-Za-z]+[ \t]*\n)?\s*(.*?)\s*```").unwrap();
}

const SQL_SYSTEM_PROMPT: &str = "You write a single read-only PostgreSQL SELECT statement. Return SQL only.";
const INTENT_SYSTEM_PROMPT: &str = "Return JSON only, no text.";

/// Chat-completions client for any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| QueryError::Config("LLM_API_KEY (or OPENAI_API_KEY) is not set".to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QueryError::Llm(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        })
    }

    pub async fn call_llm(&self, system: &str, prompt: &str) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.0,
        });
        // Reasoning models reject max_tokens.
        if self.model.starts_with("gpt-5") || self.model.contains("o1") {
            body["max_completion_tokens"] = serde_json::json!(2000);
        } else {
            body["max_tokens"] = serde_json::json!(800);
        }

        debug!("Calling {} with a {}-char prompt", self.model, prompt.len());
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(QueryError::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QueryError::Llm(format!("Failed to parse LLM response: {}", e)))?;
        extract_content(&response_json)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response.
fn extract_content(response: &serde_json::Value) -> Result<String> {
    if let Some(error) = response.get("error") {
        return Err(QueryError::Llm(format!("LLM API error: {}", error)));
    }
    let choice = response
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .ok_or_else(|| QueryError::Llm("No choices in LLM response".to_string()))?;

    match choice.get("finish_reason").and_then(|r| r.as_str()) {
        Some("length") => warn!("LLM response was truncated due to length limit"),
        Some("content_filter") => {
            return Err(QueryError::Llm("LLM response was filtered by content policy".to_string()))
        }
        _ => {}
    }

    match choice["message"]["content"].as_str() {
        Some(content) if !content.trim().is_empty() => Ok(content.to_string()),
        _ => Err(QueryError::Llm("Empty content in LLM response".to_string())),
    }
}

/// Strip markdown fences and surrounding prose from a model's SQL answer.
pub fn clean_sql_response(raw: &str) -> String {
    let text = raw.trim();
    if let Some(caps) = FENCE.captures(text) {
        return caps[1].trim().to_string();
    }
    text.trim_start_matches("```sql")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .to_string()
}

/// Every table with its columns, then every foreign-key join.
pub fn describe_schema(schema: &Schema) -> String {
    let mut out = String::from("DATABASE TABLES:\n");
    for (table, columns) in schema.tables() {
        out.push_str(&format!("{}({})\n", table, columns.join(", ")));
    }
    out.push_str("\nVALID FOREIGN KEY JOINS:\n");
    for edge in schema.graph().all_edges() {
        out.push_str(&format!("{} = {}\n", edge.join_on.left, edge.join_on.right));
    }
    out
}

pub fn sql_prompt(question: &str, schema: &Schema) -> String {
    format!(
        "{}\n\
         RULES:\n\
         - Write exactly one SELECT statement.\n\
         - Use only the tables and columns listed above.\n\
         - Join only along the listed foreign keys, and only when the question needs it.\n\
         - Qualify every column with its table name or alias.\n\
         - Never use INSERT, UPDATE, DELETE, DROP or ALTER.\n\
         - No markdown, no explanation.\n\n\
         QUESTION:\n{}\n",
        describe_schema(schema),
        question
    )
}

pub fn repair_prompt(request: &RepairRequest<'_>) -> String {
    format!(
        "The SQL below was rejected by the validator.\n\n\
         ORIGINAL QUESTION:\n{}\n\n\
         INVALID SQL:\n{}\n\n\
         VALIDATION ERROR:\n{} ({})\n\n\
         {}\n\
         Fix the SQL so it answers the original question. Use only the tables,\n\
         columns and joins listed above and return a single SELECT statement.\n",
        request.question,
        request.invalid_sql,
        request.error,
        request.error.kind(),
        describe_schema(request.schema)
    )
}

pub fn intent_prompt(question: &str, semantics: &SemanticCatalog) -> String {
    format!(
        "Translate the question into a query intent.\n\n\
         ENTITIES: {}\n\
         METRICS: {}\n\
         TIME RANGES: last_month, all_time, none\n\n\
         Return a JSON object with keys \"entity\", \"metric\", \"time_range\",\n\
         \"direction\" (\"asc\" or \"desc\") and \"limit\" (positive integer).\n\n\
         QUESTION:\n{}\n",
        semantics.entity_names().join(", "),
        semantics.metric_names().join(", "),
        question
    )
}

#[async_trait]
impl Generator for LlmClient {
    async fn generate_sql(&self, question: &str, schema: &Schema) -> Result<String> {
        let raw = self
            .call_llm(SQL_SYSTEM_PROMPT, &sql_prompt(question, schema))
            .await
            .map_err(|e| QueryError::GenerationFailed(e.to_string()))?;
        Ok(clean_sql_response(&raw))
    }

    async fn generate_intent(&self, question: &str, semantics: &SemanticCatalog) -> Result<String> {
        self.call_llm(INTENT_SYSTEM_PROMPT, &intent_prompt(question, semantics))
            .await
            .map_err(|e| QueryError::GenerationFailed(e.to_string()))
    }
}

#[async_trait]
impl SqlRepairer for LlmClient {
    async fn repair_sql(&self, request: &RepairRequest<'_>) -> Result<String> {
        let raw = self
            .call_llm(SQL_SYSTEM_PROMPT, &repair_prompt(request))
            .await
            .map_err(|e| QueryError::RepairFailed(e.to_string()))?;
        Ok(clean_sql_response(&raw))
    }
}
