use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::Text { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    Other(Value),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Content,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
}

/// Rewrites a schemars root schema into the subset Gemini accepts:
/// references are inlined, `$schema`/`definitions`/`title` are dropped and
/// `["T", "null"]` type unions become `type: T, nullable: true`.
pub fn gemini_schema(root: schemars::schema::RootSchema) -> serde_json::Result<Value> {
    let mut value = serde_json::to_value(root)?;
    let definitions = value
        .as_object_mut()
        .and_then(|obj| obj.remove("definitions"))
        .and_then(|defs| match defs {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default();
    Ok(clean(value, &definitions))
}

fn clean(value: Value, definitions: &Map<String, Value>) -> Value {
    match value {
        Value::Object(mut obj) => {
            if let Some(Value::String(reference)) = obj.get("$ref") {
                let name = reference.trim_start_matches("#/definitions/");
                if let Some(target) = definitions.get(name) {
                    return clean(target.clone(), definitions);
                }
            }
            obj.remove("$schema");
            obj.remove("title");
            obj.remove("definitions");

            if let Some(Value::Array(types)) = obj.get("type") {
                let concrete: Vec<Value> = types
                    .iter()
                    .filter(|t| t.as_str() != Some("null"))
                    .cloned()
                    .collect();
                if concrete.len() == 1 && concrete.len() < types.len() {
                    obj.insert("type".to_string(), concrete[0].clone());
                    obj.insert("nullable".to_string(), Value::Bool(true));
                }
            }

            Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, clean(v, definitions)))
                    .collect(),
            )
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| clean(v, definitions)).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::InferenceProposals;

    #[test]
    fn test_gemini_schema_inlines_references() {
        let schema = gemini_schema(schemars::schema_for!(InferenceProposals)).unwrap();
        let text = schema.to_string();
        assert!(!text.contains("$ref"));
        assert!(!text.contains("definitions"));
        assert!(!text.contains("$schema"));

        let canonical = &schema["properties"]["mappings"]["items"]["properties"]["canonical"];
        assert_eq!(canonical["type"], "string");
        assert_eq!(canonical["nullable"], true);
    }

    #[test]
    fn test_response_parts_deserialize() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{}"}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        let candidates = response.candidates.unwrap();
        assert!(matches!(&candidates[0].content.parts[0], Part::Text { text } if text == "{}"));
    }
}
