use super::{InvocationContext, ProviderOutput, Reasoner};
use crate::error::ProviderError;
use crate::record::StageId;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// One canned answer. A bare string is the response text.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FixtureResponse {
    Text(String),
    Scripted {
        #[serde(default)]
        response: Option<String>,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        delay_ms: u64,
    },
}

/// On-disk shape of a fixture file
pub type FixtureFile = HashMap<StageId, FixtureResponse>;

/// Replays responses from a YAML/JSON file keyed by stage id
#[derive(Debug, Clone)]
pub struct FixtureReasoner {
    responses: HashMap<StageId, FixtureResponse>,
}

impl FixtureReasoner {
    pub fn new(responses: HashMap<StageId, FixtureResponse>) -> Self {
        Self { responses }
    }

    pub fn load(path: &Path) -> Result<Self, ProviderError> {
        let content = std::fs::read_to_string(path)?;
        let responses: FixtureFile = serde_yaml::from_str(&content)
            .map_err(|e| {
                ProviderError::Scripted(format!("invalid fixture {}: {}", path.display(), e))
            })?;
        Ok(Self::new(responses))
    }
}

#[async_trait]
impl Reasoner for FixtureReasoner {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn invoke(
        &self,
        _request: &str,
        context: &InvocationContext,
    ) -> Result<ProviderOutput, ProviderError> {
        let start = std::time::Instant::now();
        let entry = self
            .responses
            .get(&context.stage)
            .ok_or_else(|| ProviderError::MissingFixture(context.stage.to_string()))?;

        let text = match entry {
            FixtureResponse::Text(text) => text.clone(),
            FixtureResponse::Scripted {
                response,
                error,
                delay_ms,
            } => {
                if *delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                }
                if let Some(error) = error {
                    return Err(ProviderError::Scripted(error.clone()));
                }
                response.clone().ok_or(ProviderError::EmptyResponse)?
            }
        };

        Ok(ProviderOutput {
            text,
            duration: start.elapsed(),
        })
    }
}
