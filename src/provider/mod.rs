mod claude;
mod codex;
mod fixture;

pub use claude::ClaudeRunner;
pub use codex::CodexRunner;
pub use fixture::{FixtureFile, FixtureReasoner};

use crate::config::{Config, Provider};
use crate::error::ProviderError;
use crate::record::StageId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub struct ProviderOutput {
    pub text: String,
    pub duration: Duration,
}

/// What the reasoner needs besides the request itself
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub stage: StageId,
    /// Level 1 catalog plus the Level 2 skill instructions for this stage
    pub instructions: String,
}

/// The external text-completion capability consulted by every stage
#[async_trait]
pub trait Reasoner: Send + Sync {
    fn name(&self) -> &'static str;

    async fn invoke(
        &self,
        request: &str,
        context: &InvocationContext,
    ) -> Result<ProviderOutput, ProviderError>;
}

/// Create the reasoner selected by the config
pub fn create_reasoner(config: &Config) -> Result<Arc<dyn Reasoner>, ProviderError> {
    let timeout = Duration::from_secs(config.timeout_sec);
    let reasoner: Arc<dyn Reasoner> = match config.provider {
        Provider::ClaudeCli => Arc::new(ClaudeRunner {
            binary: config.providers.claude_cli.binary.clone(),
            model: config.providers.claude_cli.model.clone(),
            permission_mode: config.providers.claude_cli.permission_mode.clone(),
            timeout,
        }),
        Provider::CodexCli => Arc::new(CodexRunner {
            binary: config.providers.codex_cli.binary.clone(),
            model: config.providers.codex_cli.model.clone(),
            timeout,
        }),
        Provider::Fixture => {
            let path = config
                .providers
                .fixture
                .path
                .as_deref()
                .ok_or_else(|| ProviderError::MissingFixture("<no fixture path>".to_string()))?;
            Arc::new(FixtureReasoner::load(path)?)
        }
    };
    Ok(reasoner)
}

/// `tokio::process::Command` for a binary given either as a path or a bare name
fn command_for(binary: &std::path::Path) -> tokio::process::Command {
    let binary_str = binary.to_string_lossy();
    if binary_str.contains('/') || binary_str.contains('\\') {
        tokio::process::Command::new(binary)
    } else {
        // Plain command name - let the OS find it in PATH
        tokio::process::Command::new(binary_str.as_ref())
    }
}
