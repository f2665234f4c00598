//! Generation through an external command.

use std::env;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::CommandSettings;
use crate::error::GenerationError;

use super::generator::Generator;

/// Environment variable to override the configured timeout.
const TIMEOUT_ENV_VAR: &str = "POSTWRIGHT_TIMEOUT";

const MODEL_PLACEHOLDER: &str = "{model}";
const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Resolve the subprocess timeout.
///
/// Reads from POSTWRIGHT_TIMEOUT if set, otherwise uses `configured_secs`.
/// Logs a warning if the variable is set but is not a non-negative integer.
fn get_timeout(configured_secs: u64) -> Duration {
    match env::var(TIMEOUT_ENV_VAR) {
        Ok(v) if !v.is_empty() => match v.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                warn!(
                    "Invalid {} value '{}', using configured {}s",
                    TIMEOUT_ENV_VAR, v, configured_secs
                );
                Duration::from_secs(configured_secs)
            }
        },
        _ => Duration::from_secs(configured_secs),
    }
}

/// Check that the generation command is installed and on PATH.
pub fn check_program_installed(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Runs a configured program once per generation.
///
/// Arguments may contain `{model}` and `{prompt}`, which are replaced per
/// call. Stdout is the raw response. A non-zero exit carries stderr in the
/// error so the classifier can see upstream messages such as
/// `429 RESOURCE_EXHAUSTED`.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Build from settings, honouring the POSTWRIGHT_TIMEOUT override.
    pub fn from_settings(settings: &CommandSettings) -> Self {
        Self::new(
            settings.program.clone(),
            settings.args.clone(),
            get_timeout(settings.timeout_secs),
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn render_args(&self, prompt: &str, model: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace(MODEL_PLACEHOLDER, model)
                    .replace(PROMPT_PLACEHOLDER, prompt)
            })
            .collect()
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, GenerationError> {
        let args = self.render_args(prompt, model);
        let timeout_secs = self.timeout.as_secs();

        debug!(program = %self.program, prompt_len = prompt.len(), "Spawning backend");

        let output = timeout(
            self.timeout,
            Command::new(&self.program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| GenerationError::Timeout(timeout_secs))?
        .map_err(GenerationError::SpawnFailed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output.status.code().unwrap_or(-1);
            return Err(GenerationError::NonZeroExit { code, stderr });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
