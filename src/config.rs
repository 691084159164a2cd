use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use skyquery::agent::{DEFAULT_MAX_ITERATIONS, DEFAULT_SYSTEM_PROMPT, LoopConfig};
use skyquery::backend::AwsCliConfig;
use skyquery::environment::EnvironmentMode;
use skyquery::llm::AnthropicConfig;
use skyquery::llm::anthropic::{DEFAULT_API_KEY_ENV, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub aws: AwsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.0,
            timeout_ms: 120000,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: u32,
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: String,
    pub profile: Option<String>,
    pub cli_path: String,
    pub timeout_ms: u64,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            profile: None,
            cli_path: "aws".to_string(),
            timeout_ms: 60000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            agent: AgentConfig::default(),
            aws: AwsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            bail!("agent.max_iterations must be at least 1");
        }
        if self.llm.max_tokens == 0 {
            bail!("llm.max_tokens must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be between 0.0 and 1.0");
        }
        if self.llm.api_key_env.trim().is_empty() {
            bail!("llm.api_key_env must name an environment variable");
        }
        Ok(())
    }

    /// Apply command line overrides
    pub fn with_region(mut self, region: Option<&str>) -> Self {
        if let Some(region) = region {
            self.aws.region = region.to_string();
        }
        self
    }

    pub fn anthropic(&self) -> AnthropicConfig {
        AnthropicConfig {
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
            timeout: Duration::from_millis(self.llm.timeout_ms),
            api_key_env: self.llm.api_key_env.clone(),
        }
    }

    pub fn aws_cli(&self) -> AwsCliConfig {
        AwsCliConfig {
            cli_path: self.aws.cli_path.clone(),
            region: self.aws.region.clone(),
            profile: self.aws.profile.clone(),
            timeout: Duration::from_millis(self.aws.timeout_ms),
        }
    }

    /// Loop settings, with the mode's note appended to the system prompt
    pub fn loop_config(&self, mode: EnvironmentMode) -> LoopConfig {
        let system_prompt = match mode.prompt_note() {
            Some(note) => format!("{} {}", self.agent.system_prompt.trim_end(), note),
            None => self.agent.system_prompt.clone(),
        };
        LoopConfig {
            max_iterations: self.agent.max_iterations,
            system_prompt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.aws.cli_path, "aws");
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.llm.api_key_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_load_explicit_partial_file() {
        let file = write_config("aws:\n  region: eu-west-2\n  profile: audit\nagent:\n  max_iterations: 5\n");
        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();

        assert_eq!(config.aws.region, "eu-west-2");
        assert_eq!(config.aws.profile.as_deref(), Some("audit"));
        assert_eq!(config.aws.cli_path, "aws");
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.llm.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let path = PathBuf::from("/nonexistent/skyquery.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_invalid_yaml_fails() {
        let file = write_config("agent: [not, a, map]\n");
        assert!(Config::load(Some(&file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let file = write_config("agent:\n  max_iterations: 0\n");
        let err = Config::load(Some(&file.path().to_path_buf())).unwrap_err();
        assert!(format!("{err:#}").contains("max_iterations"));
    }

    #[test]
    fn test_region_override() {
        let config = Config::default().with_region(Some("ap-southeast-2"));
        assert_eq!(config.aws_cli().region, "ap-southeast-2");
        assert_eq!(Config::default().with_region(None).aws.region, "us-east-1");
    }

    #[test]
    fn test_conversions() {
        let config = Config::default();
        let anthropic = config.anthropic();
        assert_eq!(anthropic.timeout, Duration::from_millis(120000));
        assert_eq!(anthropic.max_tokens, DEFAULT_MAX_TOKENS);

        let aws = config.aws_cli();
        assert_eq!(aws.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_simulated_prompt_note() {
        let config = Config::default();
        let live = config.loop_config(EnvironmentMode::Live);
        let simulated = config.loop_config(EnvironmentMode::Simulated);

        assert_eq!(live.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert!(simulated.system_prompt.starts_with(DEFAULT_SYSTEM_PROMPT));
        assert!(simulated.system_prompt.ends_with("simulated AWS environment."));
        assert_eq!(simulated.max_iterations, 3);
    }
}
