//! Engine setup and wiring

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use verifix_core::config::{ConfigLoadError, Validate, ValidationError};
use verifix_core::domain::{AnalysisResult, FixSession};
use verifix_core::Config;
use verifix_orchestrator::{
    Analyzer, FixVerifyLoop, LoopSettings, PatchService, RegistryError, ToolAnalyzer, ToolRegistry,
};
use verifix_parsers::ParserRegistry;
use verifix_sandbox::{ContainerExecutor, ContainerRuntime, DockerCliRuntime, ExecutorSettings};

/// Error raised while assembling the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigLoadError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to load tool declarations: {0}")]
    Registry(#[from] RegistryError),
}

/// Composition root: tool registry, parsers, container executor, analyzer and loop settings
pub struct Engine {
    config: Config,
    tools: Arc<ToolRegistry>,
    analyzer: Arc<ToolAnalyzer>,
}

impl Engine {
    /// Load `.env`, then configuration from files and `VERIFIX__*` variables
    pub fn load() -> Result<Self, EngineError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Failed to load .env file");
            }
        }
        let config = Config::load()?;
        Self::from_config(&config)
    }

    /// Engine driving the configured Docker-compatible CLI
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        let runtime = Arc::new(DockerCliRuntime::from_config(&config.container));
        Self::with_runtime(config, runtime)
    }

    /// Engine on top of an arbitrary container runtime backend
    pub fn with_runtime(
        config: &Config,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let tools = Arc::new(ToolRegistry::from_config(&config.analysis)?);
        let parsers = Arc::new(ParserRegistry::with_builtin());
        debug!(
            tools = ?tools.ids(),
            parsers = ?parsers.registered(),
            runtime = runtime.name(),
            "Engine components ready"
        );

        let executor = Arc::new(ContainerExecutor::new(
            runtime,
            ExecutorSettings::from(&config.container),
        ));
        let analyzer = Arc::new(
            ToolAnalyzer::new(tools.clone(), parsers, executor)
                .with_max_concurrent(config.analysis.max_concurrent_tools),
        );

        Ok(Self {
            config: config.clone(),
            tools,
            analyzer,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Analyze `source` with the configured default tool set
    pub async fn analyze(&self, source: &str, contract_name: &str) -> AnalysisResult {
        self.analyze_with(source, contract_name, &self.config.analysis.default_tools)
            .await
    }

    /// Analyze `source` with an explicit tool set
    pub async fn analyze_with(
        &self,
        source: &str,
        contract_name: &str,
        tool_ids: &[String],
    ) -> AnalysisResult {
        self.analyzer
            .analyze(
                source,
                contract_name,
                tool_ids,
                self.config.analysis.tool_timeout(),
            )
            .await
    }

    /// Run a fix-verify session, delegating patches to `patcher`
    pub async fn run_fix_loop(
        &self,
        source: &str,
        contract_name: &str,
        generation_metadata: Option<Value>,
        patcher: Arc<dyn PatchService>,
    ) -> FixSession {
        let settings = LoopSettings::from_config(&self.config.fix_loop, &self.config.analysis);
        info!(
            contract = contract_name,
            budget = settings.max_iterations,
            floor = %settings.severity_floor,
            "Starting fix-verify session"
        );
        FixVerifyLoop::new(self.analyzer.clone(), patcher, settings)
            .run(source, contract_name, generation_metadata)
            .await
    }
}
