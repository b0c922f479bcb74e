//! Shared test doubles for end-to-end engine tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use verifix::verifix_sandbox::{
    ContainerId, ContainerRuntime, ContainerSpec, SandboxError, SandboxResult,
};
use verifix::{Config, PatchError, PatchService, SecurityIssue};

// ── Fake container runtime ───────────────────────────────────────────────────

/// What a fake tool container does
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// `None` simulates a timeout
    pub exit_code: Option<i32>,
    pub logs: String,
    /// `(path inside the container, file content)`
    pub output: Option<(String, String)>,
}

impl Script {
    pub fn exits(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Default::default()
        }
    }

    pub fn with_logs(mut self, logs: impl Into<String>) -> Self {
        self.logs = logs.into();
        self
    }

    pub fn with_output(mut self, path: &str, content: impl Into<String>) -> Self {
        self.output = Some((path.to_string(), content.into()));
        self
    }
}

#[derive(Default)]
struct State {
    next_id: u32,
    running: HashMap<String, Script>,
    started_images: Vec<String>,
    removed: usize,
    stopped: usize,
}

/// In-memory container engine keyed by image.
///
/// Each image holds `(needle, script)` pairs; the first pair whose needle
/// occurs in the mounted source decides what the container does.
pub struct FakeRuntime {
    reachable: bool,
    scripts: HashMap<String, Vec<(String, Script)>>,
    state: Mutex<State>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            reachable: true,
            scripts: HashMap::new(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    /// Script used for `image` whatever the source
    pub fn with_image(self, image: &str, script: Script) -> Self {
        self.with_image_when(image, "", script)
    }

    /// Script used for `image` when the source contains `needle`
    pub fn with_image_when(mut self, image: &str, needle: &str, script: Script) -> Self {
        self.scripts
            .entry(image.to_string())
            .or_default()
            .push((needle.to_string(), script));
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub async fn started_images(&self) -> Vec<String> {
        self.state.lock().await.started_images.clone()
    }

    pub async fn removed(&self) -> usize {
        self.state.lock().await.removed
    }

    pub async fn stopped(&self) -> usize {
        self.state.lock().await.stopped
    }

    fn script_for(&self, image: &str, host_dir: &Path) -> Option<Script> {
        let source = std::fs::read_to_string(host_dir.join("contract.sol")).unwrap_or_default();
        self.scripts
            .get(image)?
            .iter()
            .find(|(needle, _)| source.contains(needle.as_str()))
            .map(|(_, script)| script.clone())
    }

    async fn script(&self, id: &ContainerId) -> SandboxResult<Script> {
        self.state
            .lock()
            .await
            .running
            .get(&id.0)
            .cloned()
            .ok_or_else(|| SandboxError::UnexpectedResponse(format!("no such container {id}")))
    }
}

fn tar_of(path: &str, content: &str) -> Vec<u8> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, name, content.as_bytes())
        .unwrap();
    builder.into_inner().unwrap()
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn ping(&self) -> SandboxResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(SandboxError::RuntimeUnavailable(
                "Cannot connect to the Docker daemon".to_string(),
            ))
        }
    }

    async fn ensure_image(&self, image: &str) -> SandboxResult<()> {
        if self.scripts.contains_key(image) {
            Ok(())
        } else {
            Err(SandboxError::ImageUnavailable {
                image: image.to_string(),
                reason: "pull access denied".to_string(),
            })
        }
    }

    async fn start(&self, spec: &ContainerSpec) -> SandboxResult<ContainerId> {
        let script = self
            .script_for(&spec.image, &spec.host_dir)
            .ok_or_else(|| SandboxError::CreationFailed(format!("no script for {}", spec.image)))?;
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = format!("{:012x}", state.next_id);
        state.running.insert(id.clone(), script);
        state.started_images.push(spec.image.clone());
        Ok(ContainerId(id))
    }

    async fn wait(&self, id: &ContainerId, _timeout: Duration) -> SandboxResult<Option<i32>> {
        Ok(self.script(id).await?.exit_code)
    }

    async fn stop(&self, _id: &ContainerId, _grace: Duration) -> SandboxResult<()> {
        self.state.lock().await.stopped += 1;
        Ok(())
    }

    async fn logs(&self, id: &ContainerId) -> SandboxResult<Vec<u8>> {
        Ok(self.script(id).await?.logs.into_bytes())
    }

    async fn copy_out(&self, id: &ContainerId, path: &str) -> SandboxResult<Option<Vec<u8>>> {
        let script = self.script(id).await?;
        Ok(script
            .output
            .filter(|(declared, _)| declared == path)
            .map(|(declared, content)| tar_of(&declared, &content)))
    }

    async fn remove(&self, id: &ContainerId) -> SandboxResult<()> {
        let mut state = self.state.lock().await;
        state.running.remove(&id.0);
        state.removed += 1;
        Ok(())
    }
}

// ── Patch service double ─────────────────────────────────────────────────────

/// Returns queued replies in order; errors once the queue is empty
pub struct QueuedPatcher {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<usize>,
}

impl QueuedPatcher {
    pub fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: Mutex::new(0),
        })
    }

    pub async fn calls(&self) -> usize {
        *self.calls.lock().await
    }
}

#[async_trait]
impl PatchService for QueuedPatcher {
    async fn patch(
        &self,
        _source: &str,
        _issues: &[SecurityIssue],
        _contract_name: &str,
        _generation_metadata: Option<&Value>,
    ) -> Result<String, PatchError> {
        *self.calls.lock().await += 1;
        self.replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| PatchError::Unavailable("no more replies".to_string()))
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

/// Declare a tool under `tools_dir/<id>/config.yaml`
pub fn declare_tool(tools_dir: &Path, id: &str, image: &str, parser: &str, output: Option<&str>) {
    let dir = tools_dir.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    let mut yaml = format!(
        "name: {id}\nimage: {image}\nparser: {parser}\nsolidity:\n  entrypoint: \"run-{id} '$FILENAME' $TIMEOUT\"\n"
    );
    if let Some(output) = output {
        yaml.push_str(&format!("output: {output}\n"));
    }
    std::fs::write(dir.join("config.yaml"), yaml).unwrap();
}

/// Default configuration reading tool declarations from `tools_dir`
pub fn config_with_tools(tools_dir: &Path, tools: &[&str]) -> Config {
    let mut config = Config::default();
    config.analysis.tools_dir = Some(tools_dir.to_path_buf());
    config.analysis.default_tools = tools.iter().map(|t| t.to_string()).collect();
    config.analysis.tool_timeout_secs = 5;
    config.analysis.max_concurrent_tools = 2;
    config
}

/// Slither JSON report with one detector per `(check, impact, line)`
pub fn slither_report(detectors: &[(&str, &str, u32)]) -> String {
    let detectors: Vec<Value> = detectors
        .iter()
        .map(|(check, impact, line)| {
            serde_json::json!({
                "check": check,
                "impact": impact,
                "confidence": "Medium",
                "description": format!("{check} in Bank.withdraw() (contract.sol#{line})\n"),
                "elements": []
            })
        })
        .collect();
    serde_json::json!({"success": true, "error": null, "results": {"detectors": detectors}}).to_string()
}

pub const REENTRANT_BANK: &str = r#"pragma solidity ^0.8.0;

contract Bank {
    mapping(address => uint256) public balances;

    function withdraw(uint256 amount) public {
        require(balances[msg.sender] >= amount);
        (bool ok, ) = msg.sender.call{value: amount}("");
        require(ok);
        balances[msg.sender] -= amount;
    }
}
"#;
