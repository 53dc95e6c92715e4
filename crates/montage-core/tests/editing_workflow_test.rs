use montage_core::{
    AgentError, ExecutorConfig, MontageConfig, Orchestrator, Plan, PlanExecutor, PlanProducer,
    PlanRequest, PlanStep, ProgressBus, ProgressEvent,
};
use montage_tools::{
    EditingContext, Error as ToolError, Tool, ToolDefinition, ToolOutcome, ToolRegistry,
    ToolRunner,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Imports a media file and reports the new asset id
struct ImportAssetTool {
    definition: ToolDefinition,
}

impl ImportAssetTool {
    fn new() -> Self {
        Self {
            definition: ToolDefinition::new("import_asset", "Import a media file").with_parameters(
                json!({
                    "type": "object",
                    "properties": {"path": {"type": "string"}},
                    "required": ["path"]
                }),
            ),
        }
    }
}

#[async_trait::async_trait]
impl Tool for ImportAssetTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        _args: Value,
        _context: &EditingContext,
    ) -> montage_tools::Result<ToolOutcome> {
        Ok(ToolOutcome::success(json!({"assetId": "asset_new"}), 3).with_side_effects(true))
    }
}

/// Places an asset on a track
struct InsertClipTool {
    definition: ToolDefinition,
}

impl InsertClipTool {
    fn new() -> Self {
        Self {
            definition: ToolDefinition::new("insert_clip", "Place an asset on a track")
                .with_parameters(json!({
                    "type": "object",
                    "properties": {
                        "assetId": {"type": "string"},
                        "trackId": {"type": "string"}
                    },
                    "required": ["assetId", "trackId"]
                })),
        }
    }
}

#[async_trait::async_trait]
impl Tool for InsertClipTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        args: Value,
        _context: &EditingContext,
    ) -> montage_tools::Result<ToolOutcome> {
        let asset = args["assetId"].as_str().unwrap_or_default();
        if !asset.starts_with("asset_") {
            return Err(ToolError::Execution(format!("Asset '{}' not found", asset)));
        }
        Ok(ToolOutcome::success(json!({"clipId": "clip_9"}), 2).with_side_effects(true))
    }
}

/// Fails with a connection reset a fixed number of times
struct FlakyRenderTool {
    definition: ToolDefinition,
    failures_left: AtomicUsize,
}

impl FlakyRenderTool {
    fn new(failures: usize) -> Self {
        Self {
            definition: ToolDefinition::new("render_preview", "Render a preview")
                .with_read_only(true),
            failures_left: AtomicUsize::new(failures),
        }
    }
}

#[async_trait::async_trait]
impl Tool for FlakyRenderTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        _args: Value,
        _context: &EditingContext,
    ) -> montage_tools::Result<ToolOutcome> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(ToolError::Network("connection reset by peer".to_string()));
        }
        Ok(ToolOutcome::success(json!({"frames": 24}), 5))
    }
}

fn registry(render_failures: usize) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ImportAssetTool::new()));
    registry.register(Arc::new(InsertClipTool::new()));
    registry.register(Arc::new(FlakyRenderTool::new(render_failures)));
    Arc::new(registry)
}

fn fast_executor() -> ExecutorConfig {
    ExecutorConfig::new().with_retry_delays(Duration::from_millis(1), Duration::from_millis(2))
}

/// Always proposes the same plan
struct Playbook(Value);

#[async_trait::async_trait]
impl PlanProducer for Playbook {
    fn name(&self) -> &str {
        "playbook"
    }

    async fn produce(&self, _request: &PlanRequest) -> Result<Value, AgentError> {
        Ok(self.0.clone())
    }
}

fn import_and_place(track_id: &str) -> Plan {
    Plan::new("Import the b-roll and place it")
        .with_rollback("remove the inserted clip")
        .with_step(
            PlanStep::new("import", "import_asset")
                .with_description("Import the file")
                .with_args(json!({"path": "/media/broll.mov"})),
        )
        .with_step(
            PlanStep::new("place", "insert_clip")
                .with_description("Place it on the main track")
                .with_args(json!({
                    "assetId": {"fromStep": "import", "path": "data.assetId"},
                    "trackId": track_id
                }))
                .depends_on("import"),
        )
}

fn orchestrator(plan: &Plan, registry: Arc<ToolRegistry>, config: MontageConfig) -> Orchestrator {
    let producer = Arc::new(Playbook(serde_json::to_value(plan).unwrap()));
    let runner = Arc::new(ToolRunner::with_defaults(registry.clone()));
    Orchestrator::new(producer, registry, runner, config)
}

#[tokio::test]
async fn test_import_then_place_end_to_end() {
    let registry = registry(0);
    let bus = Arc::new(ProgressBus::default());
    let mut events = bus.subscribe();
    let mut config = MontageConfig::default();
    config.executor = fast_executor();
    let orch = orchestrator(&import_and_place("track_main"), registry, config)
        .with_observer(bus.clone());
    let ctx = EditingContext::new()
        .with_session("editor-1")
        .with_track("track_main");

    let outcome = orch
        .run("add the b-roll", &ctx, &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.success());
    assert_eq!(outcome.iterations, 1);
    let place = outcome.result.completed("place").unwrap();
    assert_eq!(place.args["assetId"], "asset_new");
    assert_eq!(place.result.data, Some(json!({"clipId": "clip_9"})));
    assert!(!orch.is_active("editor-1"));

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen.first(), Some(ProgressEvent::Started { total_steps: 2 })));
    assert!(matches!(
        seen.last(),
        Some(ProgressEvent::Completed { success: true, .. })
    ));
}

#[tokio::test]
async fn test_placeholder_track_is_rejected_before_execution() {
    let registry = registry(0);
    let orch = orchestrator(&import_and_place("video1"), registry, MontageConfig::default());

    let err = orch
        .run_cycle("add the b-roll", &EditingContext::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "PLAN_VALIDATION_FAILED");
    assert!(err.to_string().contains("video1"));
}

#[tokio::test]
async fn test_unknown_context_track_is_rejected() {
    let registry = registry(0);
    let orch = orchestrator(&import_and_place("track_old"), registry, MontageConfig::default());
    let ctx = EditingContext::new().with_track("track_main");

    let err = orch
        .run_cycle("add the b-roll", &ctx, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "PLAN_VALIDATION_FAILED");
    assert!(err.to_string().contains("track_old"));
}

#[tokio::test]
async fn test_network_blip_is_retried_through_runner() {
    let registry = registry(1);
    let runner = Arc::new(ToolRunner::with_defaults(registry));
    let executor = PlanExecutor::new(runner, fast_executor());
    let plan = Plan::new("Preview").with_step(
        PlanStep::new("preview", "render_preview").with_description("Render the preview"),
    );

    let result = executor
        .execute(&plan, &EditingContext::new(), &CancellationToken::new(), None)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.tool_calls_used, 2);
    assert_eq!(result.completed("preview").unwrap().retry_count, 1);
}

#[test]
fn test_configured_without_retries() {
    let config = MontageConfig::from_toml(
        r#"
        [executor]
        max_retries = 0
        retry_initial_delay_ms = 1
        "#,
    )
    .unwrap();
    let runner = Arc::new(ToolRunner::with_defaults(registry(1)));
    let executor = PlanExecutor::new(runner, config.executor);
    let plan = Plan::new("Preview").with_step(
        PlanStep::new("preview", "render_preview").with_description("Render the preview"),
    );

    let result = tokio_test::block_on(executor.execute(
        &plan,
        &EditingContext::new(),
        &CancellationToken::new(),
        None,
    ))
    .unwrap();

    assert!(!result.success);
    assert_eq!(result.tool_calls_used, 1);
    let record = result.failed("preview").unwrap();
    assert_eq!(record.retry_count, 0);
    assert_eq!(record.error(), Some("connection reset by peer"));
}
