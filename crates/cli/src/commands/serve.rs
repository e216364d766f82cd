//! `workloom serve` — start the full runtime.
//!
//! Wires the event bus, queue engine, agent worker, and HTTP gateway
//! together, then runs until Ctrl-C. Shutdown drains in-flight jobs
//! within the queue's grace period before the process exits.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use workloom_bus::{SharedBus, WorkflowBus};
use workloom_config::AppConfig;
use workloom_core::model::LanguageModel;
use workloom_providers::OpenAiCompatModel;
use workloom_queue::{QueueConfig, QueueEngine};

use crate::worker::AgentJobProcessor;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let model = build_model(&config)?;

    let bus: SharedBus = Arc::new(WorkflowBus::new(config.bus.capacity));

    let engine = Arc::new(QueueEngine::new());
    engine
        .create_queue(
            QueueConfig::new(&config.queue.name)
                .with_concurrency(config.queue.concurrency)
                .with_max_attempts(config.queue.max_attempts)
                .with_backoff_base(Duration::from_millis(config.queue.backoff_ms))
                .with_shutdown_grace(Duration::from_secs(config.queue.shutdown_grace_secs)),
        )
        .await?;

    let tools = Arc::new(workloom_tools::builtin_registry()?);
    let processor = Arc::new(
        AgentJobProcessor::new(model, &config.model.name, tools, bus.clone())
            .with_temperature(config.model.temperature)
            .with_max_tokens(config.model.max_tokens)
            .with_max_steps(config.agent.max_steps)
            .with_max_attempts(config.queue.max_attempts),
    );
    engine.start_worker(&config.queue.name, processor).await?;

    let state = Arc::new(workloom_gateway::GatewayState {
        bus,
        engine: engine.clone(),
        queue_name: config.queue.name.clone(),
        event_buffer: config.gateway.event_buffer,
        idle_timeout: Duration::from_secs(config.gateway.idle_timeout_secs),
    });

    println!("WorkLoom");
    println!(
        "   Gateway:  {}:{}",
        config.gateway.host, config.gateway.port
    );
    println!(
        "   Queue:    {} (concurrency {})",
        config.queue.name, config.queue.concurrency
    );
    println!("   Model:    {} via {}", config.model.name, config.model.provider);

    let gateway_config = config.gateway.clone();
    tokio::select! {
        result = workloom_gateway::serve(&gateway_config, state) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    engine.shutdown_all().await;
    info!("Runtime stopped");
    Ok(())
}

/// Build the model client the configuration asks for.
fn build_model(config: &AppConfig) -> Result<Arc<dyn LanguageModel>, Box<dyn std::error::Error>> {
    let model = &config.model;
    let client = match model.provider.as_str() {
        "ollama" => OpenAiCompatModel::ollama(model.base_url.as_deref())?,
        provider => {
            let api_key = model
                .api_key
                .clone()
                .ok_or("No API key configured — set WORKLOOM_API_KEY or model.api_key")?;
            match (provider, &model.base_url) {
                (_, Some(base_url)) => OpenAiCompatModel::new(provider, base_url, api_key)?,
                ("openai", None) => OpenAiCompatModel::openai(api_key)?,
                _ => OpenAiCompatModel::openrouter(api_key)?,
            }
        }
    };
    Ok(Arc::new(client))
}
