//! Portal binary - composition root.
//!
//! 1. Load configuration from TOML
//! 2. Install the tracing subscriber
//! 3. Build the logger, metrics sink and service gateway
//! 4. Run one subcommand against the gateway

mod cli;

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use portal_chat::ConversationalSessionClient;
use portal_core::{PortalConfig, RuntimeProfile};
use portal_gateway::{Credentials, RegionResolver, ServiceBackends, ServiceGateway};
use portal_observe::{LoggerPatch, MemoryMetricsBackend, MetricsSink, StructuredLogger, TracingSink};
use portal_upload::{DocumentUploadPipeline, UploadFile, UploadOutcome, UploadRequest};

use cli::{CliArgs, Command, QueueCommand};

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "csv" => "text/csv",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

fn build_gateway(config: &PortalConfig, profile: RuntimeProfile) -> Arc<ServiceGateway> {
    let console = Arc::new(TracingSink);
    let metrics = Arc::new(MetricsSink::new(
        profile,
        Arc::new(MemoryMetricsBackend::new()),
        console.clone(),
        Duration::from_millis(config.gateway.metrics_timeout_ms),
    ));
    let logger = Arc::new(StructuredLogger::new(
        profile,
        config.logging.metrics_namespace.clone(),
        console,
        metrics,
    ));
    logger.configure(LoggerPatch {
        min_severity: Some(config.min_severity(profile)),
        console: Some(config.logging.console),
        metrics: Some(config.logging.metrics),
    });

    let credentials = Credentials::from_env();
    if credentials.is_none() {
        tracing::info!(
            environment = profile.as_str(),
            "No service credentials in the environment"
        );
    }

    let gateway = ServiceGateway::new(
        profile,
        &config.gateway,
        credentials,
        ServiceBackends::in_memory(),
        logger,
    )
    .with_regions(RegionResolver::from_env(&config.gateway.region));
    tracing::info!(
        region = gateway.regions().active(),
        mock = gateway.is_mock_mode(),
        "Service gateway ready"
    );
    Arc::new(gateway)
}

async fn run_upload(
    config: &PortalConfig,
    gateway: Arc<ServiceGateway>,
    files: Vec<std::path::PathBuf>,
    bucket: Option<String>,
    prefix: Option<String>,
    max_size_mb: Option<f64>,
    user: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut request = UploadRequest::from_config(&config.upload);
    if let Some(bucket) = bucket {
        request.bucket = bucket;
    }
    if let Some(prefix) = prefix {
        request.folder_prefix = prefix;
    }
    if let Some(max) = max_size_mb {
        request.max_size_mb = max;
    }
    request.user_id = user;

    let mut uploads = Vec::with_capacity(files.len());
    for path in &files {
        let content = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        uploads.push(UploadFile::new(name, mime_for(path), content));
    }

    let pipeline = DocumentUploadPipeline::new(Arc::clone(&gateway), Arc::clone(gateway.logger()));
    let report = pipeline
        .upload_batch(&request, uploads, |item, progress| {
            let status = match &item.outcome {
                UploadOutcome::Uploaded { url } => format!("uploaded {}", url),
                UploadOutcome::Rejected(reason) => format!("rejected ({})", reason),
                UploadOutcome::Failed(err) => format!("failed ({})", err.user_message()),
                UploadOutcome::Pending => "pending".to_string(),
            };
            println!("[{:>5.1}%] {}: {}", progress.percent, item.file_name, status);
        })
        .await?;

    println!(
        "{} uploaded, {} rejected, {} failed",
        report.uploaded(),
        report.rejected(),
        report.failed()
    );
    Ok(())
}

async fn run_chat(
    config: &PortalConfig,
    gateway: Arc<ServiceGateway>,
    messages: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = ConversationalSessionClient::new(gateway, config.chat.clone());
    tracing::info!(session_id = %client.session().session_id, "Chat session open");

    let lines: Vec<String> = if messages.is_empty() {
        std::io::stdin().lock().lines().collect::<Result<_, _>>()?
    } else {
        messages
    };

    for line in lines {
        match client.send_message(&line).await {
            Ok(exchange) => {
                for reply in exchange.replies {
                    println!("bot> {}", reply.text);
                }
            }
            Err(err) => tracing::debug!(error = %err, "Message skipped"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let config = PortalConfig::load_or_default(&config_file);

    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    tracing::info!("Starting portal v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let profile = args
        .environment
        .as_deref()
        .map(RuntimeProfile::from_name)
        .unwrap_or_else(|| config.runtime_profile());
    let gateway = build_gateway(&config, profile);

    match args.command {
        Command::Upload {
            files,
            bucket,
            prefix,
            max_size_mb,
            user,
        } => run_upload(&config, gateway, files, bucket, prefix, max_size_mb, user).await?,
        Command::Chat { messages } => run_chat(&config, gateway, messages).await?,
        Command::Translate { text, from, to } => {
            let translation = gateway.translate(&text, &from, &to).await?;
            println!("{}", translation.text);
        }
        Command::SignedUrl {
            bucket,
            key,
            expiry,
        } => {
            let signed = gateway.signed_url(&bucket, &key, expiry).await?;
            println!("{} (expires {})", signed.url, signed.expires_at.to_rfc3339());
        }
        Command::Queue(QueueCommand::Send { queue_url, body }) => {
            let sent = gateway.send_to_queue(&queue_url, &body).await?;
            println!("{}", sent.message_id);
        }
        Command::Queue(QueueCommand::Receive {
            queue_url,
            max,
            wait,
        }) => {
            let messages = gateway.receive_from_queue(&queue_url, max, wait).await?;
            for message in &messages {
                println!("{}", serde_json::json!({ "id": message.message_id, "body": message.body }));
                gateway
                    .delete_from_queue(&queue_url, &message.receipt_handle)
                    .await?;
            }
            if messages.is_empty() {
                tracing::info!(queue = %queue_url, "No messages");
            }
        }
    }

    Ok(())
}
