//! Face Kiosk CLI
//!
//! Command-line front end for the kiosk workflows: service health,
//! one-shot and continuous recognition, enrollment and the
//! administrative listings.

use clap::{Parser, Subcommand};
use face_kiosk::{
    admin::{AdminEnrollmentFlow, EnrollmentFields, SessionModeCoordinator},
    capture::{Camera, CaptureConfig, CaptureDevice, Frame, MockCamera},
    config::FileConfig,
    metrics::MetricsSnapshot,
    presentation::{LogPresenter, Presenter},
    recognition::{RecognitionOrchestrator, TriggerOutcome},
    service::{HttpRemoteService, RemoteService, DEFAULT_LOG_LIMIT},
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "face-kiosk", version, about = "Face identification kiosk controller")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `service.base_url`.
    #[arg(long, global = true)]
    service_url: Option<String>,

    /// Bearer token for administrative calls.
    #[arg(long, global = true)]
    token: Option<String>,

    /// Use the native camera with this index instead of the mock sensor.
    #[cfg(feature = "camera")]
    #[arg(long, global = true)]
    device: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the recognition service is reachable.
    Health,
    /// Start the camera, run one recognition and stop.
    Recognize,
    /// Recognize continuously from auto-captured frames until Ctrl-C.
    Watch {
        /// Auto-capture period; defaults to `capture.auto_capture_interval_ms`.
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Capture a photo and enroll a new user.
    Enroll {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: u32,
        #[arg(long)]
        profession: String,
    },
    /// List enrolled users.
    Users,
    /// Delete an enrolled user.
    DeleteUser { id: String },
    /// Show the access log, newest first.
    Logs {
        #[arg(long, default_value_t = DEFAULT_LOG_LIMIT)]
        limit: usize,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Face Kiosk v{}", face_kiosk::VERSION);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let service: Arc<dyn RemoteService> = match HttpRemoteService::new(&config.service) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            eprintln!("Failed to create service client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let presenter: Arc<dyn Presenter> = Arc::new(LogPresenter);

    match run(&cli, &config, service, presenter).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<FileConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    if let Some(url) = &cli.service_url {
        config.service.base_url = url.clone();
    }
    if let Some(token) = &cli.token {
        config.service.auth_token = Some(token.clone());
    }
    #[cfg(feature = "camera")]
    if let Some(index) = cli.device {
        config.capture.device_id = index;
        config.admin_capture.device_id = index;
    }
    config.validate()?;
    Ok(config)
}

fn camera(cli: &Cli) -> Box<dyn Camera> {
    #[cfg(feature = "camera")]
    if cli.device.is_some() {
        return Box::new(face_kiosk::capture::NokhwaCamera::new());
    }
    let _ = cli;
    info!("Using mock camera input");
    Box::new(MockCamera::new())
}

fn device(cli: &Cli, name: &str, config: &CaptureConfig) -> CaptureDevice {
    CaptureDevice::new(name, camera(cli), config.clone())
}

async fn run(
    cli: &Cli,
    config: &FileConfig,
    service: Arc<dyn RemoteService>,
    presenter: Arc<dyn Presenter>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let orchestrator = Arc::new(RecognitionOrchestrator::new(
        device(cli, "normal", &config.capture),
        Arc::clone(&service),
        Arc::clone(&presenter),
        config.recognition.clone(),
    ));
    let enrollment = AdminEnrollmentFlow::new(
        device(cli, "admin", &config.admin_capture),
        Arc::clone(&service),
        Arc::clone(&presenter),
    );
    let kiosk = SessionModeCoordinator::new(Arc::clone(&orchestrator), enrollment, service);
    let admin = || {
        kiosk.toggle();
        &kiosk
    };

    match &cli.command {
        Command::Health => {
            let healthy = orchestrator.check_service().await;
            Ok(if healthy { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Recognize => {
            orchestrator.check_service().await;
            orchestrator.start_device()?;
            let outcome = orchestrator.trigger_recognition().await;
            orchestrator.stop_device();

            info!(?outcome, "Recognition finished");
            Ok(match outcome {
                TriggerOutcome::Failed | TriggerOutcome::CaptureFailed => ExitCode::FAILURE,
                _ => ExitCode::SUCCESS,
            })
        }
        Command::Watch { interval_ms } => {
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.capture.auto_capture_interval());
            watch(&kiosk, orchestrator, interval, config.metrics.port).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Enroll {
            name,
            age,
            profession,
        } => {
            let coordinator = admin();
            coordinator.open_enrollment()?;
            coordinator.capture_for_enrollment()?;
            let receipt = coordinator
                .submit_enrollment(EnrollmentFields::new(name.as_str(), *age, profession.as_str()))
                .await;
            coordinator.toggle();

            let receipt = receipt?;
            println!(
                "Enrolled {} (id: {})",
                name,
                receipt.user_id.as_deref().unwrap_or("-")
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Users => {
            let users = admin().list_users().await?;
            if users.is_empty() {
                println!("No users enrolled.");
            }
            for user in users {
                println!(
                    "{:<24} {:<20} {:>4} {}",
                    user.user_id.as_deref().unwrap_or("-"),
                    user.name,
                    user.age.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
                    user.profession.as_deref().unwrap_or("-")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::DeleteUser { id } => {
            let receipt = admin().delete_user(id).await?;
            println!(
                "{}",
                receipt
                    .message
                    .unwrap_or_else(|| format!("User {} deleted.", id))
            );
            Ok(if receipt.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Logs { limit } => {
            let view = admin().open_logs(*limit).await?;
            if let Some(error) = &view.error {
                eprintln!("{}", error);
                return Ok(ExitCode::FAILURE);
            }
            if let Some(notice) = &view.notice {
                println!("{}", notice);
            }
            for row in &view.rows {
                println!("{:<20} {:<16} {:<24} {}", row.date, row.action, row.user, row.result);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn watch(
    kiosk: &SessionModeCoordinator,
    orchestrator: Arc<RecognitionOrchestrator>,
    interval: Duration,
    metrics_port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    orchestrator.check_service().await;
    orchestrator.start_device()?;

    let (stop_tx, mut stop_rx) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;

    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Frame>();
    orchestrator.device().start_auto_capture(interval, move |frame| {
        let _ = frame_tx.send(frame);
    });
    info!(interval_ms = interval.as_millis() as u64, "Watching. Press Ctrl-C to stop.");

    #[cfg(feature = "metrics")]
    let metrics = start_metrics_server(metrics_port).await?;
    #[cfg(not(feature = "metrics"))]
    if metrics_port != 0 {
        warn!("Metrics exporter not compiled in; build with feature `metrics`");
    }

    loop {
        tokio::select! {
            _ = stop_rx.recv() => break,
            frame = frame_rx.recv() => {
                let Some(frame) = frame else { break };
                // Frames arriving while a recognition is in flight are dropped.
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move {
                    orchestrator.submit_frame(frame).await;
                });
            }
        }

        #[cfg(feature = "metrics")]
        if let Some(registry) = &metrics {
            registry.update(&MetricsSnapshot::from_kiosk(kiosk));
        }
    }

    orchestrator.stop_device();
    info!(summary = ?MetricsSnapshot::from_kiosk(kiosk), "Watch stopped");
    Ok(())
}

#[cfg(feature = "metrics")]
async fn start_metrics_server(
    port: u16,
) -> Result<Option<Arc<face_kiosk::metrics::MetricsRegistry>>, Box<dyn std::error::Error>> {
    use face_kiosk::config::MetricsConfig;
    use face_kiosk::metrics::{MetricsRegistry, MetricsServer};

    if port == 0 {
        return Ok(None);
    }
    let registry = Arc::new(MetricsRegistry::new()?);
    let server = MetricsServer::bind(&MetricsConfig { port }, Arc::clone(&registry)).await?;
    tokio::spawn(async move {
        if let Err(e) = server.serve().await {
            warn!("Metrics server stopped: {}", e);
        }
    });
    Ok(Some(registry))
}
