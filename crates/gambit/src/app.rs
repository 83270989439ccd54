//! Main application logic and lifecycle management.
//!
//! This module contains the core `Application` struct that orchestrates
//! server startup, monitoring, and shutdown.

use crate::{cli::CliArgs, config::AppConfig, logging::display_banner, signals};
use session_server::SessionServer;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Main application struct.
///
/// The `Application` struct manages the complete lifecycle of the Gambit
/// server, including configuration loading, server initialization, and
/// graceful shutdown handling.
///
/// # Architecture
///
/// * **Configuration Management**: loads and validates configuration from
///   files and CLI
/// * **Server Orchestration**: initializes and manages the session server
/// * **Graceful Shutdown**: handles termination signals and cleanup
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Session server instance
    server: Arc<SessionServer>,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// Loads configuration, applies CLI overrides, validates settings, and
    /// initializes the session server.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Initialize session server with configuration
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!(
            "🔧 Loading configuration from: {}",
            args.config_path.display()
        );
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Apply CLI overrides
        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Some(base_time) = args.base_time {
            config.server.default_base_time = base_time;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let server_config = config.to_server_config()?;
        let server = Arc::new(SessionServer::new(server_config));

        info!(
            "📂 Config: {} | Default clock: {}s",
            args.config_path.display(),
            config.server.default_base_time
        );

        Ok(Self { config, server })
    }

    /// Runs the application until a shutdown signal arrives.
    ///
    /// Starts the server in the background, waits for a termination signal,
    /// then shuts the server down and waits for its task to complete.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Gambit Session Server");
        self.log_configuration_summary();

        let server = self.server.clone();
        let server_handle = tokio::spawn(async move {
            match server.start().await {
                Ok(()) => {
                    info!("✅ Server completed successfully");
                }
                Err(e) => {
                    error!("❌ Server error: {:?}", e);
                    std::process::exit(1);
                }
            }
        });

        info!("✅ Gambit Server is now running!");
        info!(
            "🎮 Ready to accept connections on {}",
            self.config.server.bind_address
        );
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        // Wait for shutdown signal
        signals::wait_for_shutdown_signal().await?;

        // A second signal forces an immediate exit.
        tokio::spawn(async move {
            if let Err(e) = signals::wait_for_shutdown_signal_silent().await {
                error!("Failed to set up forced shutdown signal handler: {e}");
                return;
            }
            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        info!("🛑 Shutdown signal received, beginning graceful shutdown...");
        self.server.shutdown().await?;

        if let Err(e) =
            tokio::time::timeout(tokio::time::Duration::from_secs(8), server_handle).await
        {
            warn!(
                "⏰ Server task did not complete within timeout, proceeding with cleanup: {:?}",
                e
            );
        } else {
            info!("✅ Server task completed gracefully");
        }

        info!("✅ Gambit Session Server shutdown complete");
        Ok(())
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!(
            "  👥 Max connections: {}",
            self.config.server.max_connections
        );
        info!(
            "  ⏱️ Default clock allotment: {}s per side",
            self.config.server.default_base_time
        );
    }
}
