//! Common setup and the long-running command bodies.

use crate::error::CliError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskmesh::config::{ConfigFile, WorkerMode};
use taskmesh::generator::TaskGenerator;
use taskmesh::log::{Logger, TracingLogger};
use taskmesh::logging::{default_log_dir, default_log_file, init_logging, LoggingGuard};
use taskmesh::server::{ServerConfig, TransportServer};
use taskmesh::skills::{register_builtin_skills, SkillRegistry};
use taskmesh::worker::WorkerController;
use tracing::info;

/// Refill the pool once it drops below this many tasks.
const POOL_LOW_THRESHOLD: usize = 10;

/// How many tasks each refill adds.
const REFILL_AMOUNT: u32 = 100;

/// How often the manager checks the pool level.
const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Shared setup for all commands: logging, config, skill registration.
pub struct CliRunner {
    config: ConfigFile,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Initialize logging and load configuration.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, CliError> {
        let logging = init_logging(default_log_dir(), default_log_file())?;

        let config = match config_path {
            Some(path) => ConfigFile::load_from(&path)?,
            None => ConfigFile::load()?,
        };

        register_builtin_skills();
        SkillRegistry::global().set_logger(Arc::new(TracingLogger));

        Ok(Self {
            config,
            _logging: logging,
        })
    }

    /// Run the manager until Ctrl-C: serve workers, keep the pool topped up.
    pub fn run_manager(
        &self,
        host: Option<String>,
        port: Option<u16>,
        io_threads: Option<usize>,
    ) -> Result<(), CliError> {
        let logger: Arc<dyn Logger> = Arc::new(TracingLogger);

        let mut server_config: ServerConfig = self.config.clone().into();
        if let Some(host) = host {
            server_config.listen_host = host;
        }
        if let Some(port) = port {
            server_config.listen_port = port;
        }
        if let Some(threads) = io_threads {
            server_config.io_threads = taskmesh::config::clamp_io_threads(threads);
        }

        info!("TaskMesh manager starting (v{})", taskmesh::VERSION);
        let server = TransportServer::new(server_config, logger);
        server
            .start()
            .map_err(|e| CliError::Server(e.to_string()))?;

        let shutdown = install_shutdown_flag()?;

        let generator = TaskGenerator::new();
        info!("Generating initial batch of {REFILL_AMOUNT} tasks");
        server.enqueue_tasks(generator.make_tasks(REFILL_AMOUNT));

        // Top the pool up whenever it runs low, until Ctrl-C.
        while !shutdown.load(Ordering::Relaxed) {
            let (pool_size, waiting) = server.task_pool_stats();
            if pool_size < POOL_LOW_THRESHOLD {
                info!(
                    "Task pool low ({pool_size} tasks, {waiting} waiting sessions), \
                     generating {REFILL_AMOUNT} more"
                );
                server.enqueue_tasks(generator.make_tasks(REFILL_AMOUNT));
            }
            std::thread::sleep(MONITOR_INTERVAL);
        }

        info!("Shutting down manager...");
        generator.stop();
        server.log_transport_statistics();
        server.stop();
        info!("Manager shut down successfully");
        Ok(())
    }

    /// Run a worker until Ctrl-C: connect to the manager and process tasks.
    pub fn run_worker(
        &self,
        host: Option<String>,
        port: Option<u16>,
        mode: Option<WorkerMode>,
    ) -> Result<(), CliError> {
        let logger: Arc<dyn Logger> = Arc::new(TracingLogger);

        let host = host.unwrap_or_else(|| self.config.worker.manager_host.clone());
        let port = port.unwrap_or(self.config.worker.manager_port);
        let mode = mode.unwrap_or(self.config.worker.mode);

        info!(
            "TaskMesh worker starting (v{}), manager={}:{}, mode={}",
            taskmesh::VERSION,
            host,
            port,
            mode.as_str()
        );

        let controller = Arc::new(WorkerController::new(
            mode,
            &host,
            port,
            self.config.protocol.max_frame_size,
            logger,
        ));

        {
            let controller = controller.clone();
            ctrlc::set_handler(move || controller.shutdown())
                .map_err(|e| CliError::Signal(e.to_string()))?;
        }

        controller.run();
        info!(
            "Worker shut down (completed {} tasks, sent {}, received {})",
            controller.task_count(),
            controller.bytes_sent_display(),
            controller.bytes_received_display()
        );
        Ok(())
    }
}

fn install_shutdown_flag() -> Result<Arc<AtomicBool>, CliError> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::Relaxed))
        .map_err(|e| CliError::Signal(e.to_string()))?;
    Ok(flag)
}
