//! TaskMesh - task dispatch over framed TCP
//!
//! A long-lived manager process distributes typed work units ("tasks") to a
//! fleet of worker processes over persistent connections and collects their
//! responses. Failed exchanges put the task back into the shared pool so no
//! work is silently lost.
//!
//! # High-Level API
//!
//! The manager side boots a [`server::TransportServer`] and feeds it tasks:
//!
//! ```ignore
//! use taskmesh::config::ConfigFile;
//! use taskmesh::generator::TaskGenerator;
//! use taskmesh::server::TransportServer;
//! use taskmesh::skills::register_builtin_skills;
//!
//! register_builtin_skills();
//! let config = ConfigFile::load().unwrap_or_default();
//! let server = TransportServer::new(config.into(), logger);
//! server.start()?;
//! server.enqueue_tasks(TaskGenerator::new().make_tasks(100));
//! ```
//!
//! The worker side mirrors it with [`worker::WorkerController`], which
//! connects to the manager, reads framed tasks, dispatches them through the
//! [`skills::SkillRegistry`], and writes framed responses back.

pub mod config;
pub mod generator;
pub mod io;
pub mod log;
pub mod logging;
pub mod message;
pub mod net;
pub mod pool;
pub mod server;
pub mod session;
pub mod skills;
pub mod wire;
pub mod worker;

/// Version of the TaskMesh library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
