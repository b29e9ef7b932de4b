//! Restarting the bridging service
//!
//! The bridging service reads the structural records at start-up, so any
//! change to them is only live after a restart.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::config::ServiceConfig;
use crate::error::{SubordinatesError, SubordinatesResult};

#[async_trait]
pub trait ServiceRestarter: Send + Sync {
    async fn restart(&self) -> SubordinatesResult<()>;
}

/// Restarts the service by running an external command (an init script)
#[derive(Debug, Clone)]
pub struct CommandRestarter {
    service: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRestarter {
    pub fn new(
        service: impl Into<String>,
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            service: service.into(),
            program: program.into(),
            args,
            timeout,
        }
    }

    /// `None` when the configured command is empty
    pub fn from_config(config: &ServiceConfig) -> Option<Self> {
        let (program, args) = config.restart_command.split_first()?;
        Some(Self::new(
            config.name.clone(),
            program.clone(),
            args.to_vec(),
            config.restart_timeout,
        ))
    }
}

#[async_trait]
impl ServiceRestarter for CommandRestarter {
    #[instrument(skip(self), fields(service = %self.service))]
    async fn restart(&self) -> SubordinatesResult<()> {
        debug!("Running {} {}", self.program, self.args.join(" "));

        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| {
                SubordinatesError::restart(
                    &self.service,
                    format!("timed out after {:?}", self.timeout),
                )
            })?
            .map_err(|e| SubordinatesError::restart(&self.service, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SubordinatesError::restart(
                &self.service,
                format!("{}: {}", output.status, stderr.trim()),
            ));
        }

        info!(service = %self.service, "Service restarted");
        Ok(())
    }
}

/// Used when restarts are disabled in configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRestarter;

#[async_trait]
impl ServiceRestarter for NoopRestarter {
    async fn restart(&self) -> SubordinatesResult<()> {
        debug!("Service restart disabled");
        Ok(())
    }
}
