//! Mode switch
//!
//! Toggles which daemon runs: the normal-operation service or the hotspot/setup service.
//! Both operations are best-effort; their outcome is [`BestEffort`], which cannot be
//! propagated with `?`.

use crate::command;
use anyhow::Result;
use log::{error, info};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use std::time::Duration;
use trait_variant::make;

/// Outcome of a side effect whose failure is logged, never propagated
#[must_use]
#[derive(Debug)]
pub enum BestEffort {
    Done,
    Failed(anyhow::Error),
}

impl BestEffort {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Log the outcome of `action`
    pub fn log(self, action: &str) {
        match self {
            Self::Done => info!("{action} done"),
            Self::Failed(e) => error!("{action} failed (ignored): {e:#}"),
        }
    }
}

impl From<Result<()>> for BestEffort {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(e) => Self::Failed(e),
        }
    }
}

#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait ModeSwitch {
    async fn enable(&self, service: &str) -> BestEffort;
    async fn disable(&self, service: &str) -> BestEffort;
}

/// Mode switch backed by `systemctl`
#[derive(Clone, Debug)]
pub struct SystemdModeSwitch {
    timeout: Duration,
}

impl SystemdModeSwitch {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn systemctl(&self, verb: &str, service: &str) -> BestEffort {
        command::run("systemctl", &[verb, "--now", service], self.timeout)
            .await
            .map(|_| ())
            .into()
    }
}

impl ModeSwitch for SystemdModeSwitch {
    async fn enable(&self, service: &str) -> BestEffort {
        self.systemctl("enable", service).await
    }

    async fn disable(&self, service: &str) -> BestEffort {
        self.systemctl("disable", service).await
    }
}
