//! Device provisioning gate.
//!
//! Provisioning is owned by the outer onboarding flow; this layer only
//! observes it. The transition is one-way as seen from here: once a gate
//! reports `Provisioned` it never reverts.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{KwError, KwResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    Unprovisioned,
    Provisioned,
}

/// Shared view of the device provisioning state.
///
/// Clones observe the same underlying flag, so the onboarding flow flipping
/// one gate is visible to every store holding a clone.
#[derive(Clone)]
pub struct ProvisioningGate {
    state: Arc<RwLock<ProvisioningState>>,
}

impl ProvisioningGate {
    pub fn unprovisioned() -> Self {
        Self {
            state: Arc::new(RwLock::new(ProvisioningState::Unprovisioned)),
        }
    }

    pub fn provisioned() -> Self {
        Self {
            state: Arc::new(RwLock::new(ProvisioningState::Provisioned)),
        }
    }

    /// Mark the device as provisioned.
    pub fn provision(&self) {
        let mut state = self.state.write();
        if *state != ProvisioningState::Provisioned {
            tracing::info!("device marked provisioned");
            *state = ProvisioningState::Provisioned;
        }
    }

    pub fn state(&self) -> ProvisioningState {
        *self.state.read()
    }

    /// Precondition check for every key-store mutation or query.
    pub fn ensure_provisioned(&self) -> KwResult<()> {
        match self.state() {
            ProvisioningState::Provisioned => Ok(()),
            ProvisioningState::Unprovisioned => {
                tracing::error!("store has not been provisioned");
                Err(KwError::NotProvisioned)
            }
        }
    }
}

impl std::fmt::Debug for ProvisioningGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ProvisioningGate").field(&self.state()).finish()
    }
}
