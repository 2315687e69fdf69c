//! Legacy one-shot render path: a single blocking round trip, no job id, no
//! polling. Kept for parity with the asynchronous controller's caller-facing
//! contract: at most one render in flight, affordances re-enabled on every
//! outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use shared::domain::{RenderArtifact, RenderParameters};

use crate::transport::{RenderBackend, TransportError};

#[derive(Debug, Error)]
pub enum SyncRenderError {
    #[error("a synchronous render is already in flight")]
    Busy,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub struct SyncRenderController {
    backend: Arc<dyn RenderBackend>,
    in_flight: AtomicBool,
}

impl SyncRenderController {
    pub fn new(backend: Arc<dyn RenderBackend>) -> Self {
        Self {
            backend,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn render(
        &self,
        params: &RenderParameters,
    ) -> Result<RenderArtifact, SyncRenderError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncRenderError::Busy);
        }
        // Clears even if the caller drops this future mid-flight.
        let _guard = InFlightGuard(&self.in_flight);

        match self.backend.render_sync(params).await {
            Ok(artifact) => {
                info!(
                    bytes = artifact.bytes.len(),
                    content_type = %artifact.content_type,
                    "synchronous render completed"
                );
                Ok(artifact)
            }
            Err(err) => {
                warn!("synchronous render failed: {err}");
                Err(err.into())
            }
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
