//! Messages exchanged with production workers

use super::key::CacheKey;
use crate::deck::Rasterization;
use crate::error::RasterError;

/// Unique identifier for production requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Request sent to production workers
#[derive(Debug)]
pub enum ProduceRequest {
    /// Rasterize a page at a resolution
    Produce { id: RequestId, key: CacheKey },

    /// Stop the worker
    Shutdown,
}

/// Response from production workers
#[derive(Debug)]
pub enum ProduceResponse {
    Produced {
        id: RequestId,
        key: CacheKey,
        raster: Rasterization,
    },

    Failed {
        id: RequestId,
        key: CacheKey,
        error: RasterError,
    },
}

impl ProduceResponse {
    #[must_use]
    pub fn key(&self) -> CacheKey {
        match self {
            Self::Produced { key, .. } | Self::Failed { key, .. } => *key,
        }
    }

    #[must_use]
    pub fn id(&self) -> RequestId {
        match self {
            Self::Produced { id, .. } | Self::Failed { id, .. } => *id,
        }
    }
}
