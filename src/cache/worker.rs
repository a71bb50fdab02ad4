//! Production worker - runs in separate thread(s)

use std::sync::Arc;

use flume::{Receiver, Sender};
use log::{debug, error};

use super::request::{ProduceRequest, ProduceResponse};
use crate::deck::{DeckSource, Rasterizer};
use crate::error::RasterError;

pub fn production_worker(
    worker_id: usize,
    source: Arc<dyn DeckSource>,
    requests: Receiver<ProduceRequest>,
    responses: Sender<ProduceResponse>,
) {
    debug!("Production worker {worker_id} started");

    let mut rasterizer = match source.open() {
        Ok(r) => Some(r),
        Err(e) => {
            error!("Worker {worker_id} cannot open the document: {e}");
            None
        }
    };

    for request in requests {
        match request {
            ProduceRequest::Produce { id, key } => {
                let response = match rasterizer.as_mut() {
                    Some(r) => produce(r.as_mut(), id, key),
                    // Answer anyway so the key does not stay in flight forever.
                    None => ProduceResponse::Failed {
                        id,
                        key,
                        error: RasterError::generic("document could not be opened"),
                    },
                };
                if responses.send(response).is_err() {
                    break;
                }
            }

            ProduceRequest::Shutdown => break,
        }
    }

    debug!("Production worker {worker_id} stopped");
}

fn produce(
    rasterizer: &mut dyn Rasterizer,
    id: super::RequestId,
    key: super::CacheKey,
) -> ProduceResponse {
    match rasterizer.rasterize(key.page, key.resolution) {
        Ok(mut raster) => {
            raster.index = key.page;
            raster.resolution = key.resolution;
            ProduceResponse::Produced { id, key, raster }
        }
        Err(error) => ProduceResponse::Failed { id, key, error },
    }
}
