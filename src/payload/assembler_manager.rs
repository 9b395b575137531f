//! Routes inbound frames to descriptor assemblers and content streams.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    PayloadStream,
    ReceiveAssembler,
    RequestPayload,
    ResponsePayload,
    StreamDescription,
    StreamManager,
};
use crate::{
    header::{Header, PayloadType},
    message::{ContentStream, ReceiveRequest, ReceiveResponse},
    transport::ReceiveSubscription,
};

/// Invoked with each fully received request.
pub type RequestCallback = Arc<dyn Fn(Uuid, ReceiveRequest) + Send + Sync>;
/// Invoked with each fully received response.
pub type ResponseCallback = Arc<dyn Fn(Uuid, ReceiveResponse) + Send + Sync>;

/// Turns the inbound frame sequence into [`ReceiveRequest`]s and
/// [`ReceiveResponse`]s.
///
/// `Stream` frames are handed to the [`StreamManager`]. `Request` and
/// `Response` frames are buffered per id until `end`, then the descriptor is
/// parsed, the streams it lists are registered with their declared metadata
/// and the message is passed to its callback. Cancel frames retire streams
/// the peer no longer sends.
pub struct PayloadAssemblerManager {
    stream_manager: StreamManager,
    active: DashMap<Uuid, Arc<ReceiveAssembler>>,
    on_request: RequestCallback,
    on_response: ResponseCallback,
}

impl PayloadAssemblerManager {
    /// Build a manager delivering into `on_request` and `on_response`.
    #[must_use]
    pub fn new(
        stream_manager: StreamManager,
        on_request: RequestCallback,
        on_response: ResponseCallback,
    ) -> Self {
        Self {
            stream_manager,
            active: DashMap::new(),
            on_request,
            on_response,
        }
    }

    /// Subscription wiring a [`PayloadReceiver`](crate::transport::PayloadReceiver)
    /// to this manager.
    #[must_use]
    pub fn subscription(self: &Arc<Self>) -> ReceiveSubscription {
        let lookup = Arc::clone(self);
        let deliver = Arc::clone(self);
        ReceiveSubscription {
            get_stream: Box::new(move |header: &Header| lookup.get_payload_stream(header)),
            receive_action: Box::new(move |header: &Header, _: Option<&PayloadStream>, payload: Bytes| {
                deliver.on_receive(header, payload);
            }),
        }
    }

    /// Stream the payload of `header` belongs to, creating its assembler on
    /// first sight. Cancel frames have none.
    #[must_use]
    pub fn get_payload_stream(&self, header: &Header) -> Option<PayloadStream> {
        match header.payload_type {
            PayloadType::Stream => self.stream_manager.get_payload_stream(header),
            PayloadType::Request | PayloadType::Response => {
                Some(self.assembler_for(header).stream().clone())
            }
            PayloadType::CancelAll | PayloadType::CancelStream => None,
        }
    }

    /// Apply one frame.
    pub fn on_receive(&self, header: &Header, payload: Bytes) {
        match header.payload_type {
            PayloadType::Stream => self.stream_manager.on_receive(header, payload),
            PayloadType::CancelStream => self.stream_manager.abandon_stream(header.id),
            PayloadType::CancelAll => {
                debug!(id = %header.id, "peer cancelled all streams");
                self.stream_manager.abandon_all();
                self.active.clear();
            }
            PayloadType::Request | PayloadType::Response => {
                let assembler = self.assembler_for(header);
                if let Some(body) = assembler.on_receive(header, payload) {
                    self.active.remove(&header.id);
                    self.complete(header, &body);
                }
            }
        }
    }

    /// Number of descriptors still being assembled.
    #[must_use]
    pub fn active_len(&self) -> usize { self.active.len() }

    fn assembler_for(&self, header: &Header) -> Arc<ReceiveAssembler> {
        self.active
            .entry(header.id)
            .or_insert_with(|| Arc::new(ReceiveAssembler::new(header.id, header.payload_type)))
            .clone()
    }

    fn complete(&self, header: &Header, body: &[u8]) {
        let id = header.id;
        match header.payload_type {
            PayloadType::Request => {
                let Some(payload) = parse::<RequestPayload>(id, body) else {
                    return;
                };
                let Some(streams) = self.register_streams(id, &payload.streams) else {
                    return;
                };
                debug!(%id, verb = %payload.verb, path = %payload.path, "request received");
                (self.on_request)(
                    id,
                    ReceiveRequest {
                        verb: payload.verb,
                        path: payload.path,
                        streams,
                    },
                );
            }
            PayloadType::Response => {
                let Some(payload) = parse::<ResponsePayload>(id, body) else {
                    return;
                };
                let Some(streams) = self.register_streams(id, &payload.streams) else {
                    return;
                };
                debug!(%id, status = payload.status_code, "response received");
                (self.on_response)(
                    id,
                    ReceiveResponse {
                        status_code: payload.status_code,
                        streams,
                    },
                );
            }
            PayloadType::Stream | PayloadType::CancelAll | PayloadType::CancelStream => {}
        }
    }

    fn register_streams(
        &self,
        id: Uuid,
        descriptions: &[StreamDescription],
    ) -> Option<Vec<ContentStream>> {
        let ids = descriptions
            .iter()
            .map(|d| Uuid::try_parse(&d.id))
            .collect::<Result<Vec<_>, _>>();
        let ids = match ids {
            Ok(ids) => ids,
            Err(e) => {
                warn!(%id, error = %e, "dropping message with invalid stream id");
                return None;
            }
        };
        let streams = ids
            .into_iter()
            .zip(descriptions)
            .map(|(stream_id, description)| {
                let assembler = self.stream_manager.get_payload_assembler(stream_id);
                assembler.set_metadata(description.content_type.clone(), description.length);
                ContentStream::new(assembler)
            })
            .collect();
        Some(streams)
    }
}

fn parse<T: DeserializeOwned>(id: Uuid, body: &[u8]) -> Option<T> {
    match serde_json::from_slice(body) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!(%id, error = %e, "dropping message with invalid descriptor");
            None
        }
    }
}
