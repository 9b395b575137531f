//! Payload assembly and disassembly.
//!
//! Outbound messages are cut into frames by the [`disassembler`]s driven
//! from [`SendOperations`]. Inbound frames are routed by the
//! [`PayloadAssemblerManager`]: descriptor frames are rebuilt into messages
//! and content frames flow through the [`StreamManager`] into
//! [`PayloadStream`]s. The [`RequestManager`] pairs responses with the
//! requests awaiting them.

mod assembler;
pub mod assembler_manager;
pub mod disassembler;
mod models;
mod receive_assembler;
pub mod request_manager;
pub mod send_operations;
mod stream;
pub mod stream_manager;

pub use assembler::PayloadStreamAssembler;
pub use assembler_manager::{PayloadAssemblerManager, RequestCallback, ResponseCallback};
pub use disassembler::{
    CancelDisassembler,
    PayloadDisassembler,
    RequestDisassembler,
    ResponseDisassembler,
    ResponseMessageStreamDisassembler,
};
pub use models::{RequestPayload, ResponsePayload, StreamDescription};
pub use receive_assembler::ReceiveAssembler;
pub use request_manager::RequestManager;
pub use send_operations::SendOperations;
pub use stream::PayloadStream;
pub use stream_manager::{CancelStreamHook, StreamManager};
