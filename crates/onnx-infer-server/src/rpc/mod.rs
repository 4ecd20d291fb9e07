//! The binary RPC transport (C7): a single unary `Predict` method over
//! tonic, sharing the orchestrator and error taxonomy with the JSON
//! transport.

pub mod service;

pub mod pb {
    tonic::include_proto!("inference");
}

/// Encoded `FileDescriptorSet` for the inference service, used to register
/// gRPC server reflection when `ENABLE_REFLECTION` is set.
pub const FILE_DESCRIPTOR_SET: &[u8] =
    include_bytes!(concat!(env!("OUT_DIR"), "/inference_descriptor.bin"));

pub use service::InferenceServiceImpl;
