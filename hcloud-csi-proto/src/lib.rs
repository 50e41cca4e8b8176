//! # hcloud-csi Proto
//!
//! Generated Rust code from the protobuf definitions for the volume
//! controller service.
//!
//! This crate contains the gRPC service definition and message types for
//! communication between the orchestrator and the controller daemon. The
//! bindings are committed under `src/generated/` so building does not
//! require `protoc`; regenerate them with `tonic-build` from
//! `proto/controller.proto` when the protocol changes.

// Include generated code
pub mod generated {
    pub mod hcloudcsi {
        pub mod controller {
            pub mod v1 {
                include!("generated/hcloudcsi.controller.v1.rs");
            }
        }
    }
}

// Re-export for convenience
pub use generated::hcloudcsi::controller::v1::*;
pub use generated::hcloudcsi::controller::v1::controller_server::{
    Controller, ControllerServer,
};
pub use generated::hcloudcsi::controller::v1::controller_client::ControllerClient;
