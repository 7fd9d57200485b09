//! Device placement.

use burn::prelude::*;

/// Devices a reconstruction runs on.
///
/// The primary device holds the generator parameters and the optimizer
/// state. Replica devices, when present, each evaluate one shard of every
/// mini-batch.
#[derive(Debug, Clone)]
pub struct ExecutionContext<B: Backend> {
    device: B::Device,
    replicas: Vec<B::Device>,
}

impl<B: Backend> ExecutionContext<B> {
    /// Single-device context.
    pub fn new(device: B::Device) -> Self {
        Self {
            device,
            replicas: Vec::new(),
        }
    }

    /// Shard mini-batches over `replicas`.
    pub fn with_replicas(mut self, replicas: Vec<B::Device>) -> Self {
        self.replicas = replicas;
        self
    }

    /// Primary device.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Replica devices (empty when running on the primary device only).
    pub fn replicas(&self) -> &[B::Device] {
        &self.replicas
    }

    /// Whether mini-batches are evaluated on the replica devices.
    ///
    /// A single configured replica still takes the batch off the primary
    /// device.
    pub fn is_parallel(&self) -> bool {
        !self.replicas.is_empty()
    }
}

impl<B: Backend> Default for ExecutionContext<B> {
    fn default() -> Self {
        Self::new(Default::default())
    }
}
