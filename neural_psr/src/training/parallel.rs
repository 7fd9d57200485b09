//! Loss evaluation of a mini-batch, sharded over replica devices.

use std::ops::Range;

use burn::module::Module;
use burn::prelude::*;

use crate::data::ScanDataset;
use crate::error::Result;
use crate::lattice::Transport;
use crate::loss::{gaussian_entropy, LossOutput, MentLoss};
use crate::model::ReconstructionModel;
use crate::screen::Screen;

/// Split `0..n` into at most `parts` contiguous, non-empty, near-equal ranges.
pub(crate) fn shard_ranges(n: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, n.max(1));
    let base = n / parts;
    let extra = n % parts;
    let mut start = 0;
    (0..parts)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .filter(|r| !r.is_empty())
        .collect()
}

/// Loss of one mini-batch.
///
/// Without replicas the batch is evaluated on the primary device. With
/// replicas, the entropy term is computed once from the full sample on the
/// primary device, and every replica receives a copy of the generator and
/// the base sample plus one shard of the configurations. The shard image
/// losses are moved back to the primary device and summed, so the loss is
/// the same as on a single device and one backward pass reaches the
/// primary parameters.
pub(crate) fn evaluate_batch<B, T, S>(
    model: &ReconstructionModel<B, T, S>,
    loss: &MentLoss,
    base: Tensor<B, 2>,
    batch: &ScanDataset<B>,
) -> Result<LossOutput<B>>
where
    B: Backend,
    T: Transport<B>,
    S: Screen<B>,
{
    let context = model.context();
    if !context.is_parallel() {
        let output = model.predict(model.generator(), base, batch.settings().clone())?;
        return loss.evaluate(
            output.images,
            batch.images().clone(),
            output.beam.into_coords(),
        );
    }

    let primary = context.device();
    let entropy = gaussian_entropy(model.generator().forward(base.clone()));

    let shards = shard_ranges(batch.len(), context.replicas().len());
    let mut image_losses = Vec::with_capacity(shards.len());
    for (range, device) in shards.into_iter().zip(context.replicas()) {
        let indices: Vec<usize> = range.collect();
        let shard = batch.select(&indices)?.to_device(device);
        let generator = model.generator().clone().to_device(device);
        let output = model.predict(
            &generator,
            base.clone().to_device(device),
            shard.settings().clone(),
        )?;
        let image_loss = loss.image_loss(output.images, shard.images().clone())?;
        image_losses.push(image_loss.to_device(primary));
    }

    let image_loss = Tensor::cat(image_losses, 0).sum();
    Ok(loss.combine(entropy, image_loss))
}
