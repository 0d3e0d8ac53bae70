use crate::error::{MocoError, Result};
use crate::transform::VolumeTransform;

/// Assign every volume the template transform of its nearest b0.
///
/// `b0_indices` are acquisition indices of the b0 volumes, paired 1:1 with
/// `b0_transforms`. Each diffusion-weighted volume starts from the transform
/// of the b0 closest in acquisition order; ties go to the earlier b0.
pub fn nearest_b0_transforms(
    volume_count: usize,
    b0_indices: &[usize],
    b0_transforms: &[VolumeTransform],
) -> Result<Vec<VolumeTransform>> {
    if b0_indices.is_empty() {
        return Err(MocoError::InvalidConfiguration(
            "series contains no b0 volumes to initialize from".to_string(),
        ));
    }
    if b0_indices.len() != b0_transforms.len() {
        return Err(MocoError::InvalidConfiguration(format!(
            "{} b0 indices but {} b0 transforms",
            b0_indices.len(),
            b0_transforms.len()
        )));
    }

    let matched = (0..volume_count)
        .map(|i| {
            let nearest = b0_indices
                .iter()
                .enumerate()
                .min_by_key(|(_, &b)| (i.abs_diff(b), b))
                .map(|(pos, _)| pos)
                .expect("b0_indices checked non-empty");
            b0_transforms[nearest].clone()
        })
        .collect();

    Ok(matched)
}
