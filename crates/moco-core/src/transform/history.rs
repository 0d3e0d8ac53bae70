use crate::error::{MocoError, Result};

use super::VolumeTransform;

/// Append-only transform sequence for one volume, one entry per completed
/// iteration. The last entry is the most recent incremental alignment;
/// [`TransformHistory::composed`] yields the full moving-to-template
/// transform.
#[derive(Clone, Debug)]
pub struct TransformHistory {
    volume: usize,
    entries: Vec<VolumeTransform>,
}

impl TransformHistory {
    pub fn new(volume: usize) -> Self {
        Self {
            volume,
            entries: Vec::new(),
        }
    }

    pub fn volume(&self) -> usize {
        self.volume
    }

    pub fn push(&mut self, transform: VolumeTransform) {
        self.entries.push(transform);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[VolumeTransform] {
        &self.entries
    }

    /// The current best alignment increment (last completed iteration).
    pub fn current(&self) -> Option<&VolumeTransform> {
        self.entries.last()
    }

    /// Compose all entries in iteration order: entry 0 is applied first.
    pub fn composed(&self) -> Result<VolumeTransform> {
        let mut iter = self.entries.iter();
        let first = iter.next().ok_or(MocoError::EmptySequence)?;
        let mut acc = first.clone();
        for t in iter {
            acc = t.compose(&acc);
        }
        Ok(acc)
    }

    /// Composed prefixes: the cumulative alignment after each iteration.
    pub fn composed_prefixes(&self) -> Vec<VolumeTransform> {
        let mut out = Vec::with_capacity(self.entries.len());
        let mut acc: Option<VolumeTransform> = None;
        for t in &self.entries {
            let next = match &acc {
                Some(prev) => t.compose(prev),
                None => t.clone(),
            };
            out.push(next.clone());
            acc = Some(next);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn composed_applies_in_iteration_order() {
        let mut history = TransformHistory::new(3);
        history.push(VolumeTransform::from_translation(
            Vector3::new(1.0, 0.0, 0.0),
            0,
        ));
        history.push(VolumeTransform::from_translation(
            Vector3::new(0.5, 2.0, 0.0),
            1,
        ));

        let composed = history.composed().unwrap();
        assert_relative_eq!(composed.translation().x, 1.5, epsilon = 1e-12);
        assert_relative_eq!(composed.translation().y, 2.0, epsilon = 1e-12);
        assert_eq!(history.volume(), 3);
        assert_eq!(history.composed_prefixes().len(), 2);
    }

    #[test]
    fn composed_of_empty_fails() {
        let history = TransformHistory::new(0);
        assert!(history.composed().is_err());
        assert!(history.current().is_none());
    }
}
