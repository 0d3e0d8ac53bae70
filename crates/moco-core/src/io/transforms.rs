//! Transform-chain artifact writer.
//!
//! One tab-separated row per (volume, iteration) pair holding the twelve
//! affine entries of the incremental transform, row-major.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::Result;
use crate::transform::TransformHistory;

/// Render every volume's incremental transform chain as TSV.
pub fn transform_table(histories: &[TransformHistory]) -> String {
    let mut out = String::from(
        "volume\titeration\tm00\tm01\tm02\tm03\tm10\tm11\tm12\tm13\tm20\tm21\tm22\tm23\n",
    );
    for history in histories {
        for entry in history.entries() {
            let _ = write!(out, "{}\t{}", history.volume(), entry.iteration);
            for row in 0..3 {
                for col in 0..4 {
                    let _ = write!(out, "\t{}", entry.matrix[(row, col)]);
                }
            }
            out.push('\n');
        }
    }
    out
}

/// Write the transform chains to disk.
pub fn write_transforms<P: AsRef<Path>>(path: P, histories: &[TransformHistory]) -> Result<()> {
    std::fs::write(path, transform_table(histories))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::VolumeTransform;
    use nalgebra::Vector3;

    #[test]
    fn one_row_per_volume_iteration_pair() {
        let mut a = TransformHistory::new(0);
        a.push(VolumeTransform::from_translation(
            Vector3::new(1.0, 0.0, 0.0),
            0,
        ));
        a.push(VolumeTransform::from_translation(
            Vector3::new(0.0, 2.0, 0.0),
            1,
        ));
        let mut b = TransformHistory::new(1);
        b.push(VolumeTransform::from_translation(
            Vector3::new(0.0, 0.0, 3.0),
            0,
        ));

        let table = transform_table(&[a, b]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("volume\titeration"));
        assert!(lines[1].starts_with("0\t0"));
        assert!(lines[2].starts_with("0\t1"));
        assert!(lines[3].starts_with("1\t0"));

        let fields: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(fields.len(), 14);
        assert_eq!(fields[5], "1"); // m03 carries the x translation
        assert_eq!(fields[2], "1"); // m00
    }
}
