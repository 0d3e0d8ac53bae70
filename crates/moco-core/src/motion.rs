//! Motion summarization: the per-volume confound table reported downstream.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::Result;
use crate::transform::{decompose, TransformHistory};
use crate::volume::{MotionRecord, OutlierFlag};

/// Confound-table column names, in output order.
pub const CONFOUND_COLUMNS: [&str; 13] = [
    "scaleX", "scaleY", "scaleZ", "shearXY", "shearXZ", "shearYZ", "rotateX", "rotateY",
    "rotateZ", "shiftX", "shiftY", "shiftZ", "outlier",
];

/// One confound-table row: motion parameters and outlier decision for a
/// volume's final alignment.
#[derive(Clone, Debug)]
pub struct ConfoundRecord {
    pub volume: usize,
    pub motion: MotionRecord,
    pub outlier: OutlierFlag,
}

/// Render the confound table as CSV, one row per volume in acquisition
/// order. Rotations are degrees, shifts millimeters.
pub fn confound_csv(records: &[ConfoundRecord]) -> String {
    let mut out = String::new();
    out.push_str(&CONFOUND_COLUMNS.join(","));
    out.push('\n');
    for record in records {
        for value in record.motion.as_row() {
            let _ = write!(out, "{value},");
        }
        let _ = writeln!(out, "{}", record.outlier.flagged);
    }
    out
}

/// Write the confound table to disk.
pub fn write_confounds<P: AsRef<Path>>(path: P, records: &[ConfoundRecord]) -> Result<()> {
    std::fs::write(path, confound_csv(records))?;
    Ok(())
}

/// Motion parameters per completed iteration for one volume: each entry is
/// the decomposition of the cumulative alignment after that iteration.
pub fn motion_per_iteration(history: &TransformHistory) -> Result<Vec<MotionRecord>> {
    history
        .composed_prefixes()
        .iter()
        .map(decompose)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::VolumeTransform;
    use nalgebra::Vector3;

    #[test]
    fn csv_has_header_and_one_row_per_volume() {
        let records = vec![
            ConfoundRecord {
                volume: 0,
                motion: MotionRecord::identity(),
                outlier: OutlierFlag::default(),
            },
            ConfoundRecord {
                volume: 1,
                motion: MotionRecord {
                    translation: [1.5, 0.0, 0.0],
                    ..MotionRecord::identity()
                },
                outlier: OutlierFlag {
                    flagged: true,
                    score: 2.4,
                },
            },
        ];

        let csv = confound_csv(&records);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CONFOUND_COLUMNS.join(","));
        assert!(lines[1].ends_with("false"));
        assert!(lines[2].starts_with("1,1,1,0,0,0,0,0,0,1.5,0,0,"));
        assert!(lines[2].ends_with("true"));
    }

    #[test]
    fn per_iteration_motion_is_cumulative() {
        let mut history = TransformHistory::new(0);
        history.push(VolumeTransform::from_translation(
            Vector3::new(1.0, 0.0, 0.0),
            0,
        ));
        history.push(VolumeTransform::from_translation(
            Vector3::new(1.0, 0.0, 0.0),
            1,
        ));

        let motion = motion_per_iteration(&history).unwrap();
        assert_eq!(motion.len(), 2);
        assert_eq!(motion[0].translation[0], 1.0);
        assert_eq!(motion[1].translation[0], 2.0);
    }
}
