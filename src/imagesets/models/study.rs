use dicom::object::DefaultDicomObject;
use std::fmt;

/// A failure that was tolerated while converting an imageset.
///
/// Attribute and frame failures leave a (possibly incomplete) instance behind,
/// instance failures remove the instance from the study.
#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
    /// An attribute could not be transcoded and was left out of its record.
    AttributeSkipped {
        sop_instance_uid: String,
        key: String,
        reason: String,
    },
    /// A frame could not be fetched or decoded; its bytes are missing from the pixel data.
    FrameSkipped {
        sop_instance_uid: String,
        frame_id: String,
        reason: String,
    },
    /// An instance could not be enumerated and was never processed.
    InstanceSkipped {
        sop_instance_uid: String,
        reason: String,
    },
    /// An instance failed to assemble and is absent from the study.
    InstanceDropped {
        sop_instance_uid: String,
        reason: String,
    },
}

impl Issue {
    pub fn sop_instance_uid(&self) -> &str {
        match self {
            Issue::AttributeSkipped { sop_instance_uid, .. }
            | Issue::FrameSkipped { sop_instance_uid, .. }
            | Issue::InstanceSkipped { sop_instance_uid, .. }
            | Issue::InstanceDropped { sop_instance_uid, .. } => sop_instance_uid,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::AttributeSkipped { sop_instance_uid, key, reason } => {
                write!(f, "{sop_instance_uid}: attribute {key} skipped: {reason}")
            }
            Issue::FrameSkipped { sop_instance_uid, frame_id, reason } => {
                write!(f, "{sop_instance_uid}: frame {frame_id} skipped: {reason}")
            }
            Issue::InstanceSkipped { sop_instance_uid, reason } => {
                write!(f, "{sop_instance_uid}: instance skipped: {reason}")
            }
            Issue::InstanceDropped { sop_instance_uid, reason } => {
                write!(f, "{sop_instance_uid}: instance dropped: {reason}")
            }
        }
    }
}

/// A completed DICOM instance.
#[derive(Debug)]
pub struct DicomizedInstance {
    pub instance_number: i64,
    pub sop_instance_uid: String,
    pub obj: DefaultDicomObject,
}

/// The converted series of an imageset, ordered by instance number.
#[derive(Debug)]
pub struct DicomizedStudy {
    pub series_instance_uid: String,
    pub instances: Vec<DicomizedInstance>,
    pub issues: Vec<Issue>,
}

impl DicomizedStudy {
    /// The instance numbers in output order.
    pub fn instance_numbers(&self) -> Vec<i64> {
        self.instances.iter().map(|i| i.instance_number).collect()
    }

    pub fn skipped_attributes(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| matches!(i, Issue::AttributeSkipped { .. }))
            .count()
    }

    pub fn skipped_frames(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| matches!(i, Issue::FrameSkipped { .. }))
            .count()
    }

    pub fn lost_instances(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| {
                matches!(
                    i,
                    Issue::InstanceSkipped { .. } | Issue::InstanceDropped { .. }
                )
            })
            .count()
    }
}
