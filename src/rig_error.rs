use std::{error, fmt};

/// Unified error type
///
/// Only construction and configuration-loading paths can fail. The per-frame
/// paths (`Skin::update`, `InverseKinematics::reach_for_point` and friends)
/// degrade to identity transforms instead of returning errors, so none of
/// them use this type.
#[derive(Debug)]
pub enum RigError {
    VertexCountMismatch,
    TooManyBones(usize),
    SerdeYamlError(Box<serde_yaml::Error>),
    StdIoError(std::io::Error),
}

impl error::Error for RigError {}

impl fmt::Display for RigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::VertexCountMismatch => {
                write!(f, "per vertex arrays have different lengths")
            }
            Self::TooManyBones(count) => {
                write!(f, "bone count {count} exceeds the fixed matrix block")
            }
            Self::SerdeYamlError(e) => {
                write!(f, "serde_yaml::Error: {e}")
            }
            Self::StdIoError(e) => write!(f, "std::io::Error: {}", e.kind()),
        }
    }
}

impl From<serde_yaml::Error> for RigError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::SerdeYamlError(Box::new(e))
    }
}

impl From<std::io::Error> for RigError {
    fn from(e: std::io::Error) -> Self {
        Self::StdIoError(e)
    }
}
