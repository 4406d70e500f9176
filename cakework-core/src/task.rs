//! Typed task requests
//!
//! Tasks whose parameter schema is known ahead of time get a dedicated
//! request type instead of a [`Parameters`] bag.

use serde::{Deserialize, Serialize};

use crate::domain::parameters::{Parameters, ParametersError};

/// A strongly typed request for a named task
pub trait TaskRequest: Serialize {
    /// Name of the task as registered with the service
    const TASK: &'static str;

    /// Serializes the request into submission parameters
    fn to_parameters(&self) -> Result<Parameters, ParametersError> {
        Parameters::from_serialize(self)
    }
}

/// `say_hello`: greets `name`, returns `"Hello <name>!"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SayHello {
    pub name: String,
}

impl TaskRequest for SayHello {
    const TASK: &'static str = "say_hello";
}

/// `generate_image`: renders `prompt` in the given style
///
/// The result payload is a JSON object holding the `s3Location` of the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateImage {
    pub prompt: String,
    pub style: String,
}

impl TaskRequest for GenerateImage {
    const TASK: &'static str = "generate_image";
}

/// Result payload of `generate_image`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub s3_location: String,
}

impl GeneratedImage {
    /// Public URL of the image under `bucket_url`
    pub fn url(&self, bucket_url: &str) -> String {
        format!(
            "{}/{}",
            bucket_url.trim_end_matches('/'),
            self.s3_location.trim_start_matches('/')
        )
    }
}
