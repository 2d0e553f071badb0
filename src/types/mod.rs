// ABOUTME: Validated domain types shared across the pipeline, publish and deploy layers.
// ABOUTME: Uses phantom types to prevent job and stage name confusion at compile time.

mod environment;
mod image_ref;
mod image_tag;
mod name;
mod resource_name;
mod secret;

pub use environment::{EnvironmentName, ParseEnvironmentError};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use image_tag::{ImageTag, ImageTagError, slugify};
pub use name::{JobName, Name, StageName};
pub use resource_name::{ResourceName, ResourceNameError};
pub use secret::Secret;
