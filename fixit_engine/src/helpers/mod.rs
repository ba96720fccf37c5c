mod descriptor;
mod ids;

pub use descriptor::{Descriptor, DescriptorKind};
pub use ids::{is_object_id, new_object_id};
