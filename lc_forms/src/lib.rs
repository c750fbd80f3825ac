pub mod binding;
pub mod error;
pub mod export;
pub mod normalize;
pub mod registry;
pub mod render;
pub mod schema;
pub mod submission;
pub mod traits;
pub mod validation;

pub use binding::*;
pub use error::*;
pub use normalize::*;
pub use registry::*;
pub use schema::*;
pub use submission::*;
pub use traits::*;
pub use validation::{message_for, validate, Validator};
