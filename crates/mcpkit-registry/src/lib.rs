//! Thread-safe, insertion-ordered primitive collections and the URI
//! template routing used by `resources/read`.

pub mod collection;
pub mod registry;
pub mod uri_template;

pub use collection::{Collection, Keyed, RegistryError, RegistryResult};
pub use registry::{PromptCollection, ResourceCollection, ResourceMatch, ToolCollection};
pub use uri_template::{UriMatch, UriTemplate, UriTemplateError};
