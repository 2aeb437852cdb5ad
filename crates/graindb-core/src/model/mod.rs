pub mod entity;
pub mod field;
pub mod registry;
pub mod relation;
pub mod view;

pub use entity::EntityModel;
pub use field::{FieldModel, FieldType};
pub use registry::ModelRegistry;
pub use relation::{KeyMapEntry, RelationKind, RelationModel};
pub use view::{ViewAlias, ViewLink, ViewMember, ViewModel};
