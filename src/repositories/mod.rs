//! C3 — entity repositories. One file per entity, each owning its row↔model
//! mapping over `MetadataStore`, per spec.md §4.3. Sub-resource CRUD (tags,
//! description, label, read_only, bit rates, collection membership) lives as
//! methods on the owning repository rather than as free functions or a
//! separate manager class — the source's duplicate "standalone functions
//! *and* Manager classes" surface is collapsed to one per spec.md §9.

pub mod collection;
pub mod flow;
pub mod flow_delete_request;
pub mod object;
pub mod segment;
pub mod source;

pub use collection::CollectionRepo;
pub use flow::FlowRepo;
pub use flow_delete_request::FlowDeleteRequestRepo;
pub use object::ObjectRepo;
pub use segment::SegmentRepo;
pub use source::SourceRepo;
