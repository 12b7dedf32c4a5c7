pub mod channel;
pub mod endpoint;
pub mod hub;
pub mod mapper;
pub mod snapshot;
pub mod sources;
pub mod tool;
pub mod types;

pub use channel::ChannelTag;
pub use endpoint::{stream_label, Endpoint, EndpointId, EndpointKind, Role};
pub use hub::{HubLayout, TemplatePort};
pub use mapper::{map_channels, ChannelMap, Channelled, PairedBy};
pub use snapshot::{ObjectKind, RawObject, SnapshotBuilder};
pub use sources::{parse_dump, GraphSource, PwDumpSource, ReadFailure};
#[cfg(feature = "native")]
pub use sources::NativeSource;
pub use tool::{run_tool, ToolError, ToolOutput};
pub use types::*;
