pub mod mock_host;
pub mod primitives;
pub mod traits;
pub mod types;

pub use mock_host::{HostOp, MockBody, MockContainer, MockDocument, MockHost, MockPlane, MockSketch};
pub use traits::*;
pub use types::*;
