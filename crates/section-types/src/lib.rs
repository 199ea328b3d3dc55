pub mod axis;
pub mod body;
pub mod distribution;
pub mod profile;
pub mod tolerance;

pub use axis::*;
pub use body::*;
pub use distribution::*;
pub use profile::*;
pub use tolerance::*;
