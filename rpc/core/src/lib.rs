pub mod api;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod model;

pub use api::ChainApi;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockChain;
pub use model::*;
