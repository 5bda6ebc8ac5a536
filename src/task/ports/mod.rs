//! Port contracts consumed by the task coordination services.

mod remote;

#[cfg(test)]
pub use remote::{MockMembershipDirectory, MockProjectStore};
pub use remote::{MembershipDirectory, ProjectStore, RemoteResult, RemoteStoreError};
