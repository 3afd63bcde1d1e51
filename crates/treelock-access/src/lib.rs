//! Hierarchical access-rights coordination
//!
//! Lets independent subsystems request exclusive or shared access to named,
//! tree-structured resources, discover what currently blocks them, receive
//! tokens representing granted access, compose grants into one logical
//! unit, and get notified when access changes. The manager never blocks
//! waiting for availability; it reports conflicts and leaves blocking
//! policy to the caller.

pub mod error;
pub mod manager;
pub mod request;
pub mod result;
pub mod right;
pub mod token;

pub use error::{Error, Result};
pub use manager::{
    AccessChangeListener, AccessListenerHandle, AccessMode, HierarchicalAccessManager,
};
pub use request::{AccessId, AccessRequest};
pub use result::AccessResult;
pub use right::{HierarchicalRight, RightKey};
pub use token::{
    AccessToken, CombinedToken, DelegatedAccessToken, GenericAccessToken, ListenerHandle,
    ReleaseListener, ReleaseListenerSupport,
};
