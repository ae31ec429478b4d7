//! Client-side synchronization of a hosted notes table.
//!
//! [`resource::ResourceStore`] keeps an ordered local copy of a remote
//! collection in step with the create/read/update/delete calls issued through
//! it, and reports a busy/last-error status for presentation code to render.
//! [`remote`] holds the transports: PostgREST over HTTP, and an in-process
//! collection.

pub mod config;
pub mod error;
pub mod logging;
pub mod notes;
pub mod remote;
pub mod resource;
