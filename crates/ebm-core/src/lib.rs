pub mod client;
pub mod error;
pub mod model;
pub mod signer;

pub use client::{ApiResponse, EopClient, StockSource};
pub use error::CoreError;
pub use model::{
    Credential, CredentialError, Method, MonitoredResource, Params, SignedRequest, StockEntry,
};
pub use signer::{AuthHeaders, sign};
