use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::endpoints::Endpoint;

/// Anything that can answer an upstream endpoint with its JSON body: the
/// in-process [`crate::gateway::Gateway`], or a
/// [`crate::client::ProxyClient`] talking to a running proxy.
pub trait ListingSource: Send + Sync {
    fn fetch(&self, endpoint: &Endpoint) -> Result<Value>;
}

impl<T: ListingSource + ?Sized> ListingSource for Arc<T> {
    fn fetch(&self, endpoint: &Endpoint) -> Result<Value> {
        (**self).fetch(endpoint)
    }
}
