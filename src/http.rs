//! HTTP client construction
//!
//! Each dispatch acquires its own client so no connection state is
//! shared across calls. The certificate trust policy follows the hook's
//! ignore-certs flag, which only matters for https targets.

use reqwest::Client;

use crate::error::NotifyError;

/// Builds the client used for a single trigger call.
pub trait HttpClientFactory: Send + Sync {
    fn client(&self, use_tls: bool, ignore_cert_errors: bool) -> Result<Client, NotifyError>;
}

pub struct DefaultHttpClientFactory;

impl HttpClientFactory for DefaultHttpClientFactory {
    fn client(&self, use_tls: bool, ignore_cert_errors: bool) -> Result<Client, NotifyError> {
        let mut builder = Client::builder();
        if use_tls && ignore_cert_errors {
            builder = builder.danger_accept_invalid_certs(true);
        }
        builder
            .build()
            .map_err(|e| NotifyError::HttpClient(e.to_string()))
    }
}
