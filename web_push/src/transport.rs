//! Outbound HTTP and subscriber lookup collaborators.

use crate::{BoxError, Subscription};
use http::{Request, Response};
use std::future::Future;

/// Sends one fully built push request.
pub trait HttpClient: Send + Sync {
    type Error: Into<BoxError>;

    fn send(
        &self,
        request: Request<Vec<u8>>,
    ) -> impl Future<Output = Result<Response<Vec<u8>>, Self::Error>> + Send;
}

/// Looks up the subscription a recipient registered.
pub trait SubscriberStore: Send + Sync {
    type Error: Into<BoxError>;

    fn find_subscription_by_recipient_id(
        &self,
        recipient_id: &str,
    ) -> impl Future<Output = Result<Option<Subscription>, Self::Error>> + Send;
}

#[cfg(feature = "hyper-client")]
pub use self::hyper_client::HyperClient;

#[cfg(feature = "hyper-client")]
mod hyper_client {
    use super::HttpClient;
    use crate::BoxError;
    use http::{Request, Response};
    use http_body_util::{BodyExt, Full};
    use hyper::body::Bytes;
    use hyper_tls::HttpsConnector;
    use hyper_util::{
        client::legacy::{connect::HttpConnector, Client},
        rt::TokioExecutor,
    };
    use std::future::Future;

    /// [`HttpClient`] over hyper with native TLS. Requires a tokio runtime.
    #[derive(Clone, Debug)]
    pub struct HyperClient {
        inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    }

    impl HyperClient {
        pub fn new() -> Self {
            let https = HttpsConnector::new();
            Self {
                inner: Client::builder(TokioExecutor::new()).build(https),
            }
        }
    }

    impl Default for HyperClient {
        fn default() -> Self {
            Self::new()
        }
    }

    impl HttpClient for HyperClient {
        type Error = BoxError;

        fn send(
            &self,
            request: Request<Vec<u8>>,
        ) -> impl Future<Output = Result<Response<Vec<u8>>, Self::Error>> + Send {
            let pending = self
                .inner
                .request(request.map(|body| Full::new(Bytes::from(body))));
            async move {
                let (parts, body) = pending.await?.into_parts();
                let body = body.collect().await?.to_bytes().to_vec();
                Ok(Response::from_parts(parts, body))
            }
        }
    }
}
