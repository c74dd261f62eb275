use crate::spnego::{SpnegoError, SpnegoProvider};
use reqwest::blocking::{Client, Request, RequestBuilder, Response};
use reqwest::{Method, Url};

/// Stamps outgoing requests with a negotiation header. Implemented by the
/// production provider; tests substitute their own.
pub trait NegotiateSource {
    fn set_negotiate_header(&self, req: &mut Request) -> Result<(), SpnegoError>;
}

impl NegotiateSource for SpnegoProvider {
    fn set_negotiate_header(&self, req: &mut Request) -> Result<(), SpnegoError> {
        SpnegoProvider::set_negotiate_header(self, req)
    }
}

/// Errors from the authenticating client, split so callers can tell a
/// failed negotiation from a failed network call.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot set the negotiation header: {0}")]
    Negotiate(#[source] SpnegoError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// HTTP client that optionally authenticates each outgoing request with
/// SPNEGO before it leaves the process.
///
/// Whether requests are protected is fixed at construction. A request
/// whose negotiation header cannot be computed is never sent. Negotiation
/// is a single round trip: continuation tokens a server may return are
/// not processed.
pub struct AuthenticatingClient<P = SpnegoProvider> {
    client: Client,
    negotiate: Option<P>,
}

impl AuthenticatingClient<SpnegoProvider> {
    /// Builds the client: TLS verification is disabled exactly when the
    /// explicit flag says so, and requests are SPNEGO-protected exactly
    /// when `kerberized` is set.
    pub fn build(
        enforce_tls_verify: bool,
        kerberized: bool,
        user_agent: &str,
    ) -> reqwest::Result<Self> {
        let mut builder = Client::builder().danger_accept_invalid_certs(!enforce_tls_verify);
        if !user_agent.is_empty() {
            // Gateway servers redirect browser-looking clients to an SSO
            // login page; a tool agent keeps the response machine-readable.
            builder = builder.user_agent(user_agent);
        }
        let client = builder.build()?;
        Ok(Self::from_parts(client, kerberized.then(SpnegoProvider::new)))
    }
}

impl<P: NegotiateSource> AuthenticatingClient<P> {
    pub(crate) fn from_parts(client: Client, negotiate: Option<P>) -> Self {
        Self { client, negotiate }
    }

    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    pub fn execute(&self, mut req: Request) -> Result<Response, TransportError> {
        if let Some(source) = &self.negotiate {
            source
                .set_negotiate_header(&mut req)
                .map_err(TransportError::Negotiate)?;
        }
        self.client.execute(req).map_err(TransportError::Http)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;
    use std::io::ErrorKind;
    use std::net::TcpListener;

    struct FailingSource;

    impl NegotiateSource for FailingSource {
        fn set_negotiate_header(&self, _req: &mut Request) -> Result<(), SpnegoError> {
            Err(SpnegoError::Token(
                "HTTP/node01.acme.org".to_owned(),
                "forced failure".to_owned(),
            ))
        }
    }

    struct StaticSource;

    impl NegotiateSource for StaticSource {
        fn set_negotiate_header(&self, req: &mut Request) -> Result<(), SpnegoError> {
            req.headers_mut()
                .insert(AUTHORIZATION, "Negotiate dGVzdA==".parse().unwrap());
            Ok(())
        }
    }

    #[test]
    fn negotiate_failure_short_circuits_before_the_network() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let url: Url = format!("http://{}/", listener.local_addr().unwrap())
            .parse()
            .unwrap();

        let client = AuthenticatingClient::from_parts(Client::new(), Some(FailingSource));
        let req = client.request(Method::GET, url).build().unwrap();
        let err = client.execute(req).unwrap_err();

        assert!(matches!(err, TransportError::Negotiate(_)));
        match listener.accept() {
            Err(err) => assert_eq!(err.kind(), ErrorKind::WouldBlock),
            Ok(_) => panic!("a network call was attempted with a failed negotiation"),
        }
    }

    #[test]
    fn protected_requests_carry_the_stamped_header() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/")
            .match_header("authorization", "Negotiate dGVzdA==")
            .with_status(200)
            .create();

        let client = AuthenticatingClient::from_parts(Client::new(), Some(StaticSource));
        let req = client
            .request(Method::GET, server.url().parse().unwrap())
            .build()
            .unwrap();
        let response = client.execute(req).unwrap();

        assert_eq!(response.status().as_u16(), 200);
        mock.assert();
    }

    #[test]
    fn passthrough_requests_are_sent_unchanged() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(200)
            .create();

        let client: AuthenticatingClient<StaticSource> =
            AuthenticatingClient::from_parts(Client::new(), None);
        let req = client
            .request(Method::GET, server.url().parse().unwrap())
            .build()
            .unwrap();
        client.execute(req).unwrap();
        mock.assert();
    }

    #[test]
    fn both_tls_modes_build() {
        AuthenticatingClient::build(true, false, "kurl-test").unwrap();
        AuthenticatingClient::build(false, false, "").unwrap();
    }

    #[test]
    #[ignore = "needs network access to an invalid-certificate endpoint"]
    fn tls_verification_flag_controls_invalid_certificates() {
        let url: Url = "https://self-signed.badssl.com/".parse().unwrap();

        let relaxed = AuthenticatingClient::build(false, false, "kurl-test").unwrap();
        let req = relaxed.request(Method::GET, url.clone()).build().unwrap();
        assert!(relaxed.execute(req).is_ok());

        let strict = AuthenticatingClient::build(true, false, "kurl-test").unwrap();
        let req = strict.request(Method::GET, url).build().unwrap();
        assert!(matches!(strict.execute(req), Err(TransportError::Http(_))));
    }
}
