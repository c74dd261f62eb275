use crate::{credential_cache, hostname, profile::Profile};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use libgssapi::context::{ClientCtx, CtxFlags, SecurityContext};
use libgssapi::credential::{Cred, CredUsage};
use libgssapi::name::Name;
use libgssapi::oid::{OidSet, GSS_MECH_KRB5, GSS_NT_HOSTBASED_SERVICE};
use log::debug;
use once_cell::sync::OnceCell;
use reqwest::blocking::Request;
use reqwest::header::{HeaderValue, AUTHORIZATION};

/// Failure stages of negotiation-header construction. The stage a call
/// died in stays visible to callers and in the logs.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SpnegoError {
    #[error("cannot canonicalize the request host: {0}")]
    Resolve(String),
    #[error("cannot load the Kerberos configuration: {0}")]
    Config(String),
    #[error("cannot build a Kerberos client from the credential cache: {0}")]
    Credential(String),
    #[error("cannot compute the negotiation token for '{0}': {1}")]
    Token(String, String),
    #[error("cannot encode the negotiation header: {0}")]
    Header(String),
}

/// Computes `Authorization: Negotiate <token>` headers for outgoing
/// requests.
///
/// The Kerberos configuration is loaded at most once; both the loaded
/// profile and a load failure are memoized for the process lifetime. The
/// GSSAPI credential is read fresh from the ticket cache on each call and
/// moved into the security context; the tool issues one request per
/// process, so nothing is reused across calls.
pub struct SpnegoProvider {
    profile: OnceCell<Result<Profile, SpnegoError>>,
}

impl SpnegoProvider {
    pub fn new() -> Self {
        Self {
            profile: OnceCell::new(),
        }
    }

    /// Stamps `req` with a negotiation header for the service principal
    /// `HTTP/<canonical-host>` derived from the request URL.
    pub fn set_negotiate_header(&self, req: &mut Request) -> Result<(), SpnegoError> {
        let host = req
            .url()
            .host_str()
            .ok_or_else(|| SpnegoError::Resolve("request URL has no host".to_owned()))?;
        let host = hostname::canonicalize(host).map_err(|err| {
            SpnegoError::Resolve(format!("{:#}", err))
        })?;
        debug!("canonical service host: {}", host);

        let profile = self.profile()?;
        match profile.default_realm() {
            Some(realm) => debug!("realm '{}' from '{}'", realm, profile.path()),
            None => debug!("no default realm in '{}'", profile.path()),
        }
        let cred = self.credential()?;

        let spn = format!("HTTP/{}", host);
        let token = negotiate_token(cred, &host, &spn)?;
        let header = format!("Negotiate {}", BASE64.encode(&token));
        let header =
            HeaderValue::from_str(&header).map_err(|err| SpnegoError::Header(err.to_string()))?;
        req.headers_mut().insert(AUTHORIZATION, header);
        Ok(())
    }

    fn profile(&self) -> Result<&Profile, SpnegoError> {
        self.profile
            .get_or_init(|| {
                Profile::load().map_err(|err| SpnegoError::Config(format!("{:#}", err)))
            })
            .as_ref()
            .map_err(|err| err.clone())
    }

    fn credential(&self) -> Result<Cred, SpnegoError> {
        let path = credential_cache::existing_path()
            .map_err(|err| SpnegoError::Credential(format!("{:#}", err)))?;
        debug!(
            "acquiring a Kerberos credential from '{}'",
            path.display()
        );
        let mechs = krb5_mechs().map_err(|err| SpnegoError::Credential(err.to_string()))?;
        Cred::acquire(None, None, CredUsage::Initiate, Some(&mechs))
            .map_err(|err| SpnegoError::Credential(err.to_string()))
    }
}

impl Default for SpnegoProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn krb5_mechs() -> Result<OidSet, libgssapi::error::Error> {
    let mut mechs = OidSet::new()?;
    mechs.add(&GSS_MECH_KRB5)?;
    Ok(mechs)
}

fn negotiate_token(cred: Cred, host: &str, spn: &str) -> Result<Vec<u8>, SpnegoError> {
    // GSSAPI spells the principal in hostbased-service form.
    let name = Name::new(
        format!("HTTP@{}", host).as_bytes(),
        Some(&GSS_NT_HOSTBASED_SERVICE),
    )
    .map_err(|err| SpnegoError::Token(spn.to_owned(), err.to_string()))?;

    let mut ctx = ClientCtx::new(
        Some(cred),
        name,
        CtxFlags::GSS_C_MUTUAL_FLAG | CtxFlags::GSS_C_SEQUENCE_FLAG,
        Some(&GSS_MECH_KRB5),
    );
    match ctx.step(None, None) {
        Ok(Some(token)) => {
            debug!("negotiation token computed for '{}'", spn);
            Ok(token.to_vec())
        }
        Ok(None) => Err(SpnegoError::Token(
            spn.to_owned(),
            "no token generated".to_owned(),
        )),
        Err(err) => Err(SpnegoError::Token(spn.to_owned(), err.to_string())),
    }
}
