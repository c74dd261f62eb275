use anyhow::{anyhow, Context as _};
use config::{Config, File, FileFormat};
use log::debug;
use std::env;
use std::path::Path;

pub const KRB5_ENV_CONFIG: &str = "KRB5_CONFIG";

const DEFAULT_PROFILE_PATH: &str = "/etc/krb5.conf";
const SECONDARY_PROFILE_PATH: &str = "/etc/krb5/krb5.conf";

/// Realm/KDC configuration (krb5.conf), reduced to what this tool reads:
/// the resolved path and the configured default realm.
///
/// Loaded once per process by the negotiation provider; the provider
/// memoizes both the value and any load error.
#[derive(Debug)]
pub struct Profile {
    path: String,
    default_realm: Option<String>,
}

impl Profile {
    /// Loads the configuration from the first usable candidate path:
    /// `$KRB5_CONFIG` when it names an existing file, then the primary
    /// system path, then the secondary one. The file must parse as INI.
    ///
    /// The resolved path is exported back into `$KRB5_CONFIG` so the
    /// GSSAPI runtime reads the same file; it is resolved exactly once
    /// per process and not re-read after environment changes.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::locate()?;
        let config = Config::builder()
            .add_source(File::with_name(&path).format(FileFormat::Ini))
            .build()
            .with_context(|| format!("cannot parse the Kerberos configuration at '{}'", path))?;
        let default_realm = config.get_string("libdefaults.default_realm").ok();
        env::set_var(KRB5_ENV_CONFIG, &path);
        debug!("using the Kerberos configuration at '{}'", path);
        Ok(Self {
            path,
            default_realm,
        })
    }

    fn locate() -> anyhow::Result<String> {
        if let Ok(custom) = env::var(KRB5_ENV_CONFIG) {
            let custom = custom.trim();
            if !custom.is_empty() && Path::new(custom).exists() {
                return Ok(custom.to_owned());
            }
        }
        for candidate in [DEFAULT_PROFILE_PATH, SECONDARY_PROFILE_PATH] {
            if Path::new(candidate).exists() {
                return Ok(candidate.to_owned());
            }
        }
        Err(anyhow!(
            "cannot find a Kerberos configuration at '{}' or '{}' and ${} names no usable file",
            DEFAULT_PROFILE_PATH,
            SECONDARY_PROFILE_PATH,
            KRB5_ENV_CONFIG
        ))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn default_realm(&self) -> Option<&str> {
        self.default_realm.as_deref()
    }
}

/// Startup probe used by the CLI. Unlike `Profile::load`, an explicitly
/// configured `$KRB5_CONFIG` that cannot be accessed is an error here
/// rather than a silent fallback.
pub fn preflight() -> anyhow::Result<()> {
    match env::var(KRB5_ENV_CONFIG) {
        Ok(custom) if !custom.trim().is_empty() => {
            let custom = custom.trim();
            if Path::new(custom).exists() {
                Ok(())
            } else {
                Err(anyhow!(
                    "got a custom Kerberos config path '{}' from ${} and it is not accessible",
                    custom,
                    KRB5_ENV_CONFIG
                ))
            }
        }
        _ => {
            for candidate in [DEFAULT_PROFILE_PATH, SECONDARY_PROFILE_PATH] {
                if Path::new(candidate).exists() {
                    return Ok(());
                }
            }
            Err(anyhow!(
                "cannot find or access '{}' or '{}' and ${} is not set",
                DEFAULT_PROFILE_PATH,
                SECONDARY_PROFILE_PATH,
                KRB5_ENV_CONFIG
            ))
        }
    }
}
