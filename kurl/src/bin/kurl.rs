use anyhow::{anyhow, Context as _};
use chrono::Local;
use clap::Parser;
use kurl::error_prefixed_exit_code;
use kurl::request::{self, BasicAuth, Method, RequestOptions};
use kurl::ticket::{self, ShellTicketStore};
use kurl::transport::AuthenticatingClient;
use once_cell::sync::Lazy;
use reqwest::Url;
use std::path::PathBuf;
use std::process::ExitCode;

const PROGNAME: &str = "kurl";

static ARGS: Lazy<Args> = Lazy::new(Args::parse);

/// A replacement for a statically compiled cURL binary, with transparent
/// Kerberos/SPNEGO authentication.
#[derive(Parser)]
#[command(name = PROGNAME, version, about)]
struct Args {
    /// URL to make the request to
    #[arg(short = 'l', long)]
    url: String,

    /// HTTP request method to use
    #[arg(short = 'X', long = "type", value_enum, default_value = "GET")]
    method: Method,

    /// Authenticate the request with Kerberos/SPNEGO
    #[arg(short = 'k', long)]
    kerberized: bool,

    /// Keytab to obtain tickets from
    #[arg(long, default_value = "/etc/security/hdfs-headless.keytab")]
    keytab_path: PathBuf,

    /// Principal to obtain tickets for, e.g. 'hdfs@ACME.ORG'
    #[arg(long, default_value = "hdfs@ACME.ORG")]
    kerberos_principal: String,

    /// chrono format of the expiry dates in ticket listings, e.g. '%m/%d/%Y'
    #[arg(long, default_value = ticket::DEFAULT_TIMESTAMP_FORMAT)]
    ts_format: String,

    /// Basic-auth credentials as 'user:password'
    #[arg(short = 'u', long)]
    basic_auth: Option<String>,

    /// Verify TLS certificates instead of accepting any
    #[arg(long)]
    enforce_tls_verify: bool,

    /// User-Agent header to send with the request
    #[arg(long, default_value = concat!("kurl/", env!("CARGO_PKG_VERSION")))]
    user_agent: String,

    /// Write the response body to a file instead of stdout
    #[arg(short = 'o', long)]
    output_file: Option<PathBuf>,

    /// Exit non-zero when the server answers with a status of 300 or above
    #[arg(long)]
    fail: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    error_prefixed_exit_code(PROGNAME, run())
}

fn run() -> anyhow::Result<()> {
    let url: Url = ARGS
        .url
        .trim()
        .parse()
        .with_context(|| format!("'{}' is not a valid URL", ARGS.url.trim()))?;

    if ARGS.kerberized {
        validate_kerberos_args()?;
        let store = ShellTicketStore::new();
        store.check_dependencies()?;
        ticket::ensure_ticket(
            &store,
            ARGS.ts_format.trim(),
            &ARGS.keytab_path,
            ARGS.kerberos_principal.trim(),
            Local::now().naive_local(),
        )?;
    }

    let client = AuthenticatingClient::build(
        ARGS.enforce_tls_verify,
        ARGS.kerberized,
        ARGS.user_agent.trim(),
    )
    .context("cannot build the HTTP client")?;

    let options = RequestOptions {
        method: ARGS.method,
        url,
        basic_auth: ARGS.basic_auth.as_deref().and_then(BasicAuth::parse),
        output_file: ARGS.output_file.clone(),
        fail_on_error_status: ARGS.fail,
    };
    request::perform_request(&client, &options)?;
    Ok(())
}

fn validate_kerberos_args() -> anyhow::Result<()> {
    if ARGS.kerberos_principal.trim().is_empty() {
        return Err(anyhow!(
            "the 'kerberos-principal' parameter is required when kerberized"
        ));
    }
    std::fs::metadata(&ARGS.keytab_path).with_context(|| {
        format!(
            "cannot find or access the keytab file '{}'",
            ARGS.keytab_path.display()
        )
    })?;
    let format = ARGS.ts_format.trim();
    if !format.is_empty() && !ticket::TIMESTAMP_FORMATS.contains(&format) {
        eprintln!("WARN: '{}' is not one of the default 'ts-format' values", format);
    }
    Ok(())
}
