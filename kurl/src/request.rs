use crate::transport::{AuthenticatingClient, NegotiateSource};
use anyhow::{anyhow, Context as _};
use clap::ValueEnum;
use log::debug;
use reqwest::blocking::Response;
use reqwest::{StatusCode, Url};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// HTTP methods the tool can issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
    Put,
    Options,
    Head,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Put => reqwest::Method::PUT,
            Method::Options => reqwest::Method::OPTIONS,
            Method::Head => reqwest::Method::HEAD,
        }
    }
}

/// Basic-auth credentials in `user[:password]` form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicAuth {
    pub user: String,
    pub password: Option<String>,
}

impl BasicAuth {
    /// Splits on the first `:`, trimming both parts. An all-whitespace
    /// input means basic auth is not in use.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.split_once(':') {
            Some((user, password)) => Some(Self {
                user: user.trim().to_owned(),
                password: Some(password.trim().to_owned()),
            }),
            None => Some(Self {
                user: raw.to_owned(),
                password: None,
            }),
        }
    }
}

pub struct RequestOptions {
    pub method: Method,
    pub url: Url,
    pub basic_auth: Option<BasicAuth>,
    pub output_file: Option<PathBuf>,
    pub fail_on_error_status: bool,
}

/// Issues the single configured request and renders its response.
///
/// Returns the HTTP status code. Statuses of 300 and above are reported
/// on stdout and only turn into an `Err` when the caller opted in via
/// `fail_on_error_status`; a failure of the HTTP call itself is always an
/// error.
pub fn perform_request<P: NegotiateSource>(
    client: &AuthenticatingClient<P>,
    options: &RequestOptions,
) -> anyhow::Result<u16> {
    let method: reqwest::Method = options.method.into();
    let mut builder = client.request(method.clone(), options.url.clone());
    if let Some(auth) = &options.basic_auth {
        builder = builder.basic_auth(&auth.user, auth.password.as_deref());
    }
    let request = builder.build().with_context(|| {
        format!(
            "cannot build the '{}' request for the URL '{}'",
            method, options.url
        )
    })?;

    debug!("issuing {} {}", method, options.url);
    let response = client.execute(request).with_context(|| {
        format!(
            "unable to make the '{}' request for the URL '{}'",
            method, options.url
        )
    })?;

    let status = response.status();
    if status.as_u16() <= 299 {
        match &options.output_file {
            Some(path) => write_body_to_file(response, path)?,
            None => print_response(response, None)?,
        }
    } else {
        print_response(response, Some(status))?;
        if options.fail_on_error_status {
            return Err(anyhow!("server returned status '{}'", status));
        }
    }
    Ok(status.as_u16())
}

/// Streams the body into a freshly created file; a pre-existing file is
/// removed first so stale content never survives.
fn write_body_to_file(mut response: Response, path: &Path) -> anyhow::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => (),
        Err(err) if err.kind() == ErrorKind::NotFound => (),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("unable to truncate the existing file '{}'", path.display()))
        }
    }
    let mut file = fs::File::create(path)
        .with_context(|| format!("unable to create the output file at '{}'", path.display()))?;
    response
        .copy_to(&mut file)
        .with_context(|| format!("unable to write the response body to '{}'", path.display()))?;
    println!("Response written to '{}'", path.display());
    Ok(())
}

fn print_response(mut response: Response, error_status: Option<StatusCode>) -> anyhow::Result<()> {
    if let Some(status) = error_status {
        println!("ERROR: server returned status '{}'", status);
    }
    println!("HEADERS:");
    for (name, value) in response.headers() {
        println!("'{}' : '{}'", name, String::from_utf8_lossy(value.as_bytes()));
    }
    println!("BODY:");
    let mut stdout = io::stdout().lock();
    response
        .copy_to(&mut stdout)
        .context("unable to read the response body")?;
    drop(stdout);
    println!();
    Ok(())
}
