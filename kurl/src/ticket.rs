use anyhow::{anyhow, Context as _};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;
use std::path::Path;
use std::process::Command;

pub const DEFAULT_SHELL: &str = "/usr/bin/sh";

/// chrono equivalent of `mm/dd/yyyy`-style expiry dates printed by ticket
/// listings. The default matches `dd/mm/yyyy`.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%d/%m/%Y";

pub const TIMESTAMP_FORMATS: [&str; 8] = [
    "%m/%d/%Y", "%m/%d/%y", "%d/%m/%Y", "%d/%m/%y", "%Y/%m/%d", "%y/%m/%d", "%Y/%d/%m", "%y/%d/%m",
];

const KLIST_EXPIRY_COMMAND: &str = "klist | awk '{print $3}' | grep '^[0-9]' | head -1";
const DEPENDENCIES: [&str; 5] = ["kinit", "klist", "awk", "grep", "head"];

/// Access to the user's ticket cache and to the utility that refreshes it.
///
/// The production implementation shells out to the system Kerberos tools;
/// tests substitute an in-memory store.
pub trait TicketStore {
    /// The first whitespace-delimited date-like token of the ticket
    /// listing, or `None` when the listing shows no ticket at all.
    fn expiry_token(&self) -> anyhow::Result<Option<String>>;

    /// Obtains a fresh ticket for `principal` from the keytab, overwriting
    /// the cache.
    fn acquire(&self, keytab_path: &Path, principal: &str) -> anyhow::Result<()>;
}

/// Returns whether a usable ticket exists: its expiry must parse under
/// `timestamp_format` (or one of the fallbacks) and lie strictly after
/// `now`. A cache with no ticket at all reports `Ok(false)`, not an
/// error, so the caller can run the first acquisition.
pub fn is_ticket_valid(
    store: &dyn TicketStore,
    timestamp_format: &str,
    now: NaiveDateTime,
) -> anyhow::Result<bool> {
    let Some(token) = store.expiry_token()? else {
        debug!("ticket listing is empty, treating the cache as invalid");
        return Ok(false);
    };
    let expiry = parse_expiry(&token, timestamp_format)?;
    Ok(expiry > now)
}

/// Makes sure a usable ticket exists, acquiring a fresh one when the
/// current one is absent or expired.
pub fn ensure_ticket(
    store: &dyn TicketStore,
    timestamp_format: &str,
    keytab_path: &Path,
    principal: &str,
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    if is_ticket_valid(store, timestamp_format, now)
        .context("unable to validate the Kerberos cache")?
    {
        debug!("ticket cache holds a valid ticket");
        return Ok(());
    }
    debug!("acquiring a ticket for '{}'", principal);
    acquire_ticket(store, keytab_path, principal)
}

pub fn acquire_ticket(
    store: &dyn TicketStore,
    keytab_path: &Path,
    principal: &str,
) -> anyhow::Result<()> {
    store
        .acquire(keytab_path, principal)
        .context("unable to obtain a Kerberos ticket")
}

/// The configured formats minus the caller's primary one, so the same
/// format is never tried twice.
pub fn fallback_formats(primary: &str) -> Vec<&'static str> {
    TIMESTAMP_FORMATS
        .iter()
        .copied()
        .filter(|format| *format != primary)
        .collect()
}

fn parse_expiry(token: &str, timestamp_format: &str) -> anyhow::Result<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(token, timestamp_format)
        .ok()
        .or_else(|| {
            fallback_formats(timestamp_format)
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(token, format).ok())
        })
        .ok_or_else(|| {
            anyhow!(
                "expiry date '{}' matches none of the supported timestamp formats",
                token
            )
        })?;
    Ok(date.and_time(NaiveTime::MIN))
}

/// Ticket store backed by the system `klist`/`kinit` utilities, invoked
/// through the shell.
pub struct ShellTicketStore {
    shell: String,
}

impl ShellTicketStore {
    pub fn new() -> Self {
        Self::with_shell(DEFAULT_SHELL)
    }

    pub fn with_shell(shell: &str) -> Self {
        Self {
            shell: shell.to_owned(),
        }
    }

    /// Startup probe: the shell, every external binary this store invokes,
    /// and a readable Kerberos configuration must all be present before
    /// any request is attempted.
    pub fn check_dependencies(&self) -> anyhow::Result<()> {
        if !Path::new(&self.shell).exists() {
            return Err(anyhow!("cannot find or access '{}'", self.shell));
        }
        crate::profile::preflight()?;
        for dependency in DEPENDENCIES {
            let found = self
                .run(&format!("which {}", dependency))
                .with_context(|| format!("cannot check for the dependency binary '{}'", dependency))?;
            if found.trim().is_empty() {
                return Err(anyhow!(
                    "cannot find the binary '{}' in the OS path",
                    dependency
                ));
            }
        }
        Ok(())
    }

    fn run(&self, command_line: &str) -> anyhow::Result<String> {
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command_line)
            .output()
            .with_context(|| format!("cannot run '{} -c {}'", self.shell, command_line))?;
        if !output.status.success() {
            return Err(anyhow!(
                "{}{}",
                String::from_utf8_lossy(&output.stderr),
                output.status
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for ShellTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketStore for ShellTicketStore {
    fn expiry_token(&self) -> anyhow::Result<Option<String>> {
        let stdout = self.run(KLIST_EXPIRY_COMMAND)?;
        let token = stdout.trim();
        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(token.to_owned()))
        }
    }

    fn acquire(&self, keytab_path: &Path, principal: &str) -> anyhow::Result<()> {
        self.run(&format!(
            "kinit -kt {} {}",
            keytab_path.display(),
            principal
        ))
        .map(|_| ())
    }
}
