use anyhow::Context as _;
use dns_lookup::{lookup_addr, lookup_host};

/// Resolves `hostname` to the canonical DNS name its service principal is
/// registered under: forward-resolve the name, reverse-resolve the first
/// address, strip any trailing root separator.
///
/// An empty (but successful) lookup leaves the input unchanged; a lookup
/// that fails outright is an error. The two outcomes are deliberately
/// distinct.
pub fn canonicalize(hostname: &str) -> anyhow::Result<String> {
    let addresses =
        lookup_host(hostname).with_context(|| format!("cannot resolve host '{}'", hostname))?;
    let Some(address) = addresses.first() else {
        return Ok(hostname.to_owned());
    };
    let name = lookup_addr(address)
        .with_context(|| format!("cannot reverse-resolve address '{}'", address))?;
    if name.is_empty() {
        return Ok(hostname.to_owned());
    }
    Ok(name.trim_end_matches('.').to_owned())
}
