use anyhow::anyhow;
use nix::unistd::Uid;
use std::env;
use std::path::PathBuf;

pub const KRB5_ENV_CCNAME: &str = "KRB5CCNAME";

const FILE_PREFIX: &str = "FILE:";
const DEFAULT_CACHE_DIR: &str = "/tmp";

/// Path of the on-disk ticket cache: `$KRB5CCNAME` when it names a
/// `FILE:` cache, otherwise `/tmp/krb5cc_<uid>` for the current user.
/// Other cache types in `$KRB5CCNAME` are ignored.
///
/// The cache itself is written by the external ticket-acquisition
/// utility; this program only ever reads it.
pub fn default_path() -> PathBuf {
    if let Ok(name) = env::var(KRB5_ENV_CCNAME) {
        if let Some(path) = name.strip_prefix(FILE_PREFIX) {
            return PathBuf::from(path);
        }
    }
    PathBuf::from(format!("{}/krb5cc_{}", DEFAULT_CACHE_DIR, Uid::current()))
}

/// Like `default_path`, but requires the cache to exist on disk.
pub fn existing_path() -> anyhow::Result<PathBuf> {
    let path = default_path();
    if path.exists() {
        Ok(path)
    } else {
        Err(anyhow!(
            "cannot find the credential cache '{}'",
            path.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables are process-global; both scenarios run inside
    // this one test to keep them from racing each other.
    #[test]
    fn cache_path_resolution() {
        let previous = env::var(KRB5_ENV_CCNAME).ok();

        env::set_var(KRB5_ENV_CCNAME, "FILE:/tmp/krb5cc_custom");
        assert_eq!(default_path(), PathBuf::from("/tmp/krb5cc_custom"));

        // Non-FILE caches are not usable here; fall back to the default.
        env::set_var(KRB5_ENV_CCNAME, "KEYRING:persistent:1000");
        let fallback = default_path();
        assert!(fallback
            .to_string_lossy()
            .starts_with(&format!("{}/krb5cc_", DEFAULT_CACHE_DIR)));

        env::remove_var(KRB5_ENV_CCNAME);
        assert_eq!(default_path(), fallback);

        match previous {
            Some(value) => env::set_var(KRB5_ENV_CCNAME, value),
            None => env::remove_var(KRB5_ENV_CCNAME),
        }
    }
}
