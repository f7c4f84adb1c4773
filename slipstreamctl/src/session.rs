//! File-backed session store
//!
//! Keeps the server's session cookies in a Netscape `cookies.txt` jar so that a
//! login survives between invocations. The jar is plugged into the HTTP client
//! as its cookie provider and re-saved by the client after every request.

use cookie::Cookie;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use reqwest::Url;
use slipstream_core::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

const JAR_HEADER: &str = "# Netscape HTTP Cookie File\n# This is a generated file! Do not edit.\n\n";
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Write `contents` to `path`, readable and writable by the owner only.
pub(crate) fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())?;

    // The mode above only applies to newly created files
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

/// Create `dir` with owner-only permissions if it does not exist yet.
fn ensure_private_dir(dir: &Path) -> std::io::Result<()> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }

    debug!("Created session directory {}", dir.display());
    Ok(())
}

fn domain_matches(host: &str, domain: &str, include_subdomains: bool) -> bool {
    let host = host.to_ascii_lowercase();
    host == domain || (include_subdomains && host.ends_with(&format!(".{}", domain)))
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

/// Default cookie path: the request path up to, not including, its last `/`.
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// One cookie as persisted in the jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCookie {
    /// Domain without a leading dot
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    /// Unix timestamp, `None` for session cookies
    pub expires: Option<i64>,
    pub name: String,
    pub value: String,
}

impl StoredCookie {
    fn from_set_cookie(cookie: &Cookie<'_>, url: &Url, now: i64) -> Option<Self> {
        let host = url.host_str()?;

        let (domain, include_subdomains) = match cookie.domain() {
            Some(domain) => (domain.trim_start_matches('.').to_ascii_lowercase(), true),
            None => (host.to_ascii_lowercase(), false),
        };

        if !domain_matches(host, &domain, include_subdomains) {
            debug!(
                "Ignoring cookie '{}' for domain {} set by {}",
                cookie.name(),
                domain,
                host
            );
            return None;
        }

        let path = cookie
            .path()
            .filter(|p| p.starts_with('/'))
            .map(str::to_string)
            .unwrap_or_else(|| default_path(url));

        // Max-Age takes precedence over Expires
        let expires = match cookie.max_age() {
            Some(max_age) => Some(now.saturating_add(max_age.whole_seconds())),
            None => cookie.expires_datetime().map(|t| t.unix_timestamp()),
        };

        Some(Self {
            domain,
            include_subdomains,
            path,
            secure: cookie.secure().unwrap_or(false),
            expires,
            name: cookie.name().to_string(),
            value: cookie.value().to_string(),
        })
    }

    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires, Some(expires) if expires <= now)
    }

    fn same_slot(&self, other: &StoredCookie) -> bool {
        self.domain == other.domain && self.path == other.path && self.name == other.name
    }

    fn matches(&self, url: &Url, now: i64) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };

        domain_matches(host, &self.domain, self.include_subdomains)
            && path_matches(url.path(), &self.path)
            && (!self.secure || url.scheme() == "https")
            && !self.is_expired(now)
    }

    fn to_line(&self) -> String {
        let domain = if self.include_subdomains {
            format!(".{}", self.domain)
        } else {
            self.domain.clone()
        };
        let flag = |b: bool| if b { "TRUE" } else { "FALSE" };

        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            domain,
            flag(self.include_subdomains),
            self.path,
            flag(self.secure),
            self.expires.unwrap_or(0),
            self.name,
            self.value
        )
    }

    fn parse_line(line: &str) -> Option<Self> {
        let line = line.strip_prefix(HTTP_ONLY_PREFIX).unwrap_or(line);
        if line.trim().is_empty() || line.starts_with('#') {
            return None;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        let [domain, include_subdomains, path, secure, expires, name, value] = fields[..] else {
            return None;
        };

        let expires = match expires.trim().parse::<i64>().ok()? {
            0 => None,
            t => Some(t),
        };

        Some(Self {
            domain: domain.trim_start_matches('.').to_ascii_lowercase(),
            include_subdomains: include_subdomains.eq_ignore_ascii_case("TRUE"),
            path: path.to_string(),
            secure: secure.eq_ignore_ascii_case("TRUE"),
            expires,
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

/// Cookie jar persisted to a file between invocations.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    cookies: Mutex<Vec<StoredCookie>>,
}

impl SessionStore {
    /// Open the jar at `path`, creating its directory if needed.
    ///
    /// Existing cookies are loaded and expired ones dropped.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(dir) = path.parent() {
            ensure_private_dir(dir)?;
        }

        let mut cookies = Vec::new();
        if path.is_file() {
            let now = now();
            let content = fs::read_to_string(&path)?;
            cookies.extend(
                content
                    .lines()
                    .filter_map(StoredCookie::parse_line)
                    .filter(|c| !c.is_expired(now)),
            );
            debug!(
                "Loaded {} cookie(s) from {}",
                cookies.len(),
                path.display()
            );
        }

        Ok(Self {
            path,
            cookies: Mutex::new(cookies),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StoredCookie>> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the cookies currently held.
    pub fn cookies_snapshot(&self) -> Vec<StoredCookie> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether a live cookie would be sent to `url`.
    pub fn has_session_for(&self, url: &Url) -> bool {
        let now = now();
        self.lock().iter().any(|c| c.matches(url, now))
    }

    /// Insert or replace a cookie; an already expired cookie deletes its slot.
    pub fn store(&self, cookie: StoredCookie) {
        let now = now();
        let mut cookies = self.lock();
        cookies.retain(|c| !c.same_slot(&cookie));

        if cookie.is_expired(now) {
            trace!("Cookie '{}' expired, removed", cookie.name);
        } else {
            cookies.push(cookie);
        }
    }

    /// Persist the jar, session cookies included.
    pub fn save(&self) -> Result<()> {
        let mut content = String::from(JAR_HEADER);
        for cookie in self.lock().iter() {
            content.push_str(&cookie.to_line());
            content.push('\n');
        }

        if let Some(dir) = self.path.parent() {
            ensure_private_dir(dir)?;
        }
        write_private(&self.path, &content)?;
        Ok(())
    }

    /// Drop every cookie sent to `host` and persist the result.
    ///
    /// Returns the number of cookies removed.
    pub fn clear_host(&self, host: &str) -> Result<usize> {
        let removed = {
            let mut cookies = self.lock();
            let before = cookies.len();
            cookies.retain(|c| !domain_matches(host, &c.domain, c.include_subdomains));
            before - cookies.len()
        };

        debug!("Cleared {} cookie(s) for {}", removed, host);
        self.save()?;
        Ok(removed)
    }
}

impl CookieStore for SessionStore {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let now = now();
        for header in cookie_headers {
            let Ok(raw) = header.to_str() else {
                continue;
            };
            match Cookie::parse(raw) {
                Ok(cookie) => {
                    if let Some(stored) = StoredCookie::from_set_cookie(&cookie, url, now) {
                        trace!("Storing cookie '{}' for {}", stored.name, stored.domain);
                        self.store(stored);
                    }
                }
                Err(e) => debug!("Ignoring malformed Set-Cookie header: {}", e),
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let now = now();
        let mut matching: Vec<StoredCookie> = self
            .lock()
            .iter()
            .filter(|c| c.matches(url, now))
            .cloned()
            .collect();

        if matching.is_empty() {
            return None;
        }

        // Longer paths first
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));

        let header = matching
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        HeaderValue::from_str(&header).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn session_cookie(domain: &str, name: &str, value: &str) -> StoredCookie {
        StoredCookie {
            domain: domain.to_string(),
            include_subdomains: false,
            path: "/".to_string(),
            secure: false,
            expires: None,
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    fn set_cookie(store: &SessionStore, raw: &str, at: &str) {
        let header = HeaderValue::from_str(raw).unwrap();
        let mut headers = std::iter::once(&header);
        store.set_cookies(&mut headers, &url(at));
    }

    #[test]
    fn test_open_creates_private_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".slipstream").join("cookies.txt");

        let store = SessionStore::open(&path).unwrap();
        assert!(store.is_empty());
        assert!(path.parent().unwrap().is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(path.parent().unwrap())
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn test_huge_max_age_does_not_expire() {
        let cookie = Cookie::parse("token=abc; Max-Age=99999999999999999999").unwrap();
        let now = now();

        let stored =
            StoredCookie::from_set_cookie(&cookie, &url("https://slipstream.sixsq.com/"), now)
                .unwrap();
        assert_eq!(stored.expires, Some(i64::MAX));
        assert!(!stored.is_expired(now));
    }

    #[test]
    fn test_set_cookie_and_send_back() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(dir.path().join("cookies.txt")).unwrap();

        set_cookie(
            &store,
            "com.sixsq.slipstream.cookie=token=abc; Path=/",
            "https://slipstream.sixsq.com/login",
        );

        assert!(store.has_session_for(&url("https://slipstream.sixsq.com/run")));
        assert!(!store.has_session_for(&url("https://example.com/run")));

        let header = store
            .cookies(&url("https://slipstream.sixsq.com/module"))
            .unwrap();
        assert_eq!(header.to_str().unwrap(), "com.sixsq.slipstream.cookie=token=abc");
    }

    #[test]
    fn test_expired_set_cookie_removes_existing() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(dir.path().join("cookies.txt")).unwrap();

        set_cookie(&store, "session=abc; Path=/", "http://127.0.0.1:8080/login");
        assert_eq!(store.len(), 1);

        set_cookie(&store, "session=; Path=/; Max-Age=0", "http://127.0.0.1:8080/logout");
        assert!(store.is_empty());
    }

    #[test]
    fn test_domain_cookie_matches_subdomains() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(dir.path().join("cookies.txt")).unwrap();

        set_cookie(&store, "sid=1; Domain=.sixsq.com; Path=/", "https://nuv.sixsq.com/login");
        assert!(store.has_session_for(&url("https://slipstream.sixsq.com/")));
        assert!(!store.has_session_for(&url("https://sixsq.org/")));
    }

    #[test]
    fn test_cookie_for_foreign_domain_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(dir.path().join("cookies.txt")).unwrap();

        set_cookie(&store, "sid=1; Domain=example.com", "https://slipstream.sixsq.com/login");
        assert!(store.is_empty());
    }

    #[test]
    fn test_secure_and_path_rules() {
        let mut cookie = session_cookie("example.com", "sid", "1");
        cookie.secure = true;
        cookie.path = "/run".to_string();
        let now = now();

        assert!(cookie.matches(&url("https://example.com/run"), now));
        assert!(cookie.matches(&url("https://example.com/run/abc"), now));
        assert!(!cookie.matches(&url("https://example.com/runs"), now));
        assert!(!cookie.matches(&url("http://example.com/run"), now));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.txt");

        let store = SessionStore::open(&path).unwrap();
        store.store(session_cookie("127.0.0.1", "sid", "abc"));
        let mut persistent = session_cookie("example.com", "remember", "yes");
        persistent.include_subdomains = true;
        persistent.expires = Some(now() + 3600);
        store.store(persistent.clone());
        store.save().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Netscape HTTP Cookie File"));
        assert!(content.contains("127.0.0.1\tFALSE\t/\tFALSE\t0\tsid\tabc"));
        assert!(content.contains(".example.com\tTRUE\t/\tFALSE\t"));

        let reloaded = SessionStore::open(&path).unwrap();
        let cookies = reloaded.cookies_snapshot();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.contains(&session_cookie("127.0.0.1", "sid", "abc")));
        assert!(cookies.contains(&persistent));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_expired_cookies_pruned_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.txt");
        fs::write(
            &path,
            format!(
                "{}old.example.com\tFALSE\t/\tFALSE\t1000\tsid\tstale\n\
                 #HttpOnly_live.example.com\tFALSE\t/\tFALSE\t{}\tsid\tfresh\n\
                 this line is garbage\n",
                JAR_HEADER,
                now() + 3600
            ),
        )
        .unwrap();

        let store = SessionStore::open(&path).unwrap();
        let cookies = store.cookies_snapshot();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].domain, "live.example.com");
        assert_eq!(cookies[0].value, "fresh");
    }

    #[test]
    fn test_clear_host() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.txt");
        let store = SessionStore::open(&path).unwrap();
        store.store(session_cookie("slipstream.sixsq.com", "sid", "1"));
        store.store(session_cookie("example.com", "sid", "2"));

        assert_eq!(store.clear_host("slipstream.sixsq.com").unwrap(), 1);
        assert_eq!(store.len(), 1);

        let reloaded = SessionStore::open(&path).unwrap();
        assert_eq!(reloaded.cookies_snapshot()[0].domain, "example.com");
    }

    #[test]
    fn test_default_path() {
        assert_eq!(default_path(&url("http://h/login")), "/");
        assert_eq!(default_path(&url("http://h/auth/login")), "/auth");
        assert_eq!(default_path(&url("http://h/")), "/");
    }
}
