//! [`Store`] is the operation surface a network front-end drives: named dictionaries of values and
//! a set of remote servers.
//!
//! Names and keys are compared case-insensitively. Request parsing, response encoding and any
//! replication protocol between servers belong to the embedding application.

use crate::comparer::CaseInsensitive;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::value::{Timestamp, Value};
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// A dictionary of values addressed by case-insensitive keys.
pub type NamedDictionary = Dictionary<String, Value, CaseInsensitive>;

/// Connection state of a [`RemoteServer`].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RemoteServerState {
    #[default]
    Disconnected,
    Connected,
}

/// A peer known to the [`Store`].
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RemoteServer {
    base_uri: String,
    pub id: Uuid,
    pub state: RemoteServerState,
}

impl RemoteServer {
    /// Creates a disconnected [`RemoteServer`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUri`] unless `base_uri` has the form `scheme://authority...`.
    ///
    /// The scheme and host are stored in lower case, so addresses differing only in their case
    /// name the same server.
    pub fn new(base_uri: &str) -> Result<Self> {
        let Some(base_uri) = normalize_uri(base_uri) else {
            return Err(Error::InvalidUri(base_uri.to_owned()));
        };
        Ok(Self {
            base_uri,
            id: Uuid::nil(),
            state: RemoteServerState::Disconnected,
        })
    }

    /// Returns the base URI.
    #[inline]
    #[must_use]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }
}

impl fmt::Display for RemoteServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_uri)
    }
}

/// Validates an absolute URI and lower-cases its scheme and host.
fn normalize_uri(uri: &str) -> Option<String> {
    let (scheme, rest) = uri.split_once("://")?;
    let mut chars = scheme.chars();
    let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid_scheme || rest.is_empty() || rest.starts_with('/') {
        return None;
    }
    let (authority, path) = rest.split_at(rest.find(['/', '?', '#']).unwrap_or(rest.len()));
    // User information keeps its case.
    let (user_info, host) = authority
        .rfind('@')
        .map_or(("", authority), |at| authority.split_at(at + 1));
    Some(format!(
        "{}://{user_info}{}{path}",
        scheme.to_ascii_lowercase(),
        host.to_lowercase()
    ))
}

/// Hook invoked after the set of remote servers changes.
///
/// No replication happens by default; an implementation decides how the [`Store`] converges with
/// its peers.
pub trait RemoteConvergence: Send + Sync {
    /// Called with the remote servers after one was added or removed.
    fn converge(&self, servers: &[RemoteServer]);
}

/// The [`RemoteConvergence`] that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoConvergence;

impl RemoteConvergence for NoConvergence {
    #[inline]
    fn converge(&self, _servers: &[RemoteServer]) {}
}

/// Named dictionaries plus server statistics.
///
/// Every public operation counts as one request in [`Store::total_requests`].
///
/// # Examples
///
/// ```
/// use stripekv::{Store, Value};
///
/// let store = Store::new();
/// store.set("Users", "alice", Value::from(30_i32));
///
/// assert_eq!(store.get("users", "ALICE"), Some(Value::I32(30)));
/// assert_eq!(store.count("USERS"), Some(1));
/// assert!(store.delete("users", "alice"));
/// ```
pub struct Store<H = NoConvergence> {
    dictionaries: Dictionary<String, Arc<NamedDictionary>, CaseInsensitive>,
    remote_servers: Dictionary<String, RemoteServer>,
    convergence: H,
    total_requests: AtomicU64,
    started_at: Timestamp,
}

impl Store<NoConvergence> {
    /// Creates an empty [`Store`] without remote convergence.
    #[must_use]
    pub fn new() -> Self {
        Self::with_convergence(NoConvergence)
    }
}

impl Default for Store<NoConvergence> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<H: RemoteConvergence> Store<H> {
    /// Creates an empty [`Store`] that calls `convergence` when the remote servers change.
    #[must_use]
    pub fn with_convergence(convergence: H) -> Self {
        Self {
            dictionaries: Dictionary::with_comparer(CaseInsensitive::new()),
            remote_servers: Dictionary::new(),
            convergence,
            total_requests: AtomicU64::new(0),
            started_at: Timestamp::now(),
        }
    }

    /// Returns the value stored under `key` in the named dictionary.
    pub fn get(&self, name: &str, key: &str) -> Option<Value> {
        self.count_request();
        self.dictionaries.read(name, |_, d| d.get(key))?
    }

    /// Returns a copy of the named dictionary.
    pub fn get_dictionary(&self, name: &str) -> Option<Vec<(String, Value)>> {
        self.count_request();
        self.dictionaries.read(name, |_, d| d.to_vec())
    }

    /// Returns a copy of every dictionary.
    pub fn get_all(&self) -> Vec<(String, Vec<(String, Value)>)> {
        self.count_request();
        self.dictionaries
            .to_vec()
            .into_iter()
            .map(|(name, d)| (name, d.to_vec()))
            .collect()
    }

    /// Stores `value` under `key`, creating the named dictionary if needed.
    pub fn set(&self, name: &str, key: &str, value: Value) {
        self.count_request();
        self.dictionary(name).set(key.to_owned(), value);
    }

    /// Stores every pair, creating the named dictionary if needed.
    pub fn set_many<I, S>(&self, name: &str, pairs: I)
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        self.count_request();
        let dictionary = self.dictionary(name);
        for (key, value) in pairs {
            dictionary.set(key.into(), value);
        }
    }

    /// Removes `key` from the named dictionary.
    ///
    /// Returns `false` if the dictionary or the key does not exist.
    pub fn delete(&self, name: &str, key: &str) -> bool {
        self.count_request();
        self.dictionaries
            .read(name, |_, d| d.try_remove(key).is_some())
            .unwrap_or(false)
    }

    /// Removes every key of `keys` from the named dictionary.
    ///
    /// Returns `true` only if the dictionary exists and every key was removed.
    pub fn delete_many<'k, I: IntoIterator<Item = &'k str>>(&self, name: &str, keys: I) -> bool {
        self.count_request();
        let Some(dictionary) = self.dictionaries.get(name) else {
            return false;
        };
        keys.into_iter()
            .fold(true, |all, key| dictionary.try_remove(key).is_some() && all)
    }

    /// Removes the named dictionary.
    pub fn delete_dictionary(&self, name: &str) -> bool {
        self.count_request();
        self.dictionaries.try_remove(name).is_some()
    }

    /// Removes every dictionary.
    ///
    /// The return value tells whether any dictionary existed. It is sampled without locking right
    /// before clearing, so a dictionary created in between may be removed without being reported.
    pub fn delete_all(&self) -> bool {
        self.count_request();
        let had_entries = self.dictionaries.has_entries();
        self.dictionaries.clear();
        had_entries
    }

    /// Returns the number of keys in the named dictionary.
    pub fn count(&self, name: &str) -> Option<usize> {
        self.count_request();
        self.dictionaries.read(name, |_, d| d.len())
    }

    /// Returns the dictionary names with their number of keys.
    pub fn names(&self) -> Vec<(String, usize)> {
        self.count_request();
        self.dictionaries
            .to_vec()
            .into_iter()
            .map(|(name, d)| (name, d.len()))
            .collect()
    }

    /// Returns the number of keys across all dictionaries.
    pub fn total_items(&self) -> usize {
        let mut total = 0;
        self.dictionaries.scan(|_, d| total += d.len());
        total
    }

    /// Returns the number of operations served so far.
    #[inline]
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Relaxed)
    }

    /// Returns the creation time of the [`Store`].
    #[inline]
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Registers a remote server and returns it.
    ///
    /// If a server with the same URI is already registered, it is returned unchanged and the
    /// [`RemoteConvergence`] hook is not called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUri`] if `base_uri` is not an absolute URI.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Store;
    ///
    /// let store = Store::new();
    /// assert!(store.add_remote_server("http://peer:8080/").is_ok());
    /// assert!(store.add_remote_server("peer").is_err());
    /// assert_eq!(store.remote_servers().len(), 1);
    /// ```
    pub fn add_remote_server(&self, base_uri: &str) -> Result<RemoteServer> {
        let server = RemoteServer::new(base_uri)?;
        let mut added = false;
        let result = self.remote_servers.add_or_update_with(
            server.base_uri.clone(),
            |_| {
                added = true;
                server
            },
            |_, existing| existing.clone(),
        );
        if added {
            debug!(uri = base_uri, "remote server added");
            self.converge();
        }
        Ok(result)
    }

    /// Unregisters a remote server.
    ///
    /// Returns `false` if it was not registered.
    pub fn remove_remote_server(&self, base_uri: &str) -> bool {
        let Some(key) = normalize_uri(base_uri) else {
            return false;
        };
        if self.remote_servers.try_remove(&key).is_none() {
            return false;
        }
        debug!(uri = base_uri, "remote server removed");
        self.converge();
        true
    }

    /// Returns the registered remote servers.
    pub fn remote_servers(&self) -> Vec<RemoteServer> {
        self.remote_servers.values().collect()
    }

    /// Returns the [`RemoteConvergence`] hook.
    #[inline]
    pub fn convergence(&self) -> &H {
        &self.convergence
    }

    fn dictionary(&self, name: &str) -> Arc<NamedDictionary> {
        if let Some(dictionary) = self.dictionaries.get(name) {
            return dictionary;
        }
        self.dictionaries.get_or_add_with(name.to_owned(), |_| {
            Arc::new(Dictionary::with_comparer(CaseInsensitive::new()))
        })
    }

    fn converge(&self) {
        let mut servers = self.remote_servers.to_vec();
        servers.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
        let servers: Vec<RemoteServer> = servers.into_iter().map(|(_, s)| s).collect();
        self.convergence.converge(&servers);
    }

    #[inline]
    fn count_request(&self) {
        self.total_requests.fetch_add(1, Relaxed);
    }
}

impl<H> fmt::Debug for Store<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("dictionaries", &self.dictionaries.approximate_len())
            .field("remote_servers", &self.remote_servers.approximate_len())
            .field("total_requests", &self.total_requests.load(Relaxed))
            .field("started_at", &self.started_at)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::{RemoteConvergence, RemoteServer, Store};
    use crate::value::Value;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering::Relaxed;

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl RemoteConvergence for Counting {
        fn converge(&self, _servers: &[RemoteServer]) {
            self.0.fetch_add(1, Relaxed);
        }
    }

    #[test]
    fn named_dictionaries() {
        let store = Store::new();
        store.set("Cfg", "Mode", Value::from("fast"));
        store.set_many("cfg", [("a", Value::I32(1)), ("B", Value::I32(2))]);

        assert_eq!(store.get("CFG", "mode"), Some(Value::from("fast")));
        assert_eq!(store.count("cfg"), Some(3));
        assert_eq!(store.total_items(), 3);
        assert_eq!(store.names(), vec![("Cfg".to_owned(), 3)]);

        assert!(!store.delete_many("cfg", ["a", "missing"]));
        assert!(store.get("cfg", "a").is_none());
        assert!(store.get("cfg", "b").is_some());
        assert!(!store.delete("other", "a"));

        assert!(store.delete_all());
        assert!(!store.delete_all());
        assert!(store.get_all().is_empty());
        assert!(store.total_requests() >= 12);
    }

    #[test]
    fn remote_servers() {
        let store = Store::with_convergence(Counting::default());
        assert!(store.add_remote_server("http://a:1/").is_ok());
        assert!(store.add_remote_server("http://a:1/").is_ok());
        assert!(store.add_remote_server("not a uri").is_err());
        assert!(store.add_remote_server("http:///path").is_err());
        assert_eq!(store.convergence().0.load(Relaxed), 1);

        let server = store.add_remote_server("HTTP://User@A:1/Path?Q").unwrap();
        assert_eq!(server.base_uri(), "http://User@a:1/Path?Q");
        assert_eq!(store.convergence().0.load(Relaxed), 2);

        assert!(store.remove_remote_server("HTTP://A:1/"));
        assert!(!store.remove_remote_server("http://a:1/"));
        assert!(!store.remove_remote_server("not a uri"));
        assert_eq!(store.convergence().0.load(Relaxed), 3);
        assert_eq!(store.remote_servers().len(), 1);
    }

    #[test]
    fn case_of_host_names_one_server() {
        let store = Store::new();
        store.add_remote_server("http://A:1/").unwrap();
        store.add_remote_server("Http://a:1/").unwrap();
        assert_eq!(store.remote_servers().len(), 1);
        assert_eq!(store.remote_servers()[0].base_uri(), "http://a:1/");
    }

    #[test]
    fn debug_output() {
        let store = Store::new();
        store.set("cfg", "mode", Value::I32(1));
        let debug = format!("{store:?}");
        assert!(debug.starts_with("Store {"));
        assert!(debug.contains("total_requests: 1"));
    }
}
