//! Compute-once wrapper over a [`BlobCache`] entry.
//!
//! The cache is on disk, so a memoized producer runs at most once for as
//! long as the entry exists, across process restarts. There is no expiry
//! and no refresh; removing the file is the only way to recompute.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::cache::BlobCache;
use crate::Result;

/// Turns a value into cache bytes and back.
pub trait Codec<T> {
    fn encode(&self, value: &T) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// UTF-8 JSON encoding, the default for memoized values.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Returns the value stored under `key`, or calls `producer`, stores its
/// encoded result and returns it.
///
/// A stored entry that fails to decode is an error; the producer is not
/// called as a fallback. Producer errors are returned as-is and nothing is
/// stored.
pub fn memoize<T, C, F>(cache: &BlobCache, key: &str, codec: &C, producer: F) -> Result<T>
where
    C: Codec<T>,
    F: FnOnce() -> Result<T>,
{
    if let Some(bytes) = cache.get(key)? {
        debug!(namespace = %cache.namespace(), key, "using memoized value");
        return codec.decode(&bytes);
    }

    debug!(namespace = %cache.namespace(), key, "no memoized value, computing");
    let value = producer()?;
    cache.put(key, &codec.encode(&value)?)?;
    Ok(value)
}

/// [`memoize`] with [`JsonCodec`].
pub fn memoize_json<T, F>(cache: &BlobCache, key: &str, producer: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T>,
{
    memoize(cache, key, &JsonCodec, producer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Namespace;
    use crate::AlttprError;
    use std::cell::Cell;
    use std::collections::BTreeMap;

    fn counting_producer(calls: &Cell<u32>) -> Result<BTreeMap<String, Vec<u32>>> {
        calls.set(calls.get() + 1);
        Ok(BTreeMap::from([("presets".to_string(), vec![1, 2, 3])]))
    }

    #[test]
    fn producer_runs_once() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = BlobCache::new(tmp.path(), Namespace::MISC);
        let calls = Cell::new(0);

        let first = memoize_json(&cache, "settings", || counting_producer(&calls)).unwrap();
        let second = memoize_json(&cache, "settings", || counting_producer(&calls)).unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn memo_survives_a_fresh_handle() {
        let tmp = tempfile::tempdir().unwrap();
        let calls = Cell::new(0);

        let cache = BlobCache::new(tmp.path(), Namespace::MISC);
        memoize_json(&cache, "settings", || counting_producer(&calls)).unwrap();

        let reopened = BlobCache::new(tmp.path(), Namespace::MISC);
        let value = memoize_json(&reopened, "settings", || counting_producer(&calls)).unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(value["presets"], vec![1, 2, 3]);
    }

    #[test]
    fn stored_bytes_are_json() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = BlobCache::new(tmp.path(), Namespace::MISC);
        memoize_json(&cache, "answer", || Ok(vec![4, 2])).unwrap();
        assert_eq!(cache.get("answer").unwrap().unwrap(), b"[4,2]");
    }

    #[test]
    fn producer_error_is_not_cached() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = BlobCache::new(tmp.path(), Namespace::MISC);

        let err = memoize_json::<u32, _>(&cache, "flaky", || {
            Err(AlttprError::Provider("timed out".to_string()))
        })
        .unwrap_err();
        assert!(matches!(err, AlttprError::Provider(_)));
        assert!(!cache.exists("flaky"));

        assert_eq!(memoize_json(&cache, "flaky", || Ok(7u32)).unwrap(), 7);
    }

    #[test]
    fn corrupt_entry_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = BlobCache::new(tmp.path(), Namespace::MISC);
        cache.put("broken", b"{not json").unwrap();

        let calls = Cell::new(0);
        let err = memoize_json(&cache, "broken", || counting_producer(&calls)).unwrap_err();
        assert!(matches!(err, AlttprError::Codec(_)));
        assert_eq!(calls.get(), 0);
    }

    struct Utf8Codec;

    impl Codec<String> for Utf8Codec {
        fn encode(&self, value: &String) -> Result<Vec<u8>> {
            Ok(value.as_bytes().to_vec())
        }

        fn decode(&self, bytes: &[u8]) -> Result<String> {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
    }

    #[test]
    fn custom_codec_is_used() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = BlobCache::new(tmp.path(), Namespace::MISC);
        memoize(&cache, "motd", &Utf8Codec, || Ok("hello".to_string())).unwrap();
        assert_eq!(cache.get("motd").unwrap().unwrap(), b"hello");
        let again = memoize(&cache, "motd", &Utf8Codec, || Ok("changed".to_string())).unwrap();
        assert_eq!(again, "hello");
    }
}
