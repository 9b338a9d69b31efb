use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::cache::Cache;
use crate::error::{self, AddContext};
use crate::http::Headers;
use crate::io::Response;
use crate::{log_debug, Result};

/// Characters per path segment of an encoded label.
const SEGMENT_LENGTH: usize = 16;
const EXTENSION: &str = ".json";

/// On-disk shape of a cached response.
#[derive(Serialize, Deserialize)]
struct CachedResponse {
    status: u16,
    reason: String,
    headers: BTreeMap<String, Vec<String>>,
    body: String,
}

/// Label keyed response store persisted as one JSON document per label
/// under a root directory. Survives process restarts.
///
/// There is no locking across processes. Two writers of the same label race
/// and the last one to write wins.
pub struct FileCache {
    root: PathBuf,
}

impl Default for FileCache {
    fn default() -> Self {
        FileCache::new(default_root())
    }
}

/// Process-unique directory under the system temp dir.
pub fn default_root() -> PathBuf {
    std::env::temp_dir().join(format!("wirecache-{}", std::process::id()))
}

impl FileCache {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        FileCache { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the document for `label`. The label is URL encoded, then
    /// `_` is doubled and `%` and `.` become `_` escapes, which leaves only
    /// `[A-Za-z0-9_~-]`. The result is cut into fixed length segments so no
    /// file name grows past platform limits.
    pub fn get_cache_file(&self, label: &str) -> PathBuf {
        let mut path = self.root.clone();
        let encoded = encode_label(label);
        let segments = encoded
            .as_bytes()
            .chunks(SEGMENT_LENGTH)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<String>>();
        if let Some((last, dirs)) = segments.split_last() {
            for dir in dirs {
                path.push(dir);
            }
            path.push(format!("{last}{EXTENSION}"));
        }
        path
    }

    fn get_cache_data(&self, reader: impl Read) -> Result<Response> {
        let cached: CachedResponse = serde_json::from_reader(reader).map_err(error::store)?;
        let headers = cached
            .headers
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |value| (name, value.as_str())))
            .collect::<Headers>();
        let response = Response::builder()
            .status(cached.status)
            .reason(cached.reason)
            .headers(headers)
            .body(cached.body)
            .build()?;
        Ok(response)
    }

    fn persist_cache_data(&self, value: &Response, mut f: impl Write) -> Result<()> {
        let body = value.text().map_err(|err| {
            error::store(format!("Cannot persist a body that is not UTF-8: {err}"))
        })?;
        let cached = CachedResponse {
            status: value.status,
            reason: value.reason.clone(),
            headers: value
                .headers
                .iter()
                .map(|(name, values)| (name.clone(), values.clone()))
                .collect(),
            body: body.to_string(),
        };
        serde_json::to_writer_pretty(&mut f, &cached).map_err(error::store)?;
        f.flush().map_err(error::store)?;
        Ok(())
    }
}

fn encode_label(label: &str) -> String {
    urlencoding::encode(label)
        .replace('_', "__")
        .replace('%', "_")
        .replace('.', "_2E")
}

impl Cache<str> for FileCache {
    fn get(&self, key: &str) -> Result<Option<Response>> {
        let path = self.get_cache_file(key);
        let f = match File::open(&path) {
            Ok(f) => f,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(error::store(err))
                    .err_context(format!("Cannot open cache file {}", path.display()))
            }
        };
        let response = self
            .get_cache_data(BufReader::new(f))
            .err_context(format!("Cannot parse cache file {}", path.display()))?;
        log_debug!("Read cached response for {} from {}", key, path.display());
        Ok(Some(response))
    }

    fn set(&self, key: &str, value: &Response) -> Result<()> {
        let path = self.get_cache_file(key);
        let parent = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(parent)
            .map_err(error::store)
            .err_context(format!("Cannot create cache directory {}", parent.display()))?;
        // Written next to the target and renamed over it, so readers see
        // either the old document or the new one.
        let mut staged = NamedTempFile::new_in(parent)
            .map_err(error::store)
            .err_context(format!("Cannot create cache file in {}", parent.display()))?;
        self.persist_cache_data(value, BufWriter::new(staged.as_file_mut()))
            .err_context(format!("Cannot write cache file {}", path.display()))?;
        staged
            .persist(&path)
            .map_err(error::store)
            .err_context(format!("Cannot write cache file {}", path.display()))?;
        log_debug!("Persisted response for {} to {}", key, path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.get_cache_file(key);
        match fs::remove_file(&path) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(error::store(err))
                .err_context(format!("Cannot remove cache file {}", path.display())),
            _ => Ok(()),
        }
    }

    fn invalidate(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(error::store(err))
                .err_context(format!("Cannot remove cache directory {}", self.root.display())),
            _ => {
                log_debug!("Removed cache directory {}", self.root.display());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WireError;
    use std::collections::HashSet;

    fn file_cache() -> FileCache {
        FileCache::new("/home/user/.cache/wire")
    }

    #[test]
    fn test_get_cache_file_short_label() {
        let path = file_cache().get_cache_file("GET /a");
        assert_eq!(
            PathBuf::from("/home/user/.cache/wire/GET_20_2Fa.json"),
            path
        );
    }

    #[test]
    fn test_get_cache_file_splits_into_segments() {
        let path = file_cache().get_cache_file("GET /users/jordilin?page=2");
        // GET_20_2Fusers_2Fjordilin_3Fpage_3D2
        assert_eq!(
            PathBuf::from("/home/user/.cache/wire/GET_20_2Fusers_2/Fjordilin_3Fpage/_3D2.json"),
            path
        );
    }

    #[test]
    fn test_get_cache_file_has_no_dot_segments() {
        let path = file_cache().get_cache_file("GET /../../etc/passwd");
        let relative = path.strip_prefix("/home/user/.cache/wire").unwrap();
        for component in relative.components() {
            let name = component.as_os_str().to_str().unwrap();
            assert!(name != "." && name != "..");
            assert!(name.trim_end_matches(EXTENSION).chars().all(|c| {
                c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '~'
            }));
        }
    }

    #[test]
    fn test_encoded_labels_are_distinct() {
        let labels = [
            "GET /a_b",
            "GET /a%5Fb",
            "GET /a.b",
            "GET /a%2Eb",
            "GET /a_2Eb",
            "GET /a__b",
        ];
        let encoded = labels
            .iter()
            .map(|label| encode_label(label))
            .collect::<HashSet<String>>();
        assert_eq!(labels.len(), encoded.len());
    }

    #[test]
    fn test_get_cache_data_multi_valued_headers() {
        let data = r#"{
            "status": 200,
            "reason": "OK",
            "headers": {"content-type": ["text/plain"], "Set-Cookie": ["a=1", "b=2"]},
            "body": "sample content"
        }"#;
        let response = file_cache().get_cache_data(data.as_bytes()).unwrap();
        assert_eq!(200, response.status);
        assert_eq!("OK", response.reason);
        assert_eq!(Some("text/plain"), response.header("Content-Type"));
        assert_eq!(2, response.headers.get_all("set-cookie").len());
        assert_eq!(b"sample content".to_vec(), response.body);
    }

    #[test]
    fn test_get_cache_data_corrupted_is_store_error() {
        let err = file_cache()
            .get_cache_data("{\"status\": 200,".as_bytes())
            .unwrap_err();
        match err.downcast_ref::<WireError>() {
            Some(WireError::CacheStoreError(_)) => {}
            _ => panic!("Expected CacheStoreError"),
        }
    }

    #[test]
    fn test_persist_cache_data_shape() {
        let mut headers = Headers::new();
        headers.set("ETag", "\"3e25\"");
        let response = Response::builder()
            .status(200)
            .headers(headers)
            .body("sample content")
            .build()
            .unwrap();
        let mut buffer = Vec::new();
        file_cache().persist_cache_data(&response, &mut buffer).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(200, json["status"]);
        assert_eq!("OK", json["reason"]);
        assert_eq!("\"3e25\"", json["headers"]["Etag"][0]);
        assert_eq!("sample content", json["body"]);
    }

    #[test]
    fn test_set_leaves_only_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let response = Response::builder().body("first").build().unwrap();
        cache.set("GET /a", &response).unwrap();
        let replacement = Response::builder().body("second").build().unwrap();
        cache.set("GET /a", &replacement).unwrap();
        let names = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<String>>();
        assert_eq!(vec!["GET_20_2Fa.json".to_string()], names);
        assert_eq!(Some(replacement), cache.get("GET /a").unwrap());
    }

    #[test]
    fn test_failed_set_keeps_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let response = Response::builder().body("first").build().unwrap();
        cache.set("GET /a", &response).unwrap();
        let binary = Response::builder().body(vec![0xc3u8, 0x28]).build().unwrap();
        assert!(cache.set("GET /a", &binary).is_err());
        assert_eq!(Some(response), cache.get("GET /a").unwrap());
        assert_eq!(1, fs::read_dir(dir.path()).unwrap().count());
    }

    #[test]
    fn test_persist_cache_data_non_utf8_body_is_error() {
        let response = Response::builder()
            .body(vec![0xc3u8, 0x28])
            .build()
            .unwrap();
        let mut buffer = Vec::new();
        assert!(file_cache()
            .persist_cache_data(&response, &mut buffer)
            .is_err());
    }
}
