//! Session-wide attachment cache.
//!
//! Attachments are named external byte-resources referenced (never owned)
//! by stage parameters of the attachment kind. They are bound to the
//! subject's context: loading a new subject clears the whole cache.

use std::any::Any;
use std::collections::HashMap;
use std::io::Read;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::debug;
use lru::LruCache;

use crate::error::LibraryError;

const DEFAULT_PARSE_CACHE_SIZE: usize = 16;

/// Abstract byte source backing one attachment.
pub trait AttachmentSource: Send + Sync {
    fn length(&self) -> Result<u64, LibraryError>;
    fn open_stream(&self) -> Result<Box<dyn Read + Send>, LibraryError>;
}

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AttachmentSource for FileSource {
    fn length(&self) -> Result<u64, LibraryError> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    fn open_stream(&self) -> Result<Box<dyn Read + Send>, LibraryError> {
        Ok(Box::new(std::fs::File::open(&self.path)?))
    }
}

pub struct BytesSource {
    bytes: Vec<u8>,
}

impl BytesSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl AttachmentSource for BytesSource {
    fn length(&self) -> Result<u64, LibraryError> {
        Ok(self.bytes.len() as u64)
    }

    fn open_stream(&self) -> Result<Box<dyn Read + Send>, LibraryError> {
        Ok(Box::new(std::io::Cursor::new(self.bytes.clone())))
    }
}

/// One named byte-resource. Content materializes lazily: memory-resident
/// attachments read the source once and keep the buffer, the rest re-open
/// the stream per access. Parse results are memoized per parser id when
/// `cache_results` is set.
pub struct Attachment {
    name: String,
    store_in_memory: bool,
    cache_results: bool,
    length: u64,
    source: Box<dyn AttachmentSource>,
    resident: Mutex<Option<Arc<Vec<u8>>>>,
    parse_cache: Mutex<LruCache<String, Arc<dyn Any + Send + Sync>>>,
}

impl Attachment {
    fn new(
        name: &str,
        source: Box<dyn AttachmentSource>,
        store_in_memory: bool,
        cache_results: bool,
    ) -> Result<Self, LibraryError> {
        let capacity = NonZeroUsize::new(DEFAULT_PARSE_CACHE_SIZE)
            .expect("DEFAULT_PARSE_CACHE_SIZE must be > 0");
        let length = source.length()?;
        Ok(Self {
            name: name.to_string(),
            store_in_memory,
            cache_results,
            length,
            source,
            resident: Mutex::new(None),
            parse_cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store_in_memory(&self) -> bool {
        self.store_in_memory
    }

    pub fn cache_results(&self) -> bool {
        self.cache_results
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn open_stream(&self) -> Result<Box<dyn Read + Send>, LibraryError> {
        self.source.open_stream()
    }

    /// The full byte content, memoized when the attachment is
    /// memory-resident.
    pub fn bytes(&self) -> Result<Arc<Vec<u8>>, LibraryError> {
        if !self.store_in_memory {
            return Ok(Arc::new(self.read_all()?));
        }
        let mut resident = self.resident.lock().unwrap();
        if let Some(bytes) = resident.as_ref() {
            return Ok(Arc::clone(bytes));
        }
        let bytes = Arc::new(self.read_all()?);
        *resident = Some(Arc::clone(&bytes));
        Ok(bytes)
    }

    /// Runs `parse` over the byte content, memoizing the result under
    /// `parser_id` when `cache_results` is set.
    pub fn parsed<T: Send + Sync + 'static>(
        &self,
        parser_id: &str,
        parse: impl FnOnce(&[u8]) -> Result<T, LibraryError>,
    ) -> Result<Arc<T>, LibraryError> {
        if self.cache_results {
            if let Some(hit) = self.parse_cache.lock().unwrap().get(parser_id) {
                if let Ok(value) = Arc::clone(hit).downcast::<T>() {
                    debug!(
                        "Attachment '{}': parse cache hit for '{}'",
                        self.name, parser_id
                    );
                    return Ok(value);
                }
            }
        }
        let bytes = self.bytes()?;
        let value = Arc::new(parse(&bytes)?);
        if self.cache_results {
            self.parse_cache.lock().unwrap().put(
                parser_id.to_string(),
                Arc::clone(&value) as Arc<dyn Any + Send + Sync>,
            );
        }
        Ok(value)
    }

    fn read_all(&self) -> Result<Vec<u8>, LibraryError> {
        let mut stream = self.source.open_stream()?;
        let mut buffer = Vec::with_capacity(self.length as usize);
        stream.read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

/// Name-keyed registry of the session's attachments.
pub struct AttachmentManager {
    attachments: HashMap<String, Arc<Attachment>>,
}

impl AttachmentManager {
    pub fn new() -> Self {
        Self {
            attachments: HashMap::new(),
        }
    }

    pub fn add(
        &mut self,
        name: &str,
        source: Box<dyn AttachmentSource>,
        store_in_memory: bool,
        cache_results: bool,
    ) -> Result<Arc<Attachment>, LibraryError> {
        if self.attachments.contains_key(name) {
            return Err(LibraryError::AttachmentNameConflict(name.to_string()));
        }
        let attachment = Arc::new(Attachment::new(
            name,
            source,
            store_in_memory,
            cache_results,
        )?);
        self.attachments
            .insert(name.to_string(), Arc::clone(&attachment));
        debug!(
            "AttachmentManager: added '{}' ({} bytes)",
            name,
            attachment.length()
        );
        Ok(attachment)
    }

    /// Unregisters the attachment. The caller is responsible for the
    /// referenced-by check; the session refuses removal while any stage
    /// parameter still names the attachment.
    pub fn remove(&mut self, name: &str) -> Result<Arc<Attachment>, LibraryError> {
        self.attachments
            .remove(name)
            .ok_or_else(|| LibraryError::AttachmentNotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Attachment>> {
        self.attachments.get(name)
    }

    pub fn clear(&mut self) {
        if !self.attachments.is_empty() {
            debug!(
                "AttachmentManager: clearing {} attachments",
                self.attachments.len()
            );
        }
        self.attachments.clear();
    }

    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }

    /// Attachment names, sorted for stable listings.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.attachments.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for AttachmentManager {
    fn default() -> Self {
        Self::new()
    }
}
