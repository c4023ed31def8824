//! Saving and loading a [`Dictionary`] through the [`Codec`].
//!
//! A saved dictionary is the four signature bytes `KVS1` followed by each key and its value,
//! encoded one after another until the end of the stream.

use crate::codec::Codec;
use crate::comparer::KeyComparer;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::value::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Leading bytes of a saved [`Dictionary`].
pub const SIGNATURE: [u8; 4] = *b"KVS1";

impl<K, V, C> Dictionary<K, V, C>
where
    K: Clone + Into<Value> + TryFrom<Value> + 'static,
    V: Clone + Into<Value> + TryFrom<Value> + 'static,
    C: KeyComparer<K>,
{
    /// Writes every entry to `writer` using a default [`Codec`].
    ///
    /// # Errors
    ///
    /// Returns an error if an entry cannot be encoded or writing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::{Dictionary, Value};
    ///
    /// let dictionary: Dictionary<String, Value> = Dictionary::new();
    /// dictionary.set("a".to_owned(), Value::from(1_i32));
    ///
    /// let mut bytes = Vec::new();
    /// dictionary.save(&mut bytes).unwrap();
    /// assert_eq!(&bytes[..4], b"KVS1");
    ///
    /// let loaded: Dictionary<String, Value> = Dictionary::load(&mut bytes.as_slice());
    /// assert_eq!(loaded.get("a"), Some(Value::I32(1)));
    /// ```
    #[inline]
    pub fn save<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        self.save_with(&Codec::new(), writer)
    }

    /// Writes every entry to `writer` using `codec`.
    ///
    /// The entries are copied while every stripe lock is held, so the output is a point-in-time
    /// image even if writers are running.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry cannot be encoded or writing fails.
    pub fn save_with<W: Write + ?Sized>(&self, codec: &Codec, writer: &mut W) -> Result<()> {
        writer.write_all(&SIGNATURE)?;
        let entries = self.to_vec();
        let saved = entries.len();
        for (key, value) in entries {
            codec.write(writer, &key.into())?;
            codec.write(writer, &value.into())?;
        }
        debug!(saved, "dictionary saved");
        Ok(())
    }

    /// Saves the [`Dictionary`] to a file.
    ///
    /// The data is written to a temporary file next to `path` which then replaces `path`, so the
    /// file holds either the previous or the new contents.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry cannot be encoded or a file operation fails.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(".tmp");
        let temp_path = path.with_file_name(temp_name);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        let saved = self
            .save_to_file(file)
            .and_then(|()| fs::rename(&temp_path, path).map_err(Error::from));
        if saved.is_err() {
            if let Err(error) = fs::remove_file(&temp_path) {
                warn!(%error, path = %temp_path.display(), "temporary file not removed");
            }
        }
        saved
    }

    fn save_to_file(&self, file: File) -> Result<()> {
        let mut writer = BufWriter::new(file);
        self.save(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Inserts the entries read from `reader` and returns how many were inserted.
    ///
    /// Reading stops without an error at the end of the stream, at the first entry that cannot be
    /// decoded or converted into `K` and `V`, or at a null key. If the stream does not start with
    /// [`SIGNATURE`] nothing is inserted.
    pub fn load_into<R: Read + ?Sized>(&self, codec: &Codec, reader: &mut R) -> usize {
        let mut signature = [0; 4];
        if reader.read_exact(&mut signature).is_err() || signature != SIGNATURE {
            warn!(?signature, "signature mismatch, nothing loaded");
            return 0;
        }

        let mut loaded = 0;
        while let Some(key) = codec.try_read(reader) {
            if key.is_null() {
                break;
            }
            let Some(value) = codec.try_read(reader) else {
                break;
            };
            let (Ok(key), Ok(value)) = (K::try_from(key), V::try_from(value)) else {
                debug!(loaded, "entry does not convert, loading stopped");
                break;
            };
            self.set(key, value);
            loaded += 1;
        }
        debug!(loaded, "dictionary loaded");
        loaded
    }

    /// Reads a [`Dictionary`] from `reader` using a default [`Codec`].
    ///
    /// Malformed input never fails: see [`Dictionary::load_into`].
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::{Dictionary, Value};
    ///
    /// let loaded: Dictionary<String, Value> = Dictionary::load(&mut &b"XXXX\x05\x05"[..]);
    /// assert!(loaded.is_empty());
    /// ```
    #[inline]
    pub fn load<R: Read + ?Sized>(reader: &mut R) -> Self
    where
        C: Default,
    {
        Self::load_with(&Codec::new(), reader)
    }

    /// Reads a [`Dictionary`] from `reader` using `codec`.
    pub fn load_with<R: Read + ?Sized>(codec: &Codec, reader: &mut R) -> Self
    where
        C: Default,
    {
        let dictionary = Self::default();
        dictionary.load_into(codec, reader);
        dictionary
    }

    /// Loads a [`Dictionary`] from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened; the contents are read as in
    /// [`Dictionary::load_into`].
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self>
    where
        C: Default,
    {
        let mut reader = BufReader::new(File::open(path)?);
        Ok(Self::load(&mut reader))
    }
}
