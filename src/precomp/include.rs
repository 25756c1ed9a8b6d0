use std::io::Read;
use std::sync::Arc;
use log::debug;
use vfs::{FileSystem, MemoryFS};
use crate::{PrecompError, PrecompOptions, PrecompResult, Punct, Script, Source, TokenKind};

/// Uses `/` as the only separator, collapses repeated separators, and resolves `.` and `..`
/// segments. The result never starts with a separator.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    segments.join("/")
}

impl Source {
    /// Opens `path` from `fs`. Relative paths are taken from `options.base_folder`.
    pub fn load_file(path: &str, fs: Arc<dyn FileSystem>, options: PrecompOptions) -> PrecompResult<Self> {
        let mut source = Self::empty(path, fs, options);
        let script = source.open_script(path)?.ok_or_else(|| PrecompError::FileNotFound(path.to_string()))?;
        source.filename = script.filename().to_string();
        source.push_script(script)?;
        Ok(source)
    }

    /// Scans `text` as if it were a file called `name`. Includes are looked up in `fs`.
    pub fn load_memory<B: AsRef<[u8]>>(name: &str, text: B, fs: Arc<dyn FileSystem>, options: PrecompOptions) -> Self {
        let mut source = Self::empty(name, fs, options);
        let script = source.new_script(name.to_string(), text);
        source.scripts.push(script);
        source
    }

    /// [`Source::load_memory`] over an empty file system with default options.
    pub fn from_memory<B: AsRef<[u8]>>(name: &str, text: B) -> Self {
        Self::load_memory(name, text, Arc::new(MemoryFS::new()), PrecompOptions::default())
    }

    fn new_script<B: AsRef<[u8]>>(&self, filename: String, contents: B) -> Script {
        Script::new(filename, contents)
            .with_flags(self.options.script_flags)
            .with_punctuations(self.punctuations.clone())
            .with_max_token_length(self.options.max_token_length)
    }

    /// Where `path` lives in the file system.
    fn resolve_path(&self, path: &str) -> String {
        format!("/{}", normalize_path(&format!("{}/{}", self.options.base_folder, path)))
    }

    /// Reads `path` into a new script, or `None` if there is no such file.
    fn open_script(&self, path: &str) -> PrecompResult<Option<Script>> {
        let resolved = self.resolve_path(path);
        if !self.fs.exists(&resolved)? {
            return Ok(None)
        }
        let mut contents = Vec::new();
        self.fs.open_file(&resolved)?.read_to_end(&mut contents)?;
        debug!("loaded {} ({} bytes)", resolved, contents.len());
        Ok(Some(self.new_script(normalize_path(path), contents)))
    }

    fn push_script(&mut self, script: Script) -> PrecompResult<()> {
        if self.scripts.iter().any(|open| open.filename() == script.filename()) {
            return Err(PrecompError::RecursiveInclude(script.filename().to_string()))
        }
        debug!("entering {} at include depth {}", script.filename(), self.scripts.len());
        self.scripts.push(script);
        Ok(())
    }

    pub(crate) fn pop_script(&mut self) {
        if let Some(script) = self.scripts.pop() {
            debug!("leaving {}", script.filename());
        }
    }

    /// `#include "file"` is looked up as given, then under the include path. `#include <file>`
    /// is only looked up under the include path.
    pub(crate) fn include_directive(&mut self) -> PrecompResult<()> {
        if self.skip > 0 {
            return Ok(())
        }
        let Some(token) = self.read_line()? else {
            return Err(PrecompError::IncludeWithoutName)
        };

        let script = match token.kind {
            TokenKind::String => {
                let path = token.unquoted().to_string();
                if path.is_empty() {
                    return Err(PrecompError::IncludeWithoutName)
                }
                match self.open_script(&path)? {
                    Some(script) => script,
                    None => self.open_script(&self.include_path_for(&path))?
                        .ok_or(PrecompError::FileNotFound(path))?,
                }
            }
            TokenKind::Punctuation if token.is_punct(Punct::Less) => {
                let mut name = String::new();
                loop {
                    match self.read_line()? {
                        Some(part) if part.is_punct(Punct::Greater) => break,
                        Some(part) => name.push_str(&part.text),
                        None => {
                            self.warning("#include missing trailing >");
                            break
                        }
                    }
                }
                if name.is_empty() {
                    return Err(PrecompError::IncludeWithoutName)
                }
                let path = self.include_path_for(&name);
                self.open_script(&path)?.ok_or(PrecompError::FileNotFound(path))?
            }
            _ => {
                self.unread_source_token(token)?;
                return Err(PrecompError::IncludeWithoutName)
            }
        };
        self.push_script(script)
    }

    fn include_path_for(&self, path: &str) -> String {
        match self.options.include_path.is_empty() {
            true => path.to_string(),
            false => format!("{}/{}", self.options.include_path, path),
        }
    }
}
