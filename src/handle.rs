use std::fmt;
use std::sync::Arc;
use log::{debug, error, warn};
use vfs::FileSystem;
use crate::{Diagnostic, Macro, MacroFlags, MacroTable, PrecompError, PrecompOptions, PrecompResult, Source,
            SourceLocation, Token, BUILTINS};

/// Small integer naming an open [`Source`] in a [`Precompiler`]. Zero is never a valid handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceHandle(u32);

impl SourceHandle {
    pub fn new(raw: u32) -> Option<Self> { (raw != 0).then_some(Self(raw)) }

    #[inline]
    pub fn raw(self) -> u32 { self.0 }
}

impl fmt::Display for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Owns every open source along with the state they share: the file system, options, and the
/// global defines copied into each source when it is opened.
pub struct Precompiler {
    fs:      Arc<dyn FileSystem>,
    options: PrecompOptions,
    globals: MacroTable,
    sources: Vec<Option<Source>>
}

impl Precompiler {
    pub fn new<F: FileSystem + 'static>(fs: F) -> Self { Self::with_options(fs, PrecompOptions::default()) }

    pub fn with_options<F: FileSystem + 'static>(fs: F, options: PrecompOptions) -> Self {
        Self::from_shared(Arc::new(fs), options)
    }

    pub fn from_shared(fs: Arc<dyn FileSystem>, options: PrecompOptions) -> Self {
        Self {
            fs,
            globals: MacroTable::new(),
            sources: (0..options.max_sources).map(|_| None).collect(),
            options,
        }
    }

    #[inline]
    pub fn options(&self) -> &PrecompOptions { &self.options }

    /// Folder every file path is resolved under.
    pub fn set_base_folder<S: Into<String>>(&mut self, path: S) { self.options.base_folder = path.into() }

    /// Include path given to sources opened from now on.
    pub fn set_include_path<S: Into<String>>(&mut self, path: S) { self.options.include_path = path.into() }

    fn free_slot(&self) -> PrecompResult<usize> {
        self.sources.iter()
            .enumerate()
            .skip(1)
            .find_map(|(index, slot)| slot.is_none().then_some(index))
            .ok_or(PrecompError::TooManySources(self.options.max_sources))
    }

    fn install(&mut self, slot: usize, mut source: Source) -> SourceHandle {
        source.add_globals(&self.globals);
        debug!("opened {} as source {}", source.filename(), slot);
        self.sources[slot] = Some(source);
        SourceHandle(slot as u32)
    }

    /// Opens `path`. No slot is taken when the file can't be loaded.
    pub fn load_source(&mut self, path: &str) -> PrecompResult<SourceHandle> {
        let slot = self.free_slot()?;
        let source = Source::load_file(path, self.fs.clone(), self.options.clone())?;
        Ok(self.install(slot, source))
    }

    pub fn load_source_memory<B: AsRef<[u8]>>(&mut self, name: &str, text: B) -> PrecompResult<SourceHandle> {
        let slot = self.free_slot()?;
        let source = Source::load_memory(name, text, self.fs.clone(), self.options.clone());
        Ok(self.install(slot, source))
    }

    /// Closes the source behind `handle`. False if it was not open.
    pub fn free_source(&mut self, handle: SourceHandle) -> bool {
        match self.sources.get_mut(handle.raw() as usize).and_then(Option::take) {
            Some(source) => {
                debug!("closed {} ({})", source.filename(), handle);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn source(&self, handle: SourceHandle) -> Option<&Source> {
        self.sources.get(handle.raw() as usize).and_then(Option::as_ref)
    }

    #[inline]
    pub fn source_mut(&mut self, handle: SourceHandle) -> Option<&mut Source> {
        self.sources.get_mut(handle.raw() as usize).and_then(Option::as_mut)
    }

    fn open_source(&mut self, handle: SourceHandle) -> PrecompResult<&mut Source> {
        self.source_mut(handle).ok_or(PrecompError::InvalidHandle(handle.raw()))
    }

    pub fn read_token(&mut self, handle: SourceHandle) -> PrecompResult<Option<Token>> {
        self.open_source(handle)?.read_token()
    }

    /// Hands the last token read from `handle` out again. False if nothing was read yet.
    pub fn unread_last_token(&mut self, handle: SourceHandle) -> PrecompResult<bool> {
        self.open_source(handle)?.unread_last_token()
    }

    pub fn source_location(&self, handle: SourceHandle) -> PrecompResult<SourceLocation> {
        self.source(handle).map(Source::location).ok_or(PrecompError::InvalidHandle(handle.raw()))
    }

    pub fn take_diagnostics(&mut self, handle: SourceHandle) -> PrecompResult<Vec<Diagnostic>> {
        Ok(self.open_source(handle)?.take_diagnostics())
    }

    /// Defines a macro, given as the text of a `#define` line, in every source opened from now on.
    pub fn add_global_define(&mut self, text: &str) -> PrecompResult<()> {
        let definition = Source::define_from_string(text, &self.options)?;
        if BUILTINS.iter().any(|(name, _)| *name == definition.name) {
            return Err(PrecompError::RedefineFixed(definition.name))
        }
        if self.globals.contains(&definition.name) {
            warn!("redefinition of global {}", definition.name);
        }
        self.globals.define(Macro { flags: definition.flags | MacroFlags::GLOBAL, ..definition });
        Ok(())
    }

    /// Sources that are already open keep their copy.
    pub fn remove_global_define(&mut self, name: &str) -> bool { self.globals.undef(name).is_some() }

    pub fn remove_all_global_defines(&mut self) { self.globals.clear() }

    #[inline]
    pub fn global_defines(&self) -> &MacroTable { &self.globals }

    pub fn open_handles(&self) -> Vec<SourceHandle> {
        self.sources.iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| SourceHandle(index as u32))
            .collect()
    }

    /// Logs an error for every source that was never freed and returns how many there are.
    pub fn check_open_handles(&self) -> usize {
        let mut open = 0;
        for (index, source) in self.sources.iter().enumerate() {
            if let Some(source) = source {
                error!("file {} still open in precompiler (source {})", source.filename(), index);
                open += 1;
            }
        }
        open
    }
}

impl Drop for Precompiler {
    fn drop(&mut self) { self.check_open_handles(); }
}
