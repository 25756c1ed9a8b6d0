use crate::ScriptFlags;

/// Limits and defaults shared by every source a [`crate::Precompiler`] opens.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecompOptions {
    /// Size of the handle table. Slot 0 is reserved, so at most `max_sources - 1` sources are open.
    pub max_sources:         usize,
    pub max_token_length:    usize,
    pub max_define_parms:    usize,
    /// Capacity of the pending-token arena of one source.
    pub max_pending_tokens:  usize,
    pub max_expansion_depth: u32,
    pub max_eval_values:     usize,
    pub max_eval_operators:  usize,
    pub include_path:        String,
    pub base_folder:         String,
    pub script_flags:        ScriptFlags,
    /// Recognise `$evalint(..)` and `$evalfloat(..)`. When off, `$` is an ordinary punctuation.
    pub dollar_directives:   bool,
}

impl Default for PrecompOptions {
    fn default() -> Self {
        Self {
            max_sources: 64,
            max_token_length: 1024,
            max_define_parms: 128,
            max_pending_tokens: 4096,
            max_expansion_depth: 64,
            max_eval_values: 64,
            max_eval_operators: 64,
            include_path: String::new(),
            base_folder: String::new(),
            script_flags: ScriptFlags::empty(),
            dollar_directives: true,
        }
    }
}

impl PrecompOptions {
    pub fn with_include_path<S: Into<String>>(mut self, path: S) -> Self {
        self.include_path = path.into();
        self
    }

    pub fn with_base_folder<S: Into<String>>(mut self, path: S) -> Self {
        self.base_folder = path.into();
        self
    }

    pub fn with_script_flags(mut self, flags: ScriptFlags) -> Self {
        self.script_flags = flags;
        self
    }

    pub fn with_max_sources(mut self, count: usize) -> Self {
        self.max_sources = count;
        self
    }

    pub fn with_max_token_length(mut self, length: usize) -> Self {
        self.max_token_length = length;
        self
    }

    pub fn with_max_expansion_depth(mut self, depth: u32) -> Self {
        self.max_expansion_depth = depth;
        self
    }

    pub fn with_max_pending_tokens(mut self, count: usize) -> Self {
        self.max_pending_tokens = count;
        self
    }
}
