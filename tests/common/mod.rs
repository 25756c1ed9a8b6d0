#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;
use vfs::{FileSystem, MemoryFS};
use precomp::{PrecompResult, Source, Token, TokenKind, Tokenizer};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A memory file system holding `files`, creating parent folders as needed.
pub fn memory_fs(files: &[(&str, &str)]) -> MemoryFS {
    let fs = MemoryFS::new();
    for (path, text) in files {
        let mut folder = String::new();
        let parents: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
        for part in &parents[..parents.len().saturating_sub(1)] {
            folder.push('/');
            folder.push_str(part);
            if !fs.exists(&folder).unwrap() {
                fs.create_dir(&folder).unwrap();
            }
        }
        fs.create_file(path).unwrap().write_all(text.as_bytes()).unwrap();
    }
    fs
}

pub fn shared_fs(files: &[(&str, &str)]) -> Arc<dyn FileSystem> { Arc::new(memory_fs(files)) }

pub fn source(text: &str) -> Source {
    init_logging();
    Source::from_memory("test.txt", text)
}

pub fn texts(source: &mut Source) -> PrecompResult<Vec<String>> {
    Ok(source.tokenize_until_end()?.into_iter().map(|token| token.text).collect())
}

pub fn kinds(tokens: &[Token]) -> Vec<(TokenKind, String)> {
    tokens.iter().map(|token| (token.kind, token.text.clone())).collect()
}
