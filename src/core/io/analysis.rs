/// Cursor-based access over a buffer of elements. Implementors only provide the buffer and the
/// cursor; scanning helpers are built on top.
pub trait Analyser<T: Sized + PartialEq + Copy> {
    fn contents(&self) -> &[T];

    fn pos(&self) -> usize;

    fn set_cursor(&mut self, cursor: usize);

    #[inline]
    fn len(&self) -> usize { self.contents().len() }

    #[inline]
    fn is_end(&self) -> bool { self.pos() >= self.len() }

    #[inline]
    fn peek(&self) -> Option<T> { self.contents().get(self.pos()).copied() }

    /// Element `offset` places past the cursor.
    #[inline]
    fn peek_at(&self, offset: usize) -> Option<T> { self.contents().get(self.pos() + offset).copied() }

    #[inline]
    fn remaining(&self) -> &[T] { self.contents().get(self.pos()..).unwrap_or(&[]) }

    fn get(&mut self) -> Option<T> {
        let current = self.pos();
        match self.contents().get(current).copied() {
            Some(element) => {
                self.set_cursor(current + 1);
                Some(element)
            },
            None => None,
        }
    }

    #[inline]
    fn skip(&mut self, count: usize) {
        let target = (self.pos() + count).min(self.len());
        self.set_cursor(target)
    }

    fn take(&mut self, target: T) -> bool {
        match self.peek() {
            Some(element) if target == element => {
                self.set_cursor(self.pos() + 1);
                true
            }
            _ => false,
        }
    }

    #[inline]
    fn starts_with(&self, target: &[T]) -> bool { self.remaining().starts_with(target) }

    /// Consumes `target` only when the whole sequence is next.
    fn take_multi(&mut self, target: &[T]) -> bool {
        if !self.starts_with(target) { return false }
        self.skip(target.len());
        true
    }

    /// Advances while `predicate` holds and returns how many elements were passed.
    fn skip_while<F: FnMut(T) -> bool>(&mut self, mut predicate: F) -> usize {
        let start = self.pos();
        while let Some(element) = self.peek() {
            if !predicate(element) { break }
            self.set_cursor(self.pos() + 1);
        }
        self.pos() - start
    }
}
