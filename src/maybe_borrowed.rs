use core::ops::{Deref, DerefMut};

/// Either a borrowed or an owned value; the executor's call stack borrows
/// the root frame and owns every child frame.
pub enum MaybeBorrowed<'a, T> {
    Borrowed(&'a mut T),
    Owned(T),
}

impl<'a, T> Deref for MaybeBorrowed<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Self::Borrowed(value) => value,
            Self::Owned(value) => value,
        }
    }
}

impl<'a, T> DerefMut for MaybeBorrowed<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        match self {
            Self::Borrowed(value) => value,
            Self::Owned(value) => value,
        }
    }
}
