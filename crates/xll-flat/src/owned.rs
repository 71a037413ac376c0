// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Owned buffers that hand out borrowed views.

use core::fmt;
use core::marker::PhantomData;

use crate::{FlatError, Follow, Table};

/// Lifetime-free name for a family of views.
///
/// Implemented on the `'static` instantiation of a view type, e.g.
/// `impl Root for Grid<'static> { type View<'a> = Grid<'a>; }`, so an [`Owned`]
/// buffer can name its root type without borrowing anything.
pub trait Root: 'static {
    /// The view type produced for a buffer borrowed for `'a`.
    type View<'a>: Follow<'a>;
}

/// Exclusively owned, finished buffer whose root is an `R`.
///
/// Views produced by [`Owned::view`] borrow `self`, so they cannot outlive it.
pub struct Owned<R: Root> {
    bytes: Vec<u8>,
    loc: usize,
    _root: PhantomData<fn() -> R>,
}

impl<R: Root> Owned<R> {
    /// Take ownership of a finished buffer and root it.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, FlatError> {
        let loc = Table::root(&bytes)?.loc();
        Ok(Self {
            bytes,
            loc,
            _root: PhantomData,
        })
    }

    /// Typed view of the root table.
    pub fn view(&self) -> R::View<'_> {
        <R::View<'_> as Follow<'_>>::follow(Table::new(&self.bytes, self.loc))
    }

    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Give up the typed wrapper and keep the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl<R: Root> Clone for Owned<R> {
    fn clone(&self) -> Self {
        Self {
            bytes: self.bytes.clone(),
            loc: self.loc,
            _root: PhantomData,
        }
    }
}

impl<R: Root> fmt::Debug for Owned<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owned")
            .field("len", &self.bytes.len())
            .field("root", &self.loc)
            .finish()
    }
}

impl<R: Root> AsRef<[u8]> for Owned<R> {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
