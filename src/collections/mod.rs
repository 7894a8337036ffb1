//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Host-side views of the toolkit's linked collections.
//!
//! The toolkit exposes its ordered collections (functions, globals, named
//! metadata, blocks, instructions, ...) as "first/next/last" queries. A view
//! implements those primitives once through [`LinkedCollection`], and gets a
//! lazy iterator and the usual queries for free. Views that can be searched
//! by name also implement [`NameLookup`].

use crate::error::{Error, Result};
use std::iter::FusedIterator;

/// Models an ordered toolkit collection that is walked one element at a time.
pub trait LinkedCollection {
    /// Where a walk currently is. For most collections this is the element's
    /// own handle.
    type Cursor: Copy;

    /// What the walk produces.
    type Item;

    /// What is being walked.
    const KIND: &'static str;

    /// Gets a cursor to the first element, if there is one.
    fn first(&self) -> Result<Option<Self::Cursor>>;

    /// Gets a cursor to the element after `cursor`, if there is one.
    fn next(&self, cursor: Self::Cursor) -> Result<Option<Self::Cursor>>;

    /// Gets a cursor to the last element, if there is one.
    fn last(&self) -> Result<Option<Self::Cursor>>;

    /// Resolves a cursor into the element it points at.
    fn item(&self, cursor: Self::Cursor) -> Result<Self::Item>;

    /// Lazily walks the collection from the start. Nothing is asked of the
    /// toolkit until the first call to [`Iterator::next`].
    ///
    /// Every step can fail: walking a view of a disposed or engine-owned
    /// module yields [`Error::InvalidReference`] instead of an empty sequence.
    fn iter(&self) -> Entries<'_, Self>
    where
        Self: Sized,
    {
        Entries {
            collection: self,
            state: Walk::Start,
        }
    }

    /// Checks whether the collection is empty without walking it.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.last()?.is_none())
    }

    /// Gets the last element without walking the collection.
    fn last_item(&self) -> Result<Option<Self::Item>> {
        self.last()?.map(|cursor| self.item(cursor)).transpose()
    }
}

/// Models a collection that can be searched by name.
pub trait NameLookup {
    /// What a successful lookup produces.
    type Item;

    /// What is being looked up, for error messages.
    const KIND: &'static str;

    /// Finds the element named `name`, if there is one.
    fn lookup(&self, name: &str) -> Result<Option<Self::Item>>;

    /// Checks whether an element named `name` exists.
    fn has(&self, name: &str) -> Result<bool> {
        Ok(self.lookup(name)?.is_some())
    }

    /// Gets the element named `name`, failing with [`Error::NotFound`] if
    /// there isn't one.
    fn get(&self, name: &str) -> Result<Self::Item> {
        self.lookup(name)?
            .ok_or_else(|| Error::not_found(Self::KIND, name))
    }
}

#[derive(Copy, Clone, Debug)]
enum Walk<C> {
    Start,
    At(C),
    Done,
}

/// The lazy iterator returned by [`LinkedCollection::iter`].
///
/// If the toolkit reports an error (the owner is gone, or an element was freed
/// while it was being walked), that error is yielded once and the walk ends.
pub struct Entries<'c, C: LinkedCollection> {
    collection: &'c C,
    state: Walk<C::Cursor>,
}

impl<'c, C: LinkedCollection> Entries<'c, C> {
    fn advance(&self) -> Result<Option<(C::Cursor, C::Item)>> {
        let cursor = match self.state {
            Walk::Start => self.collection.first()?,
            Walk::At(cursor) => self.collection.next(cursor)?,
            Walk::Done => None,
        };

        match cursor {
            Some(cursor) => Ok(Some((cursor, self.collection.item(cursor)?))),
            None => Ok(None),
        }
    }
}

impl<'c, C: LinkedCollection> Iterator for Entries<'c, C> {
    type Item = Result<C::Item>;

    fn next(&mut self) -> Option<Result<C::Item>> {
        match self.advance() {
            Ok(Some((cursor, item))) => {
                self.state = Walk::At(cursor);

                Some(Ok(item))
            }
            Ok(None) => {
                self.state = Walk::Done;

                None
            }
            Err(err) => {
                self.state = Walk::Done;

                Some(Err(err))
            }
        }
    }
}

impl<'c, C: LinkedCollection> FusedIterator for Entries<'c, C> {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    // a collection of 0..len that counts how many times it was asked for something
    struct Counting {
        len: u32,
        calls: Cell<u32>,
        broken_at: Option<u32>,
    }

    impl Counting {
        fn new(len: u32) -> Self {
            Self {
                len,
                calls: Cell::new(0),
                broken_at: None,
            }
        }

        fn at(&self, index: u32) -> Option<u32> {
            self.calls.set(self.calls.get() + 1);

            (index < self.len).then_some(index)
        }
    }

    impl LinkedCollection for Counting {
        type Cursor = u32;
        type Item = u32;

        const KIND: &'static str = "numbers";

        fn first(&self) -> Result<Option<u32>> {
            Ok(self.at(0))
        }

        fn next(&self, cursor: u32) -> Result<Option<u32>> {
            Ok(self.at(cursor + 1))
        }

        fn last(&self) -> Result<Option<u32>> {
            Ok(self.len.checked_sub(1))
        }

        fn item(&self, cursor: u32) -> Result<u32> {
            match self.broken_at {
                Some(broken) if cursor == broken => Err(Error::InvalidReference("number")),
                _ => Ok(cursor * 10),
            }
        }
    }

    impl NameLookup for Counting {
        type Item = u32;

        const KIND: &'static str = "number";

        fn lookup(&self, name: &str) -> Result<Option<u32>> {
            Ok(name.parse::<u32>().ok().filter(|n| *n < self.len))
        }
    }

    #[test]
    fn iteration_is_lazy() {
        let numbers = Counting::new(3);
        let mut iter = numbers.iter();

        assert_eq!(numbers.calls.get(), 0);
        assert_eq!(iter.next(), Some(Ok(0)));
        assert_eq!(numbers.calls.get(), 1);
        assert_eq!(iter.collect::<Result<Vec<_>>>(), Ok(vec![10, 20]));
    }

    #[test]
    fn every_walk_restarts() {
        let numbers = Counting::new(2);

        assert_eq!(numbers.iter().collect::<Result<Vec<_>>>(), Ok(vec![0, 10]));
        assert_eq!(numbers.iter().collect::<Result<Vec<_>>>(), Ok(vec![0, 10]));
    }

    #[test]
    fn queries_do_not_walk() {
        let numbers = Counting::new(4);

        assert_eq!(numbers.is_empty(), Ok(false));
        assert_eq!(numbers.last_item(), Ok(Some(30)));
        assert_eq!(Counting::new(0).is_empty(), Ok(true));
        assert_eq!(numbers.calls.get(), 0);
    }

    #[test]
    fn stale_entries_are_reported_then_end_the_walk() {
        let numbers = Counting {
            broken_at: Some(2),
            ..Counting::new(5)
        };

        let mut iter = numbers.iter();

        assert_eq!(iter.next(), Some(Ok(0)));
        assert_eq!(iter.next(), Some(Ok(10)));
        assert_eq!(iter.next(), Some(Err(Error::InvalidReference("number"))));
        assert_eq!(iter.next(), None);
        assert_eq!(numbers.iter().collect::<Result<Vec<_>>>(), Err(Error::InvalidReference("number")));
    }

    // fails on the very first step, the way a view of a dead owner does
    struct Orphaned;

    impl LinkedCollection for Orphaned {
        type Cursor = u32;
        type Item = u32;

        const KIND: &'static str = "orphans";

        fn first(&self) -> Result<Option<u32>> {
            Err(Error::InvalidReference("module"))
        }

        fn next(&self, _: u32) -> Result<Option<u32>> {
            Ok(None)
        }

        fn last(&self) -> Result<Option<u32>> {
            Err(Error::InvalidReference("module"))
        }

        fn item(&self, cursor: u32) -> Result<u32> {
            Ok(cursor)
        }
    }

    #[test]
    fn dead_owners_are_not_empty() {
        assert_eq!(Orphaned.iter().next(), Some(Err(Error::InvalidReference("module"))));
        assert_eq!(Orphaned.iter().count(), 1);
        assert!(Orphaned.is_empty().unwrap_err().is_invalid_reference());
    }

    #[test]
    fn lookups() {
        let numbers = Counting::new(2);

        assert_eq!(numbers.has("1"), Ok(true));
        assert_eq!(numbers.has("7"), Ok(false));
        assert_eq!(numbers.get("1"), Ok(1));
        assert_eq!(numbers.get("7"), Err(Error::not_found("number", "7")));
    }
}
