// SPDX-License-Identifier: MPL-2.0

/// The error type which is returned from the APIs of this crate.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Error {
    /// The operation is not legal for the targeted line's class, or an
    /// argument is out of range.
    InvalidArgs,
    /// The referenced global line is owned by no registered controller or
    /// has no live descriptor in the dispatch registry.
    NotFound,
    /// A cascade acknowledge read returned a value outside the legal
    /// shared-line window.
    MalformedInterrupt,
}

/// A specialized [`Result`] type returned from the APIs of this crate.
pub type Result<T> = core::result::Result<T, Error>;
