/// Type-state markers for the builder pattern
///
/// These types track which mandatory fields have been set, so a client
/// without a gateway URL or a token does not compile.

use std::marker::PhantomData;

/// Marker trait for URL state
pub trait UrlState {}

/// URL has not been set
pub struct NoUrl;
impl UrlState for NoUrl {}

/// URL has been set
pub struct HasUrl;
impl UrlState for HasUrl {}

/// Marker trait for token state
pub trait TokenState {}

/// Token has not been set
pub struct NoToken;
impl TokenState for NoToken {}

/// Token has been set
pub struct HasToken;
impl TokenState for HasToken {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<U, T> {
    _url: PhantomData<U>,
    _token: PhantomData<T>,
}

impl<U, T> TypeState<U, T> {
    pub(crate) fn new() -> Self {
        Self {
            _url: PhantomData,
            _token: PhantomData,
        }
    }
}

impl<U, T> Default for TypeState<U, T> {
    fn default() -> Self {
        Self::new()
    }
}
