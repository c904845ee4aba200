use crate::coroutine::Async;
use crate::executable::Executable;

use std::sync::Arc;

/// Opaque reference to one branch of an [`AsyncTuple`].
pub struct Branch(pub(crate) Arc<dyn Executable>);

/// Tuple of [`Async`] values accepted by [`all`](super::all) and
/// [`any`](super::any).
///
/// Implemented for tuples of arity 1 to 8.
pub trait AsyncTuple: Send + Unpin {
    /// `(Result<V0, E0>, Result<V1, E1>, ...)`
    type Results;

    /// `(Option<Result<V0, E0>>, Option<Result<V1, E1>>, ...)`
    type Options;

    const LEN: usize;

    #[doc(hidden)]
    fn branch(&self, index: usize) -> Branch;

    /// Moves every result out, or returns `None` if a branch was canceled.
    #[doc(hidden)]
    fn take_results(&mut self) -> Option<Self::Results>;

    /// Moves the result of `winner` out, leaving every other slot empty.
    #[doc(hidden)]
    fn take_option(&mut self, winner: usize) -> Self::Options;
}

macro_rules! async_tuple {
    ($len:expr; $($index:tt => $V:ident, $E:ident),+) => {
        impl<$($V, $E),+> AsyncTuple for ($(Async<$V, $E>,)+)
        where
            $($V: Send + 'static, $E: Send + 'static,)+
        {
            type Results = ($(Result<$V, $E>,)+);
            type Options = ($(Option<Result<$V, $E>>,)+);

            const LEN: usize = $len;

            fn branch(&self, index: usize) -> Branch {
                match index {
                    $($index => Branch(self.$index.executable()),)+
                    _ => panic!("branch {index} out of range for a tuple of {}", $len),
                }
            }

            fn take_results(&mut self) -> Option<Self::Results> {
                Some(($(self.$index.take()?,)+))
            }

            fn take_option(&mut self, winner: usize) -> Self::Options {
                ($(if winner == $index { self.$index.take() } else { None },)+)
            }
        }
    };
}

async_tuple!(1; 0 => V0, E0);
async_tuple!(2; 0 => V0, E0, 1 => V1, E1);
async_tuple!(3; 0 => V0, E0, 1 => V1, E1, 2 => V2, E2);
async_tuple!(4; 0 => V0, E0, 1 => V1, E1, 2 => V2, E2, 3 => V3, E3);
async_tuple!(5; 0 => V0, E0, 1 => V1, E1, 2 => V2, E2, 3 => V3, E3, 4 => V4, E4);
async_tuple!(6; 0 => V0, E0, 1 => V1, E1, 2 => V2, E2, 3 => V3, E3, 4 => V4, E4, 5 => V5, E5);
async_tuple!(7; 0 => V0, E0, 1 => V1, E1, 2 => V2, E2, 3 => V3, E3, 4 => V4, E4, 5 => V5, E5, 6 => V6, E6);
async_tuple!(8; 0 => V0, E0, 1 => V1, E1, 2 => V2, E2, 3 => V3, E3, 4 => V4, E4, 5 => V5, E5, 6 => V6, E6, 7 => V7, E7);

/// Positional access to a tuple of options.
pub trait Slot<const N: usize> {
    type Value;

    fn into_slot(self) -> Option<Self::Value>;
}

macro_rules! tuple_slots {
    ($generics:tt; $($index:tt => $T:ident),+) => {
        $(tuple_slot!($generics; $index => $T);)+
    };
}

macro_rules! tuple_slot {
    (($($G:ident),+); $index:tt => $T:ident) => {
        impl<$($G),+> Slot<$index> for ($(Option<$G>,)+) {
            type Value = $T;

            fn into_slot(self) -> Option<$T> {
                self.$index
            }
        }
    };
}

tuple_slots!((A); 0 => A);
tuple_slots!((A, B); 0 => A, 1 => B);
tuple_slots!((A, B, C); 0 => A, 1 => B, 2 => C);
tuple_slots!((A, B, C, D); 0 => A, 1 => B, 2 => C, 3 => D);
tuple_slots!((A, B, C, D, F); 0 => A, 1 => B, 2 => C, 3 => D, 4 => F);
tuple_slots!((A, B, C, D, F, G); 0 => A, 1 => B, 2 => C, 3 => D, 4 => F, 5 => G);
tuple_slots!((A, B, C, D, F, G, H); 0 => A, 1 => B, 2 => C, 3 => D, 4 => F, 5 => G, 6 => H);
tuple_slots!((A, B, C, D, F, G, H, I); 0 => A, 1 => B, 2 => C, 3 => D, 4 => F, 5 => G, 6 => H, 7 => I);

/// Unwraps the winning slot of an [`any`](super::any) result.
///
/// # Examples
///
/// ```rust,ignore
/// let winner = any((fast(), slow())).await;
/// let value = winner.assert_has_value::<0>()?;
/// ```
pub trait AssertHasValue: Sized {
    /// Returns the content of slot `N`.
    ///
    /// # Panics
    ///
    /// Panics if slot `N` holds no value.
    fn assert_has_value<const N: usize>(self) -> <Self as Slot<N>>::Value
    where
        Self: Slot<N>;
}

impl<T> AssertHasValue for T {
    fn assert_has_value<const N: usize>(self) -> <Self as Slot<N>>::Value
    where
        Self: Slot<N>,
    {
        match self.into_slot() {
            Some(value) => value,
            None => panic!("slot {N} holds no value"),
        }
    }
}
