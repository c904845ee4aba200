use super::frame::{Frame, Promise};
use super::handle::await_frame;
use crate::cancellation::CancellationToken;
use crate::context;
use crate::error::Error;

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

type Slot<V> = Arc<Mutex<Option<V>>>;

/// Lazy asynchronous sequence.
///
/// The body receives an [`Emitter`] and produces items with
/// [`Emitter::emit`]. Each `next().await` resumes the body until it emits
/// one item or returns. A generator cannot be restarted.
///
/// # Examples
///
/// ```rust,ignore
/// let mut numbers = Generator::<u32>::new(|emitter| async move {
///     for n in 0..3 {
///         emitter.emit(n).await;
///     }
///     Ok(())
/// });
///
/// while let Some(item) = numbers.next().await {
///     println!("{}", item?);
/// }
/// ```
pub struct Generator<V, E = Error> {
    promise: Arc<dyn Promise<Result<(), E>> + Send + Sync>,
    slot: Slot<V>,
    awaiting: bool,
    exhausted: bool,
}

impl<V, E> Generator<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    pub fn new<B, F>(body: B) -> Self
    where
        B: FnOnce(Emitter<V>) -> F,
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        let slot: Slot<V> = Arc::new(Mutex::new(None));
        let emitter = Emitter { slot: slot.clone() };

        Self {
            promise: Frame::new(body(emitter)),
            slot,
            awaiting: false,
            exhausted: false,
        }
    }

    /// Returns `true` once the body returned or was canceled.
    pub fn is_completed(&self) -> bool {
        self.promise.header().is_completed()
    }

    /// # Panics
    ///
    /// Panics if a token was already installed.
    pub fn set_cancellation_token(&mut self, token: CancellationToken) {
        self.promise.header().set_token(token);
    }

    /// Resumes the body until its next item.
    ///
    /// Resolves to `Some(Ok(item))` per item, to `Some(Err(error))` once if
    /// the body fails, and to `None` at the end of the sequence.
    pub fn next(&mut self) -> Next<'_, V, E> {
        Next { generator: self }
    }

    fn poll_item(&mut self) -> Poll<Option<Result<V, E>>> {
        if let Some(item) = self.slot.lock().unwrap().take() {
            self.awaiting = false;
            return Poll::Ready(Some(Ok(item)));
        }

        if self.exhausted {
            return Poll::Ready(None);
        }

        let header = self.promise.header();

        if header.is_completed() {
            self.exhausted = true;
            self.awaiting = false;

            return Poll::Ready(match self.promise.take_result() {
                Some(Err(error)) => Some(Err(error)),
                _ => None,
            });
        }

        if self.awaiting {
            return Poll::Pending;
        }

        let promise = self.promise.clone();
        if await_frame(header, move || promise.executable()) {
            // Completed while we were registering.
            return self.poll_item();
        }

        self.awaiting = true;
        Poll::Pending
    }
}

/// Future returned by [`Generator::next`].
#[must_use = "futures do nothing unless awaited"]
pub struct Next<'a, V, E> {
    generator: &'a mut Generator<V, E>,
}

impl<V, E> Future for Next<'_, V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    type Output = Option<Result<V, E>>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.generator.poll_item()
    }
}

/// Item sink handed to a generator body.
pub struct Emitter<V> {
    slot: Slot<V>,
}

impl<V: Send + 'static> Emitter<V> {
    /// Hands `value` to the consumer and suspends until the next request.
    ///
    /// Must be awaited from the generator's own body.
    pub fn emit(&self, value: V) -> Emit<'_, V> {
        Emit {
            slot: &self.slot,
            value: Some(value),
        }
    }
}

/// Future returned by [`Emitter::emit`].
#[must_use = "futures do nothing unless awaited"]
pub struct Emit<'a, V> {
    slot: &'a Slot<V>,
    value: Option<V>,
}

// `value` is moved out by value and never pinned.
impl<V> Unpin for Emit<'_, V> {}

impl<V> Future for Emit<'_, V> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();

        if let Some(value) = this.value.take() {
            *this.slot.lock().unwrap() = Some(value);
            context::mark_step();
            return Poll::Pending;
        }

        // Woken before the consumer took the item.
        if this.slot.lock().unwrap().is_some() {
            return Poll::Pending;
        }

        Poll::Ready(())
    }
}
