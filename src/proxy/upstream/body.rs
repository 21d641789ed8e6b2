// Response body guard: routes mid-stream failures through the sanitizer

use bytes::Bytes;
use futures::Stream;
use pin_project::pin_project;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::engine::ForwardStream;
use super::sanitizer::{Disposition, ErrorSanitizer, ResponseState};
use crate::proxy::context::RequestContext;

#[pin_project]
pub struct GuardedBody {
    #[pin]
    inner: ForwardStream,
    ctx: RequestContext,
    sanitizer: ErrorSanitizer,
    state: ResponseState,
}

impl GuardedBody {
    /// The response head is about to be sent, so the state starts at `HeadersSent`
    pub fn new(inner: ForwardStream, ctx: RequestContext, sanitizer: ErrorSanitizer) -> Self {
        Self {
            inner,
            ctx,
            sanitizer,
            state: ResponseState::HeadersSent,
        }
    }
}

impl Stream for GuardedBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.state == ResponseState::Finished {
            return Poll::Ready(None);
        }

        match this.inner.poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Some(Err(err))) => {
                match this.sanitizer.on_error(&err, this.ctx, *this.state) {
                    Disposition::CloseStream | Disposition::Ignore => {}
                    Disposition::Replace(_) => {
                        tracing::warn!(
                            request_id = %this.ctx.request_id,
                            "Replacement response discarded, headers already sent"
                        );
                    }
                }
                *this.state = ResponseState::Finished;
                Poll::Ready(None)
            }
            Poll::Ready(None) => {
                *this.state = ResponseState::Finished;
                Poll::Ready(None)
            }
        }
    }
}
