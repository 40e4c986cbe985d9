//! Live session events for open protected pages.
//!
//! Each protected page opens `GET /session/events`. The stream listens on the
//! session hub for the page's sign-in; when that sign-in ends the page is told
//! to navigate to the login page. Closing the page drops the stream, which
//! cancels the listener.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
};
use futures::Stream;

use crate::middleware::{AuthRejection, LOGIN_PATH, RequireSession};
use crate::services::SessionEvent;
use crate::state::AppState;

/// Interval between keep-alive comments.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

fn redirect_event() -> Event {
    Event::default().event("redirect").data(LOGIN_PATH)
}

/// Stream session changes for the current sign-in.
///
/// A visitor with no valid session gets a single `redirect` event instead of
/// an HTTP redirect, which `EventSource` cannot act on.
pub async fn events(
    State(state): State<AppState>,
    gate: Result<RequireSession, AuthRejection>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = gate
        .ok()
        .map(|RequireSession(current)| state.session_hub().subscribe(current.gate_key));

    let stream = async_stream::stream! {
        let Some(mut subscription) = subscription else {
            yield Ok(redirect_event());
            return;
        };

        while let Some(event) = subscription.recv().await {
            if event == SessionEvent::SignedOut {
                yield Ok(redirect_event());
                break;
            }
            yield Ok(Event::default().event("session").data(event.as_str()));
        }
        tracing::debug!(gate_key = %subscription.gate_key(), "Session event stream closed");
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}
