use crate::events::{ConnId, EventSubscription, TableEvent};
use crate::registry::TableRegistry;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use warp::http;
use warp::reply::{self, Response};
use warp::sse;
use warp::Reply;

/// Opens the event stream for a connection.
///
/// GET `/api/events/{conn_id}`. The client picks its own connection id
/// and reuses it in join and action requests; reconnecting under the
/// same id replaces the previous stream.
pub async fn stream_events(conn_id: ConnId, registry: Arc<TableRegistry>) -> Response {
    let subscription = registry.event_bus().register(conn_id);
    let stream = subscription_stream(subscription, Arc::clone(&registry), conn_id);
    let keep_alive = sse::keep_alive()
        .interval(Duration::from_secs(15))
        .text(":keep-alive\n");

    let reply = sse::reply(keep_alive.stream(stream));
    reply::with_header(reply, http::header::CACHE_CONTROL, "no-cache").into_response()
}

/// Unbinds the seat mapping when the stream is dropped. The bus side
/// is already handled by the subscription's own drop.
struct DisconnectGuard {
    registry: Arc<TableRegistry>,
    conn_id: ConnId,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        self.registry.disconnect(&self.conn_id);
    }
}

fn subscription_stream(
    mut subscription: EventSubscription,
    registry: Arc<TableRegistry>,
    conn_id: ConnId,
) -> impl tokio_stream::Stream<Item = Result<sse::Event, Infallible>> {
    let (_tx, placeholder) = mpsc::channel(1);
    let receiver = std::mem::replace(&mut subscription.receiver, placeholder);
    let cleanup = Arc::new((subscription, DisconnectGuard { registry, conn_id }));

    ReceiverStream::new(receiver).map(move |event| {
        let _keep_alive = Arc::clone(&cleanup);
        Ok(render_event(event))
    })
}

fn render_event(event: TableEvent) -> sse::Event {
    match serde_json::to_string(&event) {
        Ok(json) => sse::Event::default().event("table_event").data(json),
        Err(err) => {
            let fallback = serde_json::json!({
                "type": "error",
                "message": format!("failed to serialize table event: {err}")
            })
            .to_string();
            sse::Event::default().event("table_event").data(fallback)
        }
    }
}
